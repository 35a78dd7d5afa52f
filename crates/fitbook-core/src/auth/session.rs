use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::store::{TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SESSION_KEYS, USER_KEY};
use crate::models::User;

/// Buffer size for the session event channel.
/// Events are rare (login, refresh, logout), 16 leaves room for slow listeners.
const EVENT_BUFFER_SIZE: usize = 16;

/// Body of a successful `POST /login/`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub user: Option<User>,
}

/// Lifecycle notifications published by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { username: Option<String> },
    Refreshed,
    LoggedOut,
    /// The refresh token was rejected and the session was wiped.
    /// Front-ends should send the user back to login.
    Expired,
}

/// Owner of the stored credential pair and user profile.
/// Clone is cheap; clones share the same store, epoch and event channel.
///
/// Every login and every clear starts a new epoch. Writes made on behalf of
/// a refresh carry the epoch it started in and are dropped if it has moved on.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
    epoch: Arc<Mutex<u64>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            store,
            epoch: Arc::new(Mutex::new(0)),
            events,
        }
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        // The guarded value is a plain counter, a poisoned lock is still usable
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a key, logging storage failures instead of returning them
    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read session store");
                None
            }
        }
    }

    /// Current access token, if logged in
    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    /// The current epoch with the refresh token stored in it, read together
    pub fn refresh_credential(&self) -> (u64, Option<String>) {
        let epoch = self.lock_epoch();
        (*epoch, self.refresh_token())
    }

    /// Stored user profile. An unparseable profile reads as `None`.
    pub fn user(&self) -> Option<User> {
        let raw = self.read(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Error parsing stored user profile");
                None
            }
        }
    }

    /// Authenticated iff an access token is present
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Persist the result of a successful login
    pub fn store_login(&self, login: &LoginResponse) -> Result<()> {
        let mut epoch = self.lock_epoch();
        *epoch += 1;

        self.store
            .set(ACCESS_TOKEN_KEY, &login.access)
            .context("Failed to store access token")?;
        self.store
            .set(REFRESH_TOKEN_KEY, &login.refresh)
            .context("Failed to store refresh token")?;
        match &login.user {
            Some(user) => {
                let json = serde_json::to_string(user)?;
                self.store.set(USER_KEY, &json).context("Failed to store user profile")?;
            }
            None => self.store.remove(USER_KEY)?,
        }
        drop(epoch);

        let username = login.user.as_ref().map(|u| u.username.clone());
        info!(username = ?username, "Session stored");
        self.emit(SessionEvent::LoggedIn { username });
        Ok(())
    }

    /// Persist a refreshed access token, and the rotated refresh token if the
    /// backend sent one, provided the session is still in `expected` epoch.
    /// Returns `false` without writing when a login or clear came in between.
    pub fn store_refreshed_if(&self, expected: u64, access: &str, refresh: Option<&str>) -> Result<bool> {
        let epoch = self.lock_epoch();
        if *epoch != expected {
            debug!(expected, current = *epoch, "Discarding refresh from a replaced session");
            return Ok(false);
        }

        self.store
            .set(ACCESS_TOKEN_KEY, access)
            .context("Failed to store refreshed access token")?;
        if let Some(refresh) = refresh {
            self.store
                .set(REFRESH_TOKEN_KEY, refresh)
                .context("Failed to store rotated refresh token")?;
        }
        drop(epoch);

        debug!(rotated = refresh.is_some(), "Access token refreshed");
        self.emit(SessionEvent::Refreshed);
        Ok(true)
    }

    fn clear_locked(&self, epoch: &mut MutexGuard<'_, u64>) -> Result<()> {
        **epoch += 1;
        self.store
            .remove_all(&SESSION_KEYS)
            .context("Failed to clear session store")
    }

    /// Remove access token, refresh token and user profile together
    pub fn clear(&self) -> Result<()> {
        let mut epoch = self.lock_epoch();
        self.clear_locked(&mut epoch)
    }

    /// User-initiated logout
    pub fn logout(&self) -> Result<()> {
        self.clear()?;
        info!("Logged out");
        self.emit(SessionEvent::LoggedOut);
        Ok(())
    }

    /// Terminal refresh failure in `expected` epoch: wipe credentials and
    /// signal the front-end.
    ///
    /// Returns `false` and leaves the store alone when the session was
    /// replaced since. `Expired` is only sent when credentials were actually
    /// removed, so a session that is already empty does not expire twice.
    /// Storage errors are logged.
    pub fn expire_if(&self, expected: u64) -> bool {
        let mut epoch = self.lock_epoch();
        if *epoch != expected {
            debug!(expected, current = *epoch, "Not expiring a replaced session");
            return false;
        }

        let had_credentials = self.access_token().is_some() || self.refresh_token().is_some();
        if let Err(e) = self.clear_locked(&mut epoch) {
            warn!(error = %e, "Failed to clear expired session");
        }
        drop(epoch);

        if had_credentials {
            warn!("Session expired, login required");
            self.emit(SessionEvent::Expired);
        }
        true
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

//! Single-flight access token refresh.
//!
//! Requests that hit a 401 at the same time all wait on one refresh call.
//! The refresh runs on its own task, so a waiter that gets dropped does not
//! abort it for the others.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error::{ApiError, RefreshError};
use crate::auth::Session;

type RefreshFuture = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// Body of a successful `POST /token/refresh/`.
/// `refresh` is only present when the backend rotates refresh tokens.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

struct InFlight {
    generation: u64,
    /// Session epoch the refresh started in
    epoch: u64,
    future: RefreshFuture,
}

struct Inner {
    http: Client,
    refresh_url: String,
    session: Session,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
}

/// Coordinates token refreshes for one session.
/// Clone is cheap; clones share the in-flight refresh.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(http: Client, refresh_url: impl Into<String>, session: Session) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                refresh_url: refresh_url.into(),
                session,
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Get an access token to replace `stale`, the token a rejected request was sent with.
    ///
    /// Joins a refresh already in progress for the current session. If the
    /// stored token has changed since `stale` was read, a refresh already
    /// finished and its token is returned without another network call.
    /// A refresh overtaken by a login or logout fails with
    /// `RefreshError::Superseded` and writes nothing.
    pub async fn refresh(&self, stale: Option<&str>) -> Result<String, RefreshError> {
        let future = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .map_err(|_| RefreshError::Aborted)?;

            let (epoch, refresh_token) = self.inner.session.refresh_credential();
            match slot.as_ref() {
                Some(in_flight) if in_flight.epoch == epoch => {
                    debug!(generation = in_flight.generation, "Joining in-flight token refresh");
                    in_flight.future.clone()
                }
                _ => {
                    if let Some(current) = self.inner.session.access_token() {
                        if stale != Some(current.as_str()) {
                            debug!("Access token already refreshed, reusing it");
                            return Ok(current);
                        }
                    }
                    let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let future = self.spawn(generation, epoch, refresh_token);
                    *slot = Some(InFlight {
                        generation,
                        epoch,
                        future: future.clone(),
                    });
                    future
                }
            }
        };

        future.await
    }

    fn spawn(&self, generation: u64, epoch: u64, refresh: Option<String>) -> RefreshFuture {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let result = this.run(epoch, refresh).await;
            this.finish(generation);
            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "Token refresh task failed");
                    Err(RefreshError::Aborted)
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Release the slot so the next 401 can start a new refresh
    fn finish(&self, generation: u64) {
        if let Ok(mut slot) = self.inner.in_flight.lock() {
            if slot.as_ref().map(|f| f.generation) == Some(generation) {
                *slot = None;
            }
        }
    }

    async fn run(&self, epoch: u64, refresh: Option<String>) -> Result<String, RefreshError> {
        let result = match refresh {
            Some(refresh) => self.exchange(epoch, &refresh).await,
            None => Err(RefreshError::MissingCredential),
        };

        match result {
            Ok(access) => {
                info!("Access token refreshed");
                Ok(access)
            }
            Err(RefreshError::Superseded) => {
                debug!("Session changed during token refresh");
                Err(RefreshError::Superseded)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                if self.inner.session.expire_if(epoch) {
                    Err(e)
                } else {
                    Err(RefreshError::Superseded)
                }
            }
        }
    }

    async fn exchange(&self, epoch: u64, refresh: &str) -> Result<String, RefreshError> {
        let response = self
            .inner
            .http
            .post(&self.inner.refresh_url)
            .json(&serde_json::json!({ "refresh": refresh }))
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                body: ApiError::truncate_body(&body),
            });
        }

        let parsed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

        if parsed.access.is_empty() {
            return Err(RefreshError::InvalidResponse("empty access token".to_string()));
        }

        let stored = self
            .inner
            .session
            .store_refreshed_if(epoch, &parsed.access, parsed.refresh.as_deref())
            .map_err(|e| RefreshError::Storage(e.to_string()))?;
        if !stored {
            return Err(RefreshError::Superseded);
        }

        Ok(parsed.access)
    }
}

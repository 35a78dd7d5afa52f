//! Session-aware HTTP client for the fitbook REST API.
//!
//! Every request goes through [`SessionClient::request`], which attaches the
//! stored access token, and on a 401 refreshes it once and replays the
//! request with the new token.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{ApiError, RefreshError};
use super::refresh::RefreshCoordinator;
use crate::auth::Session;
use crate::config::Config;

/// HTTP request timeout in seconds.
/// 30s allows for slow plan generation while failing fast enough for good UX.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// An outbound call, kept whole so it can be replayed after a token refresh.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    anonymous: bool,
    retried: bool,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            anonymous: false,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Send without credentials and never refresh on 401.
    /// Used for login, registration and other public endpoints.
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON payload
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(ApiError::Encode)?;
        Ok(self.body(value))
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// Whether this request has already been replayed after a refresh
    pub fn is_retried(&self) -> bool {
        self.retried
    }
}

struct Inner {
    http: Client,
    base_url: String,
    session: Session,
    refresher: RefreshCoordinator,
}

/// API client for the fitbook backend.
/// Clone is cheap - clones share the connection pool, session and refresh state.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

impl SessionClient {
    /// Create a client for `base_url` (e.g. `http://localhost:8000/api`)
    pub fn new(
        base_url: impl Into<String>,
        refresh_url: impl Into<String>,
        timeout: Duration,
        session: Session,
    ) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        let refresher = RefreshCoordinator::new(http.clone(), refresh_url, session.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.into().trim_end_matches('/').to_string(),
                session,
                refresher,
            }),
        })
    }

    pub fn from_config(config: &Config, session: Session) -> Result<Self, ApiError> {
        Self::new(
            config.api_base_url(),
            config.refresh_url(),
            Duration::from_secs(config.timeout_secs),
            session,
        )
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.inner.base_url, path)
        } else {
            format!("{}/{}", self.inner.base_url, path)
        }
    }

    async fn dispatch(&self, spec: &RequestSpec, token: Option<&str>) -> Result<Response, ApiError> {
        let url = self.url(&spec.path);

        let mut builder = self
            .inner
            .http
            .request(spec.method.clone(), &url)
            .headers(spec.headers.clone())
            .header(header::CONTENT_TYPE, "application/json");

        if !spec.query.is_empty() {
            builder = builder.query(&spec.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = spec.body {
            builder = builder.json(body);
        }

        debug!(method = %spec.method, url = %url, retried = spec.retried, "Sending request");
        Ok(builder.send().await?)
    }

    /// Send a request, refreshing the access token once if it is rejected.
    ///
    /// Any response other than a 401 is returned as-is, error statuses
    /// included. A 401 on the replay is returned as `ApiError::Unauthorized`;
    /// a failed refresh clears the session and returns `ApiError::SessionExpired`.
    pub async fn request(&self, mut spec: RequestSpec) -> Result<Response, ApiError> {
        let token = if spec.anonymous {
            None
        } else {
            self.inner.session.access_token()
        };

        let response = self.dispatch(&spec, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED || spec.anonymous {
            return Ok(response);
        }
        if spec.retried {
            debug!(path = %spec.path, "Request rejected after refresh, giving up");
            return Err(ApiError::Unauthorized);
        }

        spec.retried = true;
        debug!(path = %spec.path, "Access token rejected, refreshing");

        let fresh = match self.inner.refresher.refresh(token.as_deref()).await {
            Ok(fresh) => fresh,
            Err(RefreshError::Superseded) => {
                debug!(path = %spec.path, "Session replaced while refreshing, dropping request");
                return Err(ApiError::Unauthorized);
            }
            Err(e) => {
                warn!(path = %spec.path, error = %e, "Dropping request, session expired");
                return Err(ApiError::SessionExpired(e));
            }
        };

        let response = self.dispatch(&spec, Some(&fresh)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(path = %spec.path, "Replayed request still unauthorized");
            return Err(ApiError::Unauthorized);
        }
        Ok(response)
    }

    /// Like [`request`](Self::request), but gives up with `ApiError::Cancelled`
    /// as soon as `cancel` completes. A cancelled request stops waiting on any
    /// refresh; a refresh other requests depend on keeps running.
    pub async fn request_with_cancel<C>(&self, spec: RequestSpec, cancel: C) -> Result<Response, ApiError>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => Err(ApiError::Cancelled),
            result = self.request(spec) => result,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    pub(crate) async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request and decode a successful JSON response
    pub async fn request_json<T: DeserializeOwned>(&self, spec: RequestSpec) -> Result<T, ApiError> {
        let path = spec.path.clone();
        let response = Self::check_response(self.request(spec).await?).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e))
        })
    }

    /// Send a request whose success body is ignored
    pub async fn request_empty(&self, spec: RequestSpec) -> Result<(), ApiError> {
        Self::check_response(self.request(spec).await?).await?;
        Ok(())
    }
}

//! Core library for fitbook.
//!
//! Provides the session-aware API client for the fitness class booking
//! backend, the data models it exchanges, and credential storage.
//!
//! All outbound calls go through [`api::SessionClient`], which attaches the
//! current access token, refreshes it once on a 401 and replays the request.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiError, RequestSpec, SessionClient};
pub use auth::{Session, SessionEvent};
pub use config::Config;

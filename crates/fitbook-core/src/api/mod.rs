//! REST API client module for the fitbook backend.
//!
//! This module provides the `SessionClient` through which every call to the
//! backend is made: class listings, bookings, fitness plans and auth.
//!
//! The API uses JWT bearer authentication. A 401 triggers one refresh of
//! the access token (shared between concurrent requests) and one replay of
//! the rejected request.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod refresh;

pub use client::{RequestSpec, SessionClient};
pub use error::{ApiError, RefreshError};
pub use refresh::RefreshCoordinator;

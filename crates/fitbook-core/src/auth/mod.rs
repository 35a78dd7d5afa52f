//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `TokenStore`: the key-value store holding tokens and the user profile,
//!   with in-memory, file and OS keyring backends
//! - `Session`: the single owner of that store, exposing read/store/clear
//!   operations and a broadcast channel of session events
//!
//! Feature code reads credentials through `Session` only.

pub mod session;
pub mod store;

pub use session::{LoginResponse, Session, SessionEvent};
pub use store::{FileStore, KeyringStore, MemoryStore, TokenStore};

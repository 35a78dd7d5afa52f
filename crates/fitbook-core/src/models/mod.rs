//! Data models for fitbook entities.
//!
//! This module contains the data structures exchanged with the backend:
//!
//! - `User`, `NewUser`: account profile and registration form
//! - `FitnessClass`, `ClassForm`: class listings and the create/edit form
//! - `Booking`, `BookingRequest`: class reservations
//! - `FitnessPlan`, `PlanDay`, `PlanRequest`: AI-generated fitness plans
//!
//! Form types validate locally before anything is sent.

pub mod booking;
pub mod fitness_class;
pub mod plan;
pub mod user;
pub mod validation;

pub use booking::{Booking, BookingRequest};
pub use fitness_class::{ClassForm, FitnessClass};
pub use plan::{FitnessPlan, PlanDay, PlanRequest};
pub use user::{NewUser, User, UserProfile};
pub use validation::FieldErrors;

//! Class reservations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::FieldErrors;

/// A booking as returned by `GET /bookings/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: i64,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub slots: Option<u32>,
    #[serde(default)]
    pub fitness_class_details: Option<BookedClass>,
}

/// Class summary embedded in a booking.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookedClass {
    #[serde(default)]
    pub class_type: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn class_type(&self) -> &str {
        self.fitness_class_details
            .as_ref()
            .and_then(|c| c.class_type.as_deref())
            .unwrap_or("N/A")
    }

    pub fn instructor(&self) -> &str {
        self.fitness_class_details
            .as_ref()
            .and_then(|c| c.instructor.as_deref())
            .unwrap_or("N/A")
    }
}

/// Payload for `POST /bookings/`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BookingRequest {
    pub class_id: i64,
    pub slots: u32,
}

impl BookingRequest {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.class_id <= 0 {
            errors.add("class_id", "Please select a class");
        }
        if self.slots < 1 {
            errors.add("slots", "Please enter a valid number of slots");
        }
        errors.into_result()
    }
}

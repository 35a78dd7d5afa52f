//! Account models: the stored user profile and the registration form.

use serde::{Deserialize, Serialize};

use super::validation::{is_valid_email, FieldErrors};

/// Minimum password length accepted at registration
const MIN_PASSWORD_LENGTH: usize = 6;

/// The user profile returned by `POST /login/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl User {
    pub fn role(&self) -> Option<&str> {
        self.profile.as_ref().and_then(|p| p.role.as_deref())
    }
}

/// Registration form, sent to `POST /register/`.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub phone_number: String,
    pub role: String,
    pub password: String,
    pub confirm_password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.username.trim().is_empty() {
            errors.add("username", "Username is required");
        }
        if self.email.trim().is_empty() {
            errors.add("email", "Email is required");
        } else if !is_valid_email(&self.email) {
            errors.add("email", "Invalid email format");
        }
        if self.phone_number.trim().is_empty() {
            errors.add("phone_number", "Phone number is required");
        }
        if self.role.is_empty() {
            errors.add("role", "Role is required");
        }
        if self.password.is_empty() {
            errors.add("password", "Password is required");
        } else if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add("password", "Password must be at least 6 characters");
        }
        if self.password != self.confirm_password {
            errors.add("confirm_password", "Passwords do not match");
        }

        errors.into_result()
    }

    /// JSON body for the register endpoint. The confirmation field stays local.
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "username": self.username,
            "email": self.email,
            "password": self.password,
            "profile": {
                "phone_number": self.phone_number,
                "role": self.role,
            },
        })
    }
}

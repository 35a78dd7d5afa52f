//! Fitness class listings and the create/edit form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::FieldErrors;

/// A scheduled class as returned by `GET /classes/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FitnessClass {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub class_type: Option<String>,
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub total_slots: Option<u32>,
    #[serde(default)]
    pub available_slots: Option<i64>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default, rename = "Location")]
    pub location: Option<String>,
}

impl FitnessClass {
    /// Display title: the class type, falling back to the class name
    pub fn title(&self) -> &str {
        self.class_type
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("N/A")
    }

    /// Whether at least one slot can still be booked
    pub fn has_availability(&self) -> bool {
        self.available_slots.map(|n| n > 0).unwrap_or(false)
    }
}

/// Payload for `POST /classes/` and `PUT /classes/{id}/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassForm {
    pub name: String,
    pub date_time: DateTime<Utc>,
    pub duration: u32,
    pub instructor: String,
    pub total_slots: u32,
    pub difficulty: String,
    #[serde(rename = "Location")]
    pub location: String,
}

impl ClassForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        self.validate_at(Utc::now())
    }

    /// Validate against a fixed "now" so scheduling checks are testable
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.name.trim().is_empty() {
            errors.add("name", "Class type is required");
        }
        if self.date_time < now {
            errors.add("date_time", "Date and time must be in the future");
        }
        if self.instructor.trim().is_empty() {
            errors.add("instructor", "Instructor is required");
        }
        if self.total_slots < 1 {
            errors.add("total_slots", "Total slots must be at least 1");
        }
        if self.duration < 1 {
            errors.add("duration", "Duration must be at least 1 minute");
        }
        if self.difficulty.trim().is_empty() {
            errors.add("difficulty", "Difficulty level is required");
        }
        if self.location.trim().is_empty() {
            errors.add("location", "Location is required");
        }

        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn form(now: DateTime<Utc>) -> ClassForm {
        ClassForm {
            name: "Yoga".to_string(),
            date_time: now + Duration::days(1),
            duration: 60,
            instructor: "Meera".to_string(),
            total_slots: 20,
            difficulty: "Beginner".to_string(),
            location: "Studio A".to_string(),
        }
    }

    #[test]
    fn test_parse_class_listing() {
        let json = r#"[{"id":3,"name":"Yoga","class_type":"Yoga","date_time":"2030-01-05T06:30:00+05:30","instructor":"Meera","total_slots":20,"available_slots":0,"Location":"Studio A"}]"#;
        let classes: Vec<FitnessClass> = serde_json::from_str(json).expect("Failed to parse classes");
        assert_eq!(classes.len(), 1);
        let class = &classes[0];
        assert_eq!(class.title(), "Yoga");
        assert_eq!(class.location.as_deref(), Some("Studio A"));
        assert!(!class.has_availability());
        assert_eq!(
            class.date_time.map(|d| d.to_rfc3339()),
            Some("2030-01-05T01:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_valid_form() {
        let now = Utc::now();
        assert!(form(now).validate_at(now).is_ok());
    }

    #[test]
    fn test_form_rejects_past_and_empty_fields() {
        let now = Utc::now();
        let bad = ClassForm {
            name: " ".to_string(),
            date_time: now - Duration::minutes(5),
            duration: 0,
            total_slots: 0,
            location: String::new(),
            ..form(now)
        };
        let errors = bad.validate_at(now).unwrap_err();
        assert_eq!(errors.get("name"), Some("Class type is required"));
        assert_eq!(errors.get("date_time"), Some("Date and time must be in the future"));
        assert_eq!(errors.get("duration"), Some("Duration must be at least 1 minute"));
        assert_eq!(errors.get("total_slots"), Some("Total slots must be at least 1"));
        assert_eq!(errors.get("location"), Some("Location is required"));
        assert_eq!(errors.get("instructor"), None);
    }

    #[test]
    fn test_form_serializes_location_key() {
        let value = serde_json::to_value(form(Utc::now())).unwrap();
        assert_eq!(value["Location"], "Studio A");
        assert!(value.get("location").is_none());
    }
}

//! AI-generated fitness plans.

use serde::{Deserialize, Serialize};

/// Default plan length in days
const DEFAULT_DURATION_DAYS: u32 = 30;

/// Default budget sent to the plan generator
const DEFAULT_BUDGET: u32 = 2000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FitnessPlan {
    pub id: i64,
    pub plan_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub plan_details: Vec<PlanDay>,
}

/// One day of a plan. Generated plans carry either the exercise/meal
/// narrative or the per-meal breakdown, so every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanDay {
    #[serde(default)]
    pub day: Option<u32>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "exercisePlan")]
    pub exercise_plan: Option<String>,
    #[serde(default, rename = "mealPlan")]
    pub meal_plan: Option<String>,
    #[serde(default)]
    pub calories: Option<u32>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub breakfast: Option<String>,
    #[serde(default)]
    pub lunch: Option<String>,
    #[serde(default)]
    pub dinner: Option<String>,
}

impl PlanDay {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }
}

impl FitnessPlan {
    pub fn completed_days(&self) -> usize {
        self.plan_details.iter().filter(|d| d.is_completed()).count()
    }

    /// Completed share of the plan as a whole percentage. Empty plans are 0%.
    pub fn progress_percent(&self) -> u32 {
        let total = self.plan_details.len();
        if total == 0 {
            return 0;
        }
        ((self.completed_days() as f64 / total as f64) * 100.0).round() as u32
    }
}

/// Request body for `POST /ai-assistance/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanRequest {
    pub plan_name: String,
    pub description: String,
    pub start_date: String,
    pub duration: u32,
    pub budget: u32,
    pub goal: String,
    pub level: String,
}

impl Default for PlanRequest {
    fn default() -> Self {
        Self {
            plan_name: String::new(),
            description: String::new(),
            start_date: String::new(),
            duration: DEFAULT_DURATION_DAYS,
            budget: DEFAULT_BUDGET,
            goal: "lose weight".to_string(),
            level: "Beginner".to_string(),
        }
    }
}

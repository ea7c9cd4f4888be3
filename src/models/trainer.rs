use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, sqlx::Type)]
#[serde(rename_all = "PascalCase")]
#[sqlx(type_name = "trainer_availability", rename_all = "lowercase")]
pub enum TrainerAvailability {
    #[serde(alias = "morning")]
    Morning,
    #[serde(alias = "evening")]
    Evening,
    #[default]
    #[serde(alias = "both")]
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainerProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub specialization: String,
    pub experience_years: i32,
    pub qualifications: String,
    pub availability: TrainerAvailability,
    pub salary_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TrainerProfileRequest {
    #[validate(length(min = 1, max = 255, message = "must be 1 to 255 characters"))]
    pub specialization: String,
    #[validate(range(min = 0, max = 80, message = "must be between 0 and 80"))]
    pub experience_years: i32,
    #[serde(default)]
    pub qualifications: String,
    #[serde(default)]
    pub availability: TrainerAvailability,
    #[validate(range(min = 0, message = "must not be negative"))]
    #[serde(default)]
    pub salary_cents: i64,
}

/// Trainer as shown to members: contact details plus profile.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub specialization: Option<String>,
    pub experience_years: Option<i32>,
    pub qualifications: Option<String>,
    pub availability: Option<TrainerAvailability>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainerAssignment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub trainer_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssignmentDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub trainer_id: Uuid,
    pub trainer_name: String,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AssignTrainerRequest {
    pub user_id: Uuid,
    pub trainer_id: Uuid,
}

/// A member as seen by their trainer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClientSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub plan_name: Option<String>,
    pub membership_end_date: Option<chrono::NaiveDate>,
    pub assigned_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn availability_uses_capitalized_names() {
        assert_eq!(
            serde_json::to_value(TrainerAvailability::Morning).unwrap(),
            json!("Morning")
        );
        let parsed: TrainerAvailability = serde_json::from_value(json!("evening")).unwrap();
        assert_eq!(parsed, TrainerAvailability::Evening);
    }

    #[test]
    fn profile_request_defaults() {
        let request: TrainerProfileRequest = serde_json::from_value(json!({
            "specialization": "Strength",
            "experience_years": 4
        }))
        .unwrap();

        assert_eq!(request.availability, TrainerAvailability::Both);
        assert_eq!(request.salary_cents, 0);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn profile_request_rejects_negative_experience() {
        let request: TrainerProfileRequest = serde_json::from_value(json!({
            "specialization": "Yoga",
            "experience_years": -1
        }))
        .unwrap();

        assert!(request.validate().is_err());
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::auth::UserRole;
use crate::models::{
    MembershipDetail, MembershipStatus, PaymentMethod, PaymentStatus, TrainerProfile,
    TrainerProfileRequest, TrainerSummary,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
pub enum Gender {
    #[serde(alias = "Male")]
    Male,
    #[serde(alias = "Female")]
    Female,
    #[serde(alias = "Others")]
    Others,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub uid: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub user_type: UserRole,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub phone_number: String,
    pub profile_picture_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 120, message = "must be 1 to 120 characters"))]
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(url(message = "must be a valid URL"))]
    pub profile_picture_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    #[serde(rename = "type")]
    pub user_type: Option<String>,
}

/// Row of the admin user list: the user plus active membership and trainer summary.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserListItem {
    pub id: Uuid,
    pub uid: String,
    pub email: String,
    pub name: String,
    pub user_type: UserRole,
    pub phone_number: String,
    pub is_active: bool,
    pub plan_name: Option<String>,
    pub membership_status: Option<MembershipStatus>,
    pub membership_end_date: Option<NaiveDate>,
    pub specialization: Option<String>,
    pub experience_years: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserProfileResponse {
    #[serde(flatten)]
    pub user: User,
    pub membership: Option<MembershipDetail>,
    pub trainer_profile: Option<TrainerProfile>,
    pub assigned_trainer: Option<TrainerSummary>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OtpVerification {
    pub email: String,
    pub otp: i32,
    pub failed_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    /// Accepted as a JSON string or number.
    #[serde(default)]
    pub otp: serde_json::Value,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 120, message = "must be 1 to 120 characters"))]
    pub name: String,
    pub phone_number: String,
    #[serde(default = "default_user_type")]
    pub user_type: String,
    pub subscription_plan_id: Option<Uuid>,
    #[serde(default = "PaymentMethod::offline")]
    pub payment_method: PaymentMethod,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub trainer_profile: Option<TrainerProfileRequest>,
}

fn default_user_type() -> String {
    "user".to_string()
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: Uuid,
    pub uid: String,
    pub user_type: UserRole,
    pub subscription_plan: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: Option<String>,
}

/// Emails are compared case-insensitively and stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            uid: "uid-123".to_string(),
            email: "member@example.com".to_string(),
            password_hash: "$2b$12$hash".to_string(),
            name: "Member".to_string(),
            user_type: UserRole::User,
            date_of_birth: None,
            gender: Some(Gender::Female),
            phone_number: "+15551234567".to_string(),
            profile_picture_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let value = serde_json::to_value(sample_user()).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["gender"], json!("female"));
        assert_eq!(value["user_type"], json!("user"));
    }

    #[test]
    fn gender_accepts_capitalized_names() {
        let gender: Gender = serde_json::from_value(json!("Others")).unwrap();
        assert_eq!(gender, Gender::Others);
    }

    #[test]
    fn update_request_validates_present_fields_only() {
        let empty = UpdateUserRequest {
            name: None,
            phone_number: None,
            gender: None,
            date_of_birth: None,
            profile_picture_url: None,
            is_active: Some(false),
        };
        assert!(empty.validate().is_ok());

        let bad = UpdateUserRequest {
            name: Some(String::new()),
            profile_picture_url: Some("not a url".to_string()),
            ..empty
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("profile_picture_url"));
    }

    #[test]
    fn register_request_defaults() {
        let request: RegisterRequest = serde_json::from_value(json!({
            "email": "new@example.com",
            "password": "Password123",
            "name": "New Member",
            "phone_number": "+15551234567"
        }))
        .unwrap();

        assert_eq!(request.user_type, "user");
        assert_eq!(request.payment_method, PaymentMethod::Offline);
        assert!(request.subscription_plan_id.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn send_otp_rejects_malformed_email() {
        let request = SendOtpRequest {
            email: Some("not-an-email".to_string()),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Member@Example.COM "), "member@example.com");
    }
}

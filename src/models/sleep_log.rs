use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::validate_sleep_quality;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SleepLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sleep_date: NaiveDate,
    pub sleep_duration_hours: f64,
    pub sleep_quality: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SleepLogRequest {
    pub sleep_date: NaiveDate,
    pub sleep_duration_hours: f64,
    pub sleep_quality: String,
}

impl SleepLogRequest {
    pub fn check(&self) -> Result<(), AppError> {
        if !(self.sleep_duration_hours > 0.0 && self.sleep_duration_hours <= 24.0) {
            return Err(AppError::validation(
                "sleep_duration_hours: must be greater than 0 and at most 24",
            ));
        }
        validate_sleep_quality(&self.sleep_quality)
    }
}

#[derive(Debug, Deserialize)]
pub struct SleepLogQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(hours: f64, quality: &str) -> SleepLogRequest {
        SleepLogRequest {
            sleep_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            sleep_duration_hours: hours,
            sleep_quality: quality.to_string(),
        }
    }

    #[test]
    fn duration_bounds() {
        assert!(request(7.5, "Good").check().is_ok());
        assert!(request(24.0, "Poor").check().is_ok());
        assert!(request(0.0, "Good").check().is_err());
        assert!(request(24.5, "Good").check().is_err());
        assert!(request(f64::NAN, "Good").check().is_err());
    }

    #[test]
    fn quality_must_be_known() {
        assert!(request(8.0, "Restless").check().is_err());
    }
}

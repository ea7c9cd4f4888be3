use std::sync::OnceLock;

use regex::Regex;

use crate::error::AppError;

pub const SLEEP_QUALITIES: [&str; 4] = ["Poor", "Average", "Good", "Excellent"];

fn phone_regex() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+?[0-9][0-9\- ]{6,18}[0-9]$").expect("phone pattern compiles"))
}

/// Phone numbers: optional leading `+`, digits with spaces or dashes, at most 20 chars.
pub fn validate_phone_number(phone: &str) -> Result<(), AppError> {
    let phone = phone.trim();
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if phone.len() > 20 || digits < 7 || !phone_regex().is_match(phone) {
        return Err(AppError::validation("phone_number: must be a valid phone number"));
    }
    Ok(())
}

pub fn validate_sleep_quality(quality: &str) -> Result<(), AppError> {
    if SLEEP_QUALITIES.contains(&quality) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "sleep_quality: must be one of {}",
            SLEEP_QUALITIES.join(", ")
        )))
    }
}

/// Exercise and meal payloads are stored as JSON arrays.
pub fn validate_json_array(field: &str, value: &serde_json::Value) -> Result<(), AppError> {
    if value.is_array() {
        Ok(())
    } else {
        Err(AppError::validation(format!("{field}: must be a JSON array")))
    }
}

/// Meals are arrays of non-empty food names.
pub fn validate_food_list(field: &str, items: &[String]) -> Result<(), AppError> {
    if items.iter().any(|item| item.trim().is_empty() || item.len() > 255) {
        return Err(AppError::validation(format!(
            "{field}: food names must be 1 to 255 characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn phone_numbers() {
        assert!(validate_phone_number("+919876543210").is_ok());
        assert!(validate_phone_number("555-123-4567").is_ok());
        assert!(validate_phone_number("12345").is_err());
        assert!(validate_phone_number("phone").is_err());
        assert!(validate_phone_number("+1 555 123 4567 890 12345").is_err());
    }

    #[test]
    fn sleep_quality_vocabulary() {
        for quality in SLEEP_QUALITIES {
            assert!(validate_sleep_quality(quality).is_ok());
        }
        assert!(validate_sleep_quality("good").is_err());
        assert!(validate_sleep_quality("Terrible").is_err());
    }

    #[test]
    fn json_payloads_must_be_arrays() {
        assert!(validate_json_array("exercise_data", &json!([{"name": "squat"}])).is_ok());
        assert!(validate_json_array("exercise_data", &json!({"name": "squat"})).is_err());
        assert!(validate_json_array("exercise_data", &json!("squat")).is_err());
    }

    #[test]
    fn food_lists_reject_blank_names() {
        assert!(validate_food_list("lunch", &["rice".to_string(), "dal".to_string()]).is_ok());
        assert!(validate_food_list("lunch", &[]).is_ok());
        assert!(validate_food_list("lunch", &["  ".to_string()]).is_err());
    }
}

//! One-time registration codes.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

pub const OTP_MIN: i32 = 100_000;
pub const OTP_MAX: i32 = 999_999;

/// Wrong guesses allowed before a code is discarded
pub const MAX_OTP_ATTEMPTS: i32 = 5;

/// Generate a 6-digit one-time code
pub fn generate_otp() -> i32 {
    rand::thread_rng().gen_range(OTP_MIN..=OTP_MAX)
}

/// A code is expired once strictly more than `ttl` has passed since it was issued.
pub fn is_expired(created_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    now - created_at > ttl
}

pub fn attempts_exhausted(failed_attempts: i32) -> bool {
    failed_attempts >= MAX_OTP_ATTEMPTS
}

/// Parse a code submitted as a JSON string or number.
pub fn parse_otp(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

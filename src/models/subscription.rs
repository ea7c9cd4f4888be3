use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::PaymentMethod;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub duration_months: i32,
    pub personal_training: bool,
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, max = 255, message = "must be 1 to 255 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 1, max = 60, message = "must be between 1 and 60"))]
    pub duration_months: i32,
    #[serde(default)]
    pub personal_training: bool,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub price_cents: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePlanRequest {
    #[validate(length(min = 1, max = 255, message = "must be 1 to 255 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 60, message = "must be between 1 and 60"))]
    pub duration_months: Option<i32>,
    pub personal_training: Option<bool>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub price_cents: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "membership_status", rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership joined with the plan it was bought under.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MembershipDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub plan_name: String,
    pub price_cents: i64,
    pub duration_months: i32,
    pub personal_training: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeMembershipRequest {
    pub new_plan_id: Uuid,
    #[serde(default = "PaymentMethod::offline")]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
pub struct UpgradeMembershipResponse {
    pub message: String,
    pub membership: Membership,
    pub payment_id: Uuid,
    pub credit_cents: i64,
    pub amount_charged_cents: i64,
}

/// Add calendar months, clamping to the last day of the target month.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// Period covered by a plan bought on `start`.
pub fn membership_period(start: NaiveDate, duration_months: i32) -> (NaiveDate, NaiveDate) {
    let months = u32::try_from(duration_months.max(0)).unwrap_or(0);
    (start, add_months(start, months))
}

/// Unused value of the current membership, in cents.
///
/// `floor(price * remaining / total)` where remaining runs from `today` (inclusive)
/// to `end`, and total from `start` to `end`.
pub fn proration_credit(price_cents: i64, start: NaiveDate, end: NaiveDate, today: NaiveDate) -> i64 {
    let total_days = (end - start).num_days();
    if total_days <= 0 || price_cents <= 0 {
        return 0;
    }

    let remaining_days = (end - today).num_days().clamp(0, total_days);
    let credit = i128::from(price_cents) * i128::from(remaining_days) / i128::from(total_days);
    i64::try_from(credit).unwrap_or(price_cents)
}

pub fn prorated_charge(new_price_cents: i64, credit_cents: i64) -> i64 {
    (new_price_cents - credit_cents).max(0)
}

/// Price of switching to a plan: full price without a current membership,
/// otherwise the price minus the unused credit.
pub fn switch_price(new_plan: &SubscriptionPlan, current: Option<&MembershipDetail>, today: NaiveDate) -> (i64, i64) {
    match current {
        Some(current) => {
            let credit = proration_credit(current.price_cents, current.start_date, current.end_date, today);
            (credit, prorated_charge(new_plan.price_cents, credit))
        }
        None => (0, new_plan.price_cents),
    }
}

use chrono::{NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    membership_period, switch_price, CreatePlanRequest, Membership, MembershipDetail,
    MembershipStatus, PaymentStatus, SubscriptionPlan, UpdatePlanRequest,
    UpgradeMembershipRequest, UpgradeMembershipResponse,
};
use crate::services::cache::{QueryCache, PLANS_LIST};
use crate::services::payment_service::{insert_payment, NewPayment};

pub(crate) const MEMBERSHIP_DETAIL_SELECT: &str = r#"
    SELECT s.id, s.user_id, s.plan_id, p.name AS plan_name, p.price_cents,
           p.duration_months, p.personal_training, s.start_date, s.end_date,
           s.status, s.created_at
    FROM user_subscriptions s
    JOIN subscription_plans p ON p.id = s.plan_id
"#;

/// Plans and the membership lifecycle.
#[derive(Clone)]
pub struct SubscriptionService {
    db: PgPool,
    cache: QueryCache,
}

impl SubscriptionService {
    pub fn new(db: PgPool, cache: QueryCache) -> Self {
        Self { db, cache }
    }

    pub async fn list_plans(&self) -> AppResult<Vec<SubscriptionPlan>> {
        self.cache
            .get_or_load(PLANS_LIST, || async {
                let plans = sqlx::query_as::<_, SubscriptionPlan>(
                    "SELECT * FROM subscription_plans ORDER BY duration_months, price_cents",
                )
                .fetch_all(&self.db)
                .await?;
                Ok::<_, AppError>(plans)
            })
            .await
    }

    pub async fn get_plan(&self, plan_id: Uuid) -> AppResult<SubscriptionPlan> {
        sqlx::query_as::<_, SubscriptionPlan>("SELECT * FROM subscription_plans WHERE id = $1")
            .bind(plan_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Subscription plan not found"))
    }

    pub async fn create_plan(&self, request: CreatePlanRequest) -> AppResult<SubscriptionPlan> {
        let plan = sqlx::query_as::<_, SubscriptionPlan>(
            r#"
            INSERT INTO subscription_plans (id, name, description, duration_months, personal_training, price_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(request.duration_months)
        .bind(request.personal_training)
        .bind(request.price_cents)
        .fetch_one(&self.db)
        .await?;

        self.cache.invalidate(&[PLANS_LIST]).await;
        tracing::info!(plan_id = %plan.id, "Created subscription plan {}", plan.name);
        Ok(plan)
    }

    pub async fn update_plan(&self, plan_id: Uuid, request: UpdatePlanRequest) -> AppResult<SubscriptionPlan> {
        let plan = sqlx::query_as::<_, SubscriptionPlan>(
            r#"
            UPDATE subscription_plans
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                duration_months = COALESCE($4, duration_months),
                personal_training = COALESCE($5, personal_training),
                price_cents = COALESCE($6, price_cents),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(plan_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(request.description)
        .bind(request.duration_months)
        .bind(request.personal_training)
        .bind(request.price_cents)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Subscription plan not found"))?;

        self.cache.invalidate(&[PLANS_LIST]).await;
        Ok(plan)
    }

    pub async fn delete_plan(&self, plan_id: Uuid) -> AppResult<()> {
        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_subscriptions WHERE plan_id = $1 AND status = 'active'",
        )
        .bind(plan_id)
        .fetch_one(&self.db)
        .await?;

        if active > 0 {
            return Err(AppError::conflict(format!(
                "Plan has {active} active membership(s) and cannot be deleted"
            )));
        }

        let result = sqlx::query("DELETE FROM subscription_plans WHERE id = $1")
            .bind(plan_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Subscription plan not found"));
        }

        self.cache.invalidate(&[PLANS_LIST]).await;
        tracing::info!(plan_id = %plan_id, "Deleted subscription plan");
        Ok(())
    }

    /// Memberships of a user, newest first.
    pub async fn memberships_for_user(&self, user_id: Uuid) -> AppResult<Vec<MembershipDetail>> {
        let query = format!("{MEMBERSHIP_DETAIL_SELECT} WHERE s.user_id = $1 ORDER BY s.created_at DESC");
        let memberships = sqlx::query_as::<_, MembershipDetail>(&query)
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;

        Ok(memberships)
    }

    pub async fn active_membership(&self, user_id: Uuid) -> AppResult<Option<MembershipDetail>> {
        active_membership(&mut *self.db.acquire().await?, user_id, false).await
    }

    pub async fn cancel_active(&self, user_id: Uuid) -> AppResult<Membership> {
        let membership = cancel_active_membership(&mut *self.db.acquire().await?, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("No active subscription found"))?;

        self.cache.invalidate_user_lists().await;
        tracing::info!(user_id = %user_id, membership_id = %membership.id, "Cancelled membership");
        Ok(membership)
    }

    /// Switch a user to another plan, crediting the unused part of the current one.
    pub async fn upgrade(&self, user_id: Uuid, request: UpgradeMembershipRequest) -> AppResult<UpgradeMembershipResponse> {
        let user_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        if !user_exists {
            return Err(AppError::not_found("User not found"));
        }

        let plan = self.get_plan(request.new_plan_id).await?;
        let today = Utc::now().date_naive();

        let mut tx = self.db.begin().await?;

        let current = active_membership(&mut tx, user_id, true).await?;
        if current.as_ref().is_some_and(|m| m.plan_id == plan.id) {
            return Err(AppError::conflict("User is already subscribed to this plan"));
        }

        let (credit_cents, amount_charged_cents) = switch_price(&plan, current.as_ref(), today);

        cancel_active_membership(&mut tx, user_id).await?;
        let payment = insert_payment(
            &mut tx,
            NewPayment {
                user_id,
                plan_id: Some(plan.id),
                trainer_id: None,
                amount_cents: amount_charged_cents,
                method: request.payment_method,
                status: PaymentStatus::Completed,
            },
        )
        .await?;
        let membership = create_membership(&mut tx, user_id, &plan, today).await?;

        tx.commit().await?;
        self.cache.invalidate_user_lists().await;

        tracing::info!(
            user_id = %user_id,
            plan_id = %plan.id,
            credit_cents,
            amount_charged_cents,
            "Switched membership plan"
        );

        Ok(UpgradeMembershipResponse {
            message: format!("Subscription changed to {}", plan.name),
            membership,
            payment_id: payment.id,
            credit_cents,
            amount_charged_cents,
        })
    }

    /// Mark active memberships that ended before `today` as expired.
    pub async fn expire_overdue(&self, today: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE user_subscriptions
            SET status = 'expired', updated_at = NOW()
            WHERE status = 'active' AND end_date < $1
            "#,
        )
        .bind(today)
        .execute(&self.db)
        .await?;

        let expired = result.rows_affected();
        if expired > 0 {
            self.cache.invalidate_user_lists().await;
        }
        Ok(expired)
    }
}

pub(crate) async fn active_membership(
    conn: &mut PgConnection,
    user_id: Uuid,
    lock: bool,
) -> AppResult<Option<MembershipDetail>> {
    let mut query = format!("{MEMBERSHIP_DETAIL_SELECT} WHERE s.user_id = $1 AND s.status = 'active'");
    if lock {
        query.push_str(" FOR UPDATE OF s");
    }

    let membership = sqlx::query_as::<_, MembershipDetail>(&query)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;

    Ok(membership)
}

pub(crate) async fn cancel_active_membership(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> AppResult<Option<Membership>> {
    let membership = sqlx::query_as::<_, Membership>(
        r#"
        UPDATE user_subscriptions
        SET status = $2, updated_at = NOW()
        WHERE user_id = $1 AND status = 'active'
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(MembershipStatus::Cancelled)
    .fetch_optional(conn)
    .await?;

    Ok(membership)
}

/// New active membership for `plan` starting on `start`.
pub(crate) async fn create_membership(
    conn: &mut PgConnection,
    user_id: Uuid,
    plan: &SubscriptionPlan,
    start: NaiveDate,
) -> AppResult<Membership> {
    let (start_date, end_date) = membership_period(start, plan.duration_months);

    let membership = sqlx::query_as::<_, Membership>(
        r#"
        INSERT INTO user_subscriptions (id, user_id, plan_id, start_date, end_date, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(plan.id)
    .bind(start_date)
    .bind(end_date)
    .bind(MembershipStatus::Active)
    .fetch_one(conn)
    .await?;

    Ok(membership)
}

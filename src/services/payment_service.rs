use std::sync::Arc;

use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::error::{AppError, AppResult};
use crate::models::{
    generate_reference, switch_price, CheckoutRequest, CheckoutResponse, ConfirmPaymentResponse,
    Payment, PaymentMethod, PaymentStatus, User,
};
use crate::services::cache::QueryCache;
use crate::services::email_service::{EmailTemplates, Mailer};
use crate::services::subscription_service::{
    cancel_active_membership, create_membership, SubscriptionService,
};
use crate::services::trainer_service::upsert_assignment;

pub(crate) struct NewPayment {
    pub user_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub trainer_id: Option<Uuid>,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
}

pub(crate) async fn insert_payment(conn: &mut PgConnection, payment: NewPayment) -> AppResult<Payment> {
    let payment = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (id, user_id, plan_id, trainer_id, amount_cents, payment_date,
                              payment_method, status, reference)
        VALUES ($1, $2, $3, $4, $5, NOW(), $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payment.user_id)
    .bind(payment.plan_id)
    .bind(payment.trainer_id)
    .bind(payment.amount_cents)
    .bind(payment.method)
    .bind(payment.status)
    .bind(generate_reference())
    .fetch_one(conn)
    .await?;

    Ok(payment)
}

/// Checkout and confirmation of membership payments.
#[derive(Clone)]
pub struct PaymentService {
    db: PgPool,
    subscriptions: SubscriptionService,
    cache: QueryCache,
    mailer: Arc<dyn Mailer>,
    templates: EmailTemplates,
}

impl PaymentService {
    pub fn new(
        db: PgPool,
        subscriptions: SubscriptionService,
        cache: QueryCache,
        mailer: Arc<dyn Mailer>,
        templates: EmailTemplates,
    ) -> Self {
        Self {
            db,
            subscriptions,
            cache,
            mailer,
            templates,
        }
    }

    pub async fn payments_for_user(&self, user_id: Uuid) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE user_id = $1 ORDER BY payment_date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(payments)
    }

    pub async fn get_payment(&self, payment_id: Uuid) -> AppResult<Payment> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(payment_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Payment not found"))
    }

    /// Create a pending payment for a plan, priced against the current membership.
    pub async fn checkout(&self, user_id: Uuid, request: CheckoutRequest) -> AppResult<CheckoutResponse> {
        let plan = self.subscriptions.get_plan(request.plan_id).await?;

        if let Some(trainer_id) = request.trainer_id {
            if !plan.personal_training {
                return Err(AppError::validation(
                    "The selected plan does not include personal training",
                ));
            }
            let role: Option<UserRole> =
                sqlx::query_scalar("SELECT user_type FROM users WHERE id = $1 AND is_active")
                    .bind(trainer_id)
                    .fetch_optional(&self.db)
                    .await?;
            if role != Some(UserRole::Trainer) {
                return Err(AppError::validation("trainer_id does not refer to a trainer"));
            }
        }

        let current = self.subscriptions.active_membership(user_id).await?;
        let (credit_cents, amount_cents) = switch_price(&plan, current.as_ref(), Utc::now().date_naive());

        let payment = insert_payment(
            &mut *self.db.acquire().await?,
            NewPayment {
                user_id,
                plan_id: Some(plan.id),
                trainer_id: request.trainer_id,
                amount_cents,
                method: request.payment_method,
                status: PaymentStatus::Pending,
            },
        )
        .await?;

        tracing::info!(
            user_id = %user_id,
            payment_id = %payment.id,
            reference = %payment.reference,
            amount_cents,
            "Created pending payment"
        );

        Ok(CheckoutResponse {
            payment,
            plan_name: plan.name,
            credit_cents,
        })
    }

    /// Complete a pending payment: switch the membership and assign the trainer.
    pub async fn confirm(&self, session: &UserSession, payment_id: Uuid) -> AppResult<ConfirmPaymentResponse> {
        let mut tx = self.db.begin().await?;

        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Payment not found"))?;

        if payment.user_id != session.user_id && !session.is_admin() {
            return Err(AppError::forbidden());
        }
        if payment.status != PaymentStatus::Pending {
            return Err(AppError::conflict("Payment is not pending"));
        }

        let plan_id = payment
            .plan_id
            .ok_or_else(|| AppError::conflict("Payment plan no longer exists"))?;
        let plan = self.subscriptions.get_plan(plan_id).await?;

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2, payment_date = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(payment.id)
        .bind(PaymentStatus::Completed)
        .fetch_one(&mut *tx)
        .await?;

        cancel_active_membership(&mut tx, payment.user_id).await?;
        let membership = create_membership(&mut tx, payment.user_id, &plan, Utc::now().date_naive()).await?;

        let trainer_assigned = match payment.trainer_id {
            Some(trainer_id) => {
                upsert_assignment(&mut tx, payment.user_id, trainer_id).await?;
                true
            }
            None => false,
        };

        tx.commit().await?;
        self.cache.invalidate_user_lists().await;

        tracing::info!(
            payment_id = %payment.id,
            user_id = %payment.user_id,
            membership_id = %membership.id,
            "Payment completed"
        );

        self.send_receipt(&payment, &plan.name, membership.end_date).await;

        Ok(ConfirmPaymentResponse {
            message: "Payment completed".to_string(),
            payment,
            membership_id: membership.id,
            trainer_assigned,
        })
    }

    pub async fn mark_failed(&self, payment_id: Uuid) -> AppResult<Payment> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = 'failed', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.db)
        .await?;

        match payment {
            Some(payment) => {
                tracing::info!(payment_id = %payment.id, "Payment marked failed");
                Ok(payment)
            }
            None => {
                // Distinguish a missing payment from one that already settled
                self.get_payment(payment_id).await?;
                Err(AppError::conflict("Payment is not pending"))
            }
        }
    }

    async fn send_receipt(&self, payment: &Payment, plan_name: &str, valid_until: chrono::NaiveDate) {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(payment.user_id)
            .fetch_optional(&self.db)
            .await;

        let user = match user {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(err) => {
                tracing::error!(payment_id = %payment.id, "Could not load receipt recipient: {}", err);
                return;
            }
        };

        let message = self.templates.payment_receipt(
            &user.email,
            &user.name,
            plan_name,
            payment.amount_cents,
            &payment.reference,
            valid_until,
        );

        if let Err(err) = self.mailer.send(message).await {
            tracing::error!(payment_id = %payment.id, "Failed to send payment receipt: {}", err);
        }
    }
}

//! OTP-verified account creation and password resets.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::auth::otp::{attempts_exhausted, generate_otp, is_expired, parse_otp};
use crate::auth::password::{hash_password, validate_password_strength, PasswordPolicy};
use crate::auth::{MessageResponse, UserRole};
use crate::error::{AppError, AppResult};
use crate::models::{
    normalize_email, validate_phone_number, OtpVerification, PasswordResetRequest, PaymentStatus,
    RegisterRequest, RegisterResponse, SendOtpRequest, SubscriptionPlan, User, VerifyOtpRequest,
};
use crate::services::cache::QueryCache;
use crate::services::email_service::{EmailTemplates, Mailer};
use crate::services::identity_provider::IdentityProvider;
use crate::services::payment_service::{insert_payment, NewPayment};
use crate::services::subscription_service::{create_membership, SubscriptionService};
use crate::services::trainer_service::upsert_trainer_profile;

#[derive(Clone)]
pub struct RegistrationService {
    db: PgPool,
    identity: Arc<dyn IdentityProvider>,
    mailer: Arc<dyn Mailer>,
    templates: EmailTemplates,
    subscriptions: SubscriptionService,
    cache: QueryCache,
    otp_ttl: Duration,
}

impl RegistrationService {
    pub fn new(
        db: PgPool,
        identity: Arc<dyn IdentityProvider>,
        mailer: Arc<dyn Mailer>,
        templates: EmailTemplates,
        subscriptions: SubscriptionService,
        cache: QueryCache,
        otp_ttl: Duration,
    ) -> Self {
        Self {
            db,
            identity,
            mailer,
            templates,
            subscriptions,
            cache,
            otp_ttl,
        }
    }

    pub async fn send_otp(&self, request: SendOtpRequest) -> AppResult<MessageResponse> {
        request.validate()?;
        let email = request
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AppError::validation("email: is required"))?;

        if self.email_registered_locally(&email).await? {
            return Err(AppError::conflict("Email is already registered"));
        }

        let otp = generate_otp();
        sqlx::query(
            r#"
            INSERT INTO otp_verifications (email, otp, failed_attempts, created_at, verified_at)
            VALUES ($1, $2, 0, NOW(), NULL)
            ON CONFLICT (email) DO UPDATE
            SET otp = EXCLUDED.otp, failed_attempts = 0, created_at = NOW(), verified_at = NULL
            "#,
        )
        .bind(&email)
        .bind(otp)
        .execute(&self.db)
        .await?;

        let message = self.templates.otp(&email, otp, self.otp_ttl.num_minutes().max(1));
        self.mailer.send(message).await.map_err(|err| {
            tracing::error!("Failed to send OTP email to {}: {}", email, err);
            AppError::from(err)
        })?;

        tracing::info!("Sent registration OTP to {}", email);
        Ok(MessageResponse::new("OTP sent successfully"))
    }

    pub async fn verify_otp(&self, request: VerifyOtpRequest) -> AppResult<MessageResponse> {
        let email = request
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty());
        let (email, submitted) = match (email, parse_otp(&request.otp)) {
            (Some(email), Some(otp)) => (email, otp),
            _ => return Err(AppError::validation("Email and OTP are required")),
        };

        let record = sqlx::query_as::<_, OtpVerification>(
            "SELECT * FROM otp_verifications WHERE email = $1 AND verified_at IS NULL",
        )
        .bind(&email)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::validation("OTP not found or already used"))?;

        if is_expired(record.created_at, Utc::now(), self.otp_ttl) {
            return Err(AppError::validation("OTP has expired"));
        }
        if record.otp != submitted {
            let failed: i32 = sqlx::query_scalar(
                "UPDATE otp_verifications SET failed_attempts = failed_attempts + 1
                 WHERE email = $1 RETURNING failed_attempts",
            )
            .bind(&email)
            .fetch_one(&self.db)
            .await?;

            if attempts_exhausted(failed) {
                sqlx::query("DELETE FROM otp_verifications WHERE email = $1")
                    .bind(&email)
                    .execute(&self.db)
                    .await?;
                tracing::warn!("Discarded OTP for {} after {} failed attempts", email, failed);
                return Err(AppError::validation("Too many failed attempts, request a new OTP"));
            }
            return Err(AppError::validation("Invalid OTP"));
        }

        sqlx::query("UPDATE otp_verifications SET verified_at = NOW() WHERE email = $1")
            .bind(&email)
            .execute(&self.db)
            .await?;

        Ok(MessageResponse::new("OTP verified successfully"))
    }

    /// Create the identity account, then the local user with payment, membership
    /// and trainer profile in one transaction. The identity account is removed
    /// again when the transaction fails.
    pub async fn register(&self, request: RegisterRequest) -> AppResult<RegisterResponse> {
        request.validate()?;
        let role = UserRole::parse(&request.user_type)
            .ok_or_else(|| AppError::validation("Invalid user type"))?;
        validate_password_strength(&request.password, &PasswordPolicy::default())?;
        validate_phone_number(&request.phone_number)?;

        let trainer_profile = match (role, request.trainer_profile.as_ref()) {
            (UserRole::Trainer, Some(profile)) => {
                profile.validate()?;
                Some(profile)
            }
            (UserRole::Trainer, None) => {
                return Err(AppError::validation("trainer_profile: is required for trainers"))
            }
            _ => None,
        };

        let email = normalize_email(&request.email);
        let phone = request.phone_number.trim().to_string();

        if self.email_registered_locally(&email).await? {
            return Err(AppError::conflict("Email is already registered"));
        }
        let phone_taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE phone_number = $1)")
            .bind(&phone)
            .fetch_one(&self.db)
            .await?;
        if phone_taken {
            return Err(AppError::conflict("Phone number is already registered"));
        }
        if !self.email_verified(&email).await? {
            return Err(AppError::validation("Email has not been verified"));
        }

        let plan = match (role, request.subscription_plan_id) {
            (_, Some(plan_id)) => Some(self.subscriptions.get_plan(plan_id).await?),
            (UserRole::User, None) => {
                return Err(AppError::validation("subscription_plan_id: is required for members"))
            }
            _ => None,
        };

        if self.identity.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("Email is already registered"));
        }

        let uid = self.identity.create_user(&email, &request.password, &phone).await?;

        let password_hash = hash_password(&request.password)?;
        let new_user = NewUser {
            uid: &uid,
            email: &email,
            password_hash: &password_hash,
            phone: &phone,
            role,
            request: &request,
        };

        let created = match self.create_records(&new_user, plan.as_ref(), trainer_profile).await {
            Ok(created) => created,
            Err(err) => {
                tracing::error!("Registration of {} failed, removing identity account: {}", email, err);
                if let Err(cleanup) = self.identity.delete_user(&uid).await {
                    tracing::error!(uid = %uid, "Failed to remove identity account: {}", cleanup);
                }
                return Err(err);
            }
        };

        self.cache.invalidate_user_lists().await;
        tracing::info!(user_id = %created.user.id, role = %role, "Registered account");

        if matches!(role, UserRole::User | UserRole::Trainer) {
            self.send_welcome(&created.user).await;
        }

        Ok(RegisterResponse {
            message: format!("{} registered successfully", capitalize(role.as_str())),
            user_id: created.user.id,
            uid,
            user_type: role,
            subscription_plan: plan.map(|plan| plan.name),
            payment_status: created.payment_status,
            payment_method: created.payment_status.map(|_| request.payment_method),
        })
    }

    pub async fn request_password_reset(&self, request: PasswordResetRequest) -> AppResult<MessageResponse> {
        let email = request
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AppError::validation("email: is required"))?;

        let link = self.identity.password_reset_link(&email).await.map_err(|err| {
            tracing::error!("Failed to create password reset link for {}: {}", email, err);
            AppError::from(err)
        })?;

        self.mailer
            .send(self.templates.password_reset(&email, &link))
            .await
            .map_err(|err| {
                tracing::error!("Failed to send password reset email to {}: {}", email, err);
                AppError::from(err)
            })?;

        Ok(MessageResponse::new("Password reset link sent"))
    }

    /// Remove codes older than `max_age`; verified ones included.
    pub async fn purge_stale_otps(&self, max_age: Duration) -> AppResult<u64> {
        let cutoff = Utc::now() - max_age;
        let result = sqlx::query("DELETE FROM otp_verifications WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    async fn email_registered_locally(&self, email: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = $1)")
            .bind(email)
            .fetch_one(&self.db)
            .await?;
        Ok(exists)
    }

    async fn email_verified(&self, email: &str) -> AppResult<bool> {
        let verified: Option<bool> = sqlx::query_scalar(
            "SELECT verified_at IS NOT NULL FROM otp_verifications WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(verified.unwrap_or(false))
    }

    async fn create_records(
        &self,
        new_user: &NewUser<'_>,
        plan: Option<&SubscriptionPlan>,
        trainer_profile: Option<&crate::models::TrainerProfileRequest>,
    ) -> AppResult<CreatedAccount> {
        let mut tx = self.db.begin().await?;

        let user = insert_user(&mut tx, new_user).await?;

        let payment_status = match plan {
            Some(plan) => {
                let payment = insert_payment(
                    &mut tx,
                    NewPayment {
                        user_id: user.id,
                        plan_id: Some(plan.id),
                        trainer_id: None,
                        amount_cents: plan.price_cents,
                        method: new_user.request.payment_method,
                        status: PaymentStatus::Completed,
                    },
                )
                .await?;
                create_membership(&mut tx, user.id, plan, Utc::now().date_naive()).await?;
                Some(payment.status)
            }
            None => None,
        };

        if let Some(profile) = trainer_profile {
            upsert_trainer_profile(&mut tx, user.id, profile).await?;
        }

        sqlx::query("DELETE FROM otp_verifications WHERE email = $1")
            .bind(&user.email)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(CreatedAccount { user, payment_status })
    }

    async fn send_welcome(&self, user: &User) {
        let plans = match self.subscriptions.list_plans().await {
            Ok(plans) => plans,
            Err(err) => {
                tracing::warn!("Welcome email sent without plan table: {}", err);
                Vec::new()
            }
        };

        let message = self.templates.welcome(&user.email, &user.name, &plans);
        if let Err(err) = self.mailer.send(message).await {
            tracing::error!(user_id = %user.id, "Failed to send welcome email: {}", err);
        }
    }
}

struct NewUser<'a> {
    uid: &'a str,
    email: &'a str,
    password_hash: &'a str,
    phone: &'a str,
    role: UserRole,
    request: &'a RegisterRequest,
}

struct CreatedAccount {
    user: User,
    payment_status: Option<PaymentStatus>,
}

async fn insert_user(conn: &mut PgConnection, new_user: &NewUser<'_>) -> AppResult<User> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, uid, email, password_hash, name, user_type, date_of_birth,
                           gender, phone_number, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new_user.uid)
    .bind(new_user.email)
    .bind(new_user.password_hash)
    .bind(new_user.request.name.trim())
    .bind(new_user.role)
    .bind(new_user.request.date_of_birth)
    .bind(new_user.request.gender)
    .bind(new_user.phone)
    .fetch_one(conn)
    .await?;

    Ok(user)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::UserRole;
use crate::error::{AppError, AppResult};
use crate::models::{
    validate_phone_number, TrainerSummary, UpdateUserRequest, User, UserListItem,
    UserProfileResponse,
};
use crate::services::cache::{users_list_key, QueryCache, TRAINERS_LIST};
use crate::services::identity_provider::IdentityProvider;
use crate::services::subscription_service::SubscriptionService;
use crate::services::trainer_service::{TrainerService, TRAINER_SUMMARY_SELECT};

#[derive(Clone)]
pub struct UserService {
    db: PgPool,
    cache: QueryCache,
    identity: Arc<dyn IdentityProvider>,
    subscriptions: SubscriptionService,
    trainers: TrainerService,
}

impl UserService {
    pub fn new(
        db: PgPool,
        cache: QueryCache,
        identity: Arc<dyn IdentityProvider>,
        subscriptions: SubscriptionService,
        trainers: TrainerService,
    ) -> Self {
        Self {
            db,
            cache,
            identity,
            subscriptions,
            trainers,
        }
    }

    pub async fn get_user_by_id(&self, user_id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    /// The caller's own record with membership and trainer context.
    pub async fn profile(&self, user_id: Uuid) -> AppResult<UserProfileResponse> {
        let user = self.get_user_by_id(user_id).await?;
        let membership = self.subscriptions.active_membership(user_id).await?;

        let (trainer_profile, assigned_trainer) = match user.user_type {
            UserRole::Trainer => (self.trainers.profile(user_id).await?, None),
            UserRole::User => (None, self.trainers.assigned_trainer(user_id).await?),
            UserRole::Admin => (None, None),
        };

        Ok(UserProfileResponse {
            user,
            membership,
            trainer_profile,
            assigned_trainer,
        })
    }

    pub async fn list_users(&self, kind: Option<UserRole>) -> AppResult<Vec<UserListItem>> {
        let key = users_list_key(kind.map(|role| role.as_str()));

        self.cache
            .get_or_load(&key, || async {
                let users = sqlx::query_as::<_, UserListItem>(
                    r#"
                    SELECT u.id, u.uid, u.email, u.name, u.user_type, u.phone_number, u.is_active,
                           p.name AS plan_name, s.status AS membership_status,
                           s.end_date AS membership_end_date,
                           t.specialization, t.experience_years, u.created_at
                    FROM users u
                    LEFT JOIN user_subscriptions s ON s.user_id = u.id AND s.status = 'active'
                    LEFT JOIN subscription_plans p ON p.id = s.plan_id
                    LEFT JOIN trainer_profiles t ON t.user_id = u.id
                    WHERE $1::user_role IS NULL OR u.user_type = $1
                    ORDER BY u.created_at DESC
                    "#,
                )
                .bind(kind)
                .fetch_all(&self.db)
                .await?;
                Ok::<_, AppError>(users)
            })
            .await
    }

    pub async fn list_trainers(&self) -> AppResult<Vec<TrainerSummary>> {
        self.cache
            .get_or_load(TRAINERS_LIST, || async {
                let query = format!(
                    "{TRAINER_SUMMARY_SELECT} WHERE u.user_type = 'trainer' AND u.is_active ORDER BY u.name"
                );
                let trainers = sqlx::query_as::<_, TrainerSummary>(&query)
                    .fetch_all(&self.db)
                    .await?;
                Ok::<_, AppError>(trainers)
            })
            .await
    }

    pub async fn update_user(&self, user_id: Uuid, request: UpdateUserRequest) -> AppResult<User> {
        if let Some(phone) = request.phone_number.as_deref() {
            validate_phone_number(phone)?;
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                phone_number = COALESCE($3, phone_number),
                gender = COALESCE($4, gender),
                date_of_birth = COALESCE($5, date_of_birth),
                profile_picture_url = COALESCE($6, profile_picture_url),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(request.phone_number.as_deref().map(str::trim))
        .bind(request.gender)
        .bind(request.date_of_birth)
        .bind(request.profile_picture_url)
        .bind(request.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

        self.cache.invalidate_user_lists().await;
        tracing::info!(user_id = %user.id, "Updated user");
        Ok(user)
    }

    /// Delete the local row (cascading) and then the identity account.
    pub async fn delete_user(&self, user_id: Uuid) -> AppResult<()> {
        let uid: String = sqlx::query_scalar("DELETE FROM users WHERE id = $1 RETURNING uid")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        self.cache.invalidate_user_lists().await;

        if let Err(err) = self.identity.delete_user(&uid).await {
            tracing::error!(user_id = %user_id, uid = %uid, "Failed to delete identity account: {}", err);
        }

        tracing::info!(user_id = %user_id, "Deleted user");
        Ok(())
    }
}

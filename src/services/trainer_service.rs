use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::error::{AppError, AppResult};
use crate::models::{
    AssignTrainerRequest, AssignmentDetail, ClientSummary, TrainerAssignment, TrainerProfile,
    TrainerProfileRequest, TrainerSummary,
};
use crate::services::cache::QueryCache;

pub(crate) const TRAINER_SUMMARY_SELECT: &str = r#"
    SELECT u.id, u.name, u.email, u.phone_number, t.specialization, t.experience_years,
           t.qualifications, t.availability
    FROM users u
    LEFT JOIN trainer_profiles t ON t.user_id = u.id
"#;

pub(crate) async fn upsert_assignment(
    conn: &mut PgConnection,
    user_id: Uuid,
    trainer_id: Uuid,
) -> AppResult<TrainerAssignment> {
    let assignment = sqlx::query_as::<_, TrainerAssignment>(
        r#"
        INSERT INTO trainer_assignments (id, user_id, trainer_id, assigned_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (user_id) DO UPDATE
        SET trainer_id = EXCLUDED.trainer_id, assigned_at = NOW()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(trainer_id)
    .fetch_one(conn)
    .await?;

    Ok(assignment)
}

/// Trainer profiles and trainer-to-member assignments.
#[derive(Clone)]
pub struct TrainerService {
    db: PgPool,
    cache: QueryCache,
}

impl TrainerService {
    pub fn new(db: PgPool, cache: QueryCache) -> Self {
        Self { db, cache }
    }

    async fn role_of(&self, user_id: Uuid) -> AppResult<UserRole> {
        sqlx::query_scalar::<_, UserRole>("SELECT user_type FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    pub async fn profile(&self, user_id: Uuid) -> AppResult<Option<TrainerProfile>> {
        let profile = sqlx::query_as::<_, TrainerProfile>("SELECT * FROM trainer_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(profile)
    }

    pub async fn upsert_profile(&self, user_id: Uuid, request: TrainerProfileRequest) -> AppResult<TrainerProfile> {
        if self.role_of(user_id).await? != UserRole::Trainer {
            return Err(AppError::validation("User is not a trainer"));
        }

        let profile = upsert_trainer_profile(&mut *self.db.acquire().await?, user_id, &request).await?;

        self.cache.invalidate_user_lists().await;
        Ok(profile)
    }

    pub async fn assign(&self, request: AssignTrainerRequest) -> AppResult<TrainerAssignment> {
        if self.role_of(request.user_id).await? != UserRole::User {
            return Err(AppError::validation("Only members can be assigned a trainer"));
        }
        if self.role_of(request.trainer_id).await? != UserRole::Trainer {
            return Err(AppError::validation("trainer_id does not refer to a trainer"));
        }

        let assignment =
            upsert_assignment(&mut *self.db.acquire().await?, request.user_id, request.trainer_id).await?;

        tracing::info!(
            user_id = %assignment.user_id,
            trainer_id = %assignment.trainer_id,
            "Assigned trainer"
        );
        Ok(assignment)
    }

    pub async fn unassign(&self, user_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM trainer_assignments WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("No trainer assigned to this user"));
        }
        Ok(())
    }

    pub async fn list_assignments(&self) -> AppResult<Vec<AssignmentDetail>> {
        let assignments = sqlx::query_as::<_, AssignmentDetail>(
            r#"
            SELECT a.id, a.user_id, u.name AS user_name, u.email AS user_email,
                   a.trainer_id, t.name AS trainer_name, a.assigned_at
            FROM trainer_assignments a
            JOIN users u ON u.id = a.user_id
            JOIN users t ON t.id = a.trainer_id
            ORDER BY a.assigned_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(assignments)
    }

    pub async fn assigned_trainer(&self, user_id: Uuid) -> AppResult<Option<TrainerSummary>> {
        let query = format!(
            "{TRAINER_SUMMARY_SELECT} JOIN trainer_assignments a ON a.trainer_id = u.id WHERE a.user_id = $1"
        );
        let trainer = sqlx::query_as::<_, TrainerSummary>(&query)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(trainer)
    }

    pub async fn clients(&self, trainer_id: Uuid) -> AppResult<Vec<ClientSummary>> {
        let clients = sqlx::query_as::<_, ClientSummary>(
            r#"
            SELECT u.id, u.name, u.email, u.phone_number, p.name AS plan_name,
                   s.end_date AS membership_end_date, a.assigned_at
            FROM trainer_assignments a
            JOIN users u ON u.id = a.user_id
            LEFT JOIN user_subscriptions s ON s.user_id = u.id AND s.status = 'active'
            LEFT JOIN subscription_plans p ON p.id = s.plan_id
            WHERE a.trainer_id = $1
            ORDER BY u.name
            "#,
        )
        .bind(trainer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(clients)
    }

    pub async fn is_assigned(&self, trainer_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let assigned: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM trainer_assignments WHERE trainer_id = $1 AND user_id = $2)",
        )
        .bind(trainer_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(assigned)
    }

    /// Admins manage everyone; trainers manage their assigned members.
    pub async fn ensure_can_manage(&self, session: &UserSession, user_id: Uuid) -> AppResult<()> {
        match session.role {
            UserRole::Admin => Ok(()),
            UserRole::Trainer if self.is_assigned(session.user_id, user_id).await? => Ok(()),
            _ => Err(AppError::forbidden()),
        }
    }
}

pub(crate) async fn upsert_trainer_profile(
    conn: &mut PgConnection,
    user_id: Uuid,
    request: &TrainerProfileRequest,
) -> AppResult<TrainerProfile> {
    let profile = sqlx::query_as::<_, TrainerProfile>(
        r#"
        INSERT INTO trainer_profiles (id, user_id, specialization, experience_years,
                                      qualifications, availability, salary_cents)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (user_id) DO UPDATE
        SET specialization = EXCLUDED.specialization,
            experience_years = EXCLUDED.experience_years,
            qualifications = EXCLUDED.qualifications,
            availability = EXCLUDED.availability,
            salary_cents = EXCLUDED.salary_cents,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(request.specialization.trim())
    .bind(request.experience_years)
    .bind(&request.qualifications)
    .bind(request.availability)
    .bind(request.salary_cents)
    .fetch_one(conn)
    .await?;

    Ok(profile)
}

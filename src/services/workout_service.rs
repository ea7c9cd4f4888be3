use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{validate_json_array, DailyWorkout, WorkoutPlan};

#[derive(Clone)]
pub struct WorkoutService {
    db: PgPool,
}

impl WorkoutService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn daily(&self, user_id: Uuid, workout_date: NaiveDate) -> AppResult<DailyWorkout> {
        sqlx::query_as::<_, DailyWorkout>(
            "SELECT * FROM daily_workouts WHERE user_id = $1 AND workout_date = $2",
        )
        .bind(user_id)
        .bind(workout_date)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("No workout found for this date"))
    }

    pub async fn save_daily(
        &self,
        user_id: Uuid,
        workout_date: NaiveDate,
        exercise_data: serde_json::Value,
    ) -> AppResult<DailyWorkout> {
        validate_json_array("exercise_data", &exercise_data)?;

        let workout = sqlx::query_as::<_, DailyWorkout>(
            r#"
            INSERT INTO daily_workouts (id, user_id, workout_date, exercise_data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, workout_date) DO UPDATE
            SET exercise_data = EXCLUDED.exercise_data, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(workout_date)
        .bind(exercise_data)
        .fetch_one(&self.db)
        .await?;

        Ok(workout)
    }

    pub async fn plan(&self, user_id: Uuid) -> AppResult<WorkoutPlan> {
        sqlx::query_as::<_, WorkoutPlan>("SELECT * FROM workout_plans WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("No workout plan found"))
    }

    /// Upsert the default plan of `user_id`; `editor_id` is recorded as `updated_by`.
    pub async fn save_plan(
        &self,
        user_id: Uuid,
        editor_id: Uuid,
        exercise_data: serde_json::Value,
    ) -> AppResult<WorkoutPlan> {
        validate_json_array("exercise_data", &exercise_data)?;

        let plan = sqlx::query_as::<_, WorkoutPlan>(
            r#"
            INSERT INTO workout_plans (id, user_id, exercise_data, updated_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET exercise_data = EXCLUDED.exercise_data,
                updated_by = EXCLUDED.updated_by,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(exercise_data)
        .bind(editor_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(user_id = %user_id, editor_id = %editor_id, "Saved workout plan");
        Ok(plan)
    }
}

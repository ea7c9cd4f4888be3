use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{NutritionGoal, NutritionGoalRequest};

#[derive(Clone)]
pub struct NutritionService {
    db: PgPool,
}

impl NutritionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn latest(&self, user_id: Uuid) -> AppResult<NutritionGoal> {
        sqlx::query_as::<_, NutritionGoal>(
            "SELECT * FROM nutrition_goals WHERE user_id = $1 ORDER BY goal_date DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("No nutrition goal found"))
    }

    pub async fn for_date(&self, user_id: Uuid, goal_date: NaiveDate) -> AppResult<NutritionGoal> {
        sqlx::query_as::<_, NutritionGoal>(
            "SELECT * FROM nutrition_goals WHERE user_id = $1 AND goal_date = $2",
        )
        .bind(user_id)
        .bind(goal_date)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("No nutrition goal found for this date"))
    }

    pub async fn upsert(
        &self,
        user_id: Uuid,
        goal_date: NaiveDate,
        request: NutritionGoalRequest,
    ) -> AppResult<NutritionGoal> {
        request.check()?;

        let goal = sqlx::query_as::<_, NutritionGoal>(
            r#"
            INSERT INTO nutrition_goals (id, user_id, goal_date, height, weight, age, sex,
                                         activity_level, breakfast, morning_snack, lunch,
                                         evening_snack, dinner)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (user_id, goal_date) DO UPDATE
            SET height = EXCLUDED.height,
                weight = EXCLUDED.weight,
                age = EXCLUDED.age,
                sex = EXCLUDED.sex,
                activity_level = EXCLUDED.activity_level,
                breakfast = EXCLUDED.breakfast,
                morning_snack = EXCLUDED.morning_snack,
                lunch = EXCLUDED.lunch,
                evening_snack = EXCLUDED.evening_snack,
                dinner = EXCLUDED.dinner,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(goal_date)
        .bind(request.height)
        .bind(request.weight)
        .bind(request.age)
        .bind(request.sex)
        .bind(request.activity_level)
        .bind(Json(request.breakfast))
        .bind(Json(request.morning_snack))
        .bind(Json(request.lunch))
        .bind(Json(request.evening_snack))
        .bind(Json(request.dinner))
        .fetch_one(&self.db)
        .await?;

        Ok(goal)
    }
}

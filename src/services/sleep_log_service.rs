use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{SleepLog, SleepLogQuery, SleepLogRequest};

#[derive(Clone)]
pub struct SleepLogService {
    db: PgPool,
}

impl SleepLogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, user_id: Uuid, query: &SleepLogQuery) -> AppResult<Vec<SleepLog>> {
        let logs = sqlx::query_as::<_, SleepLog>(
            r#"
            SELECT * FROM sleep_logs
            WHERE user_id = $1
              AND ($2::date IS NULL OR sleep_date >= $2)
              AND ($3::date IS NULL OR sleep_date <= $3)
            ORDER BY sleep_date DESC
            "#,
        )
        .bind(user_id)
        .bind(query.from)
        .bind(query.to)
        .fetch_all(&self.db)
        .await?;

        Ok(logs)
    }

    pub async fn create(&self, user_id: Uuid, request: SleepLogRequest) -> AppResult<SleepLog> {
        request.check()?;

        sqlx::query_as::<_, SleepLog>(
            r#"
            INSERT INTO sleep_logs (id, user_id, sleep_date, sleep_duration_hours, sleep_quality)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(request.sleep_date)
        .bind(request.sleep_duration_hours)
        .bind(&request.sleep_quality)
        .fetch_one(&self.db)
        .await
        .map_err(|err| match AppError::from(err) {
            AppError::Conflict(_) => AppError::conflict("A sleep log already exists for this date"),
            other => other,
        })
    }

    pub async fn update(&self, user_id: Uuid, request: SleepLogRequest) -> AppResult<SleepLog> {
        request.check()?;

        sqlx::query_as::<_, SleepLog>(
            r#"
            UPDATE sleep_logs
            SET sleep_duration_hours = $3, sleep_quality = $4, updated_at = NOW()
            WHERE user_id = $1 AND sleep_date = $2
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(request.sleep_date)
        .bind(request.sleep_duration_hours)
        .bind(&request.sleep_quality)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Sleep log not found for this date"))
    }

    pub async fn delete(&self, user_id: Uuid, sleep_date: NaiveDate) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM sleep_logs WHERE user_id = $1 AND sleep_date = $2")
            .bind(user_id)
            .bind(sleep_date)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Sleep log not found for this date"));
        }
        Ok(())
    }
}

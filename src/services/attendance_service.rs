use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{compute_streak, Attendance, AttendanceQuery, AttendanceStatus, AttendanceStreak};

#[derive(Clone)]
pub struct AttendanceService {
    db: PgPool,
}

impl AttendanceService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn check_in(&self, user_id: Uuid) -> AppResult<Attendance> {
        let now = Utc::now();

        // The partial unique index rejects a second open check-in
        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            INSERT INTO attendance (id, user_id, status, attendance_date, check_in_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(AttendanceStatus::Present)
        .bind(now.date_naive())
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(|err| match AppError::from(err) {
            AppError::Conflict(_) => AppError::conflict("Already checked in"),
            other => other,
        })?;

        tracing::info!(user_id = %user_id, "Checked in");
        Ok(attendance)
    }

    pub async fn check_out(&self, user_id: Uuid) -> AppResult<Attendance> {
        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            UPDATE attendance
            SET check_out_time = NOW(), updated_at = NOW()
            WHERE user_id = $1 AND status = 'present' AND check_out_time IS NULL
            RETURNING *
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("No open check-in found"))?;

        tracing::info!(user_id = %user_id, "Checked out");
        Ok(attendance)
    }

    pub async fn history(&self, user_id: Uuid, query: &AttendanceQuery) -> AppResult<Vec<Attendance>> {
        let records = sqlx::query_as::<_, Attendance>(
            r#"
            SELECT * FROM attendance
            WHERE user_id = $1
              AND ($2::date IS NULL OR attendance_date >= $2)
              AND ($3::date IS NULL OR attendance_date <= $3)
            ORDER BY attendance_date DESC, check_in_time DESC NULLS LAST
            "#,
        )
        .bind(user_id)
        .bind(query.from)
        .bind(query.to)
        .fetch_all(&self.db)
        .await?;

        Ok(records)
    }

    pub async fn streak(&self, user_id: Uuid) -> AppResult<AttendanceStreak> {
        let dates: Vec<NaiveDate> = sqlx::query_scalar(
            "SELECT DISTINCT attendance_date FROM attendance WHERE user_id = $1 AND status = 'present'",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(compute_streak(&dates, Utc::now().date_naive()))
    }

    /// Record an absence. A day that already has a present record is left alone.
    pub async fn mark_absent(&self, user_id: Uuid, date: NaiveDate) -> AppResult<Attendance> {
        let user_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        if !user_exists {
            return Err(AppError::not_found("User not found"));
        }

        let present: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM attendance WHERE user_id = $1 AND attendance_date = $2 AND status = 'present')",
        )
        .bind(user_id)
        .bind(date)
        .fetch_one(&self.db)
        .await?;
        if present {
            return Err(AppError::conflict("User was present on this date"));
        }

        let existing = sqlx::query_as::<_, Attendance>(
            "SELECT * FROM attendance WHERE user_id = $1 AND attendance_date = $2 AND status = 'absent'",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.db)
        .await?;
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            INSERT INTO attendance (id, user_id, status, attendance_date)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(AttendanceStatus::Absent)
        .bind(date)
        .fetch_one(&self.db)
        .await?;

        Ok(attendance)
    }
}

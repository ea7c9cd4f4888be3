use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "attendance_status", rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attendance {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: AttendanceStatus,
    pub attendance_date: NaiveDate,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AttendanceResponse {
    #[serde(flatten)]
    pub attendance: Attendance,
    pub visit_minutes: Option<i64>,
}

impl From<Attendance> for AttendanceResponse {
    fn from(attendance: Attendance) -> Self {
        let visit_minutes = visit_minutes(attendance.check_in_time, attendance.check_out_time);
        Self {
            attendance,
            visit_minutes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MarkAbsentRequest {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AttendanceStreak {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_attended: Option<NaiveDate>,
}

/// Streaks over days with a present record.
///
/// `dates` may be unsorted and contain duplicates. The current streak only counts
/// when its last day is `today` or yesterday.
pub fn compute_streak(dates: &[NaiveDate], today: NaiveDate) -> AttendanceStreak {
    let mut days = dates.to_vec();
    days.sort_unstable();
    days.dedup();

    let mut longest = 0u32;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;

    for &day in &days {
        run = match previous {
            Some(prev) if day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    let current = match previous {
        Some(last) if last == today || last == today - Duration::days(1) => run,
        _ => 0,
    };

    AttendanceStreak {
        current_streak: current,
        longest_streak: longest,
        last_attended: previous,
    }
}

/// Length of a visit in whole minutes, when both ends are known.
pub fn visit_minutes(check_in: Option<DateTime<Utc>>, check_out: Option<DateTime<Utc>>) -> Option<i64> {
    match (check_in, check_out) {
        (Some(start), Some(end)) if end >= start => Some((end - start).num_minutes()),
        _ => None,
    }
}

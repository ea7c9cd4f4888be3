use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use super::AppState;
use crate::auth::{jwt_auth_middleware, UserSession};
use crate::error::{AppError, AppResult};
use crate::models::{AttendanceQuery, AttendanceResponse, AttendanceStreak, MarkAbsentRequest};

pub fn attendance_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/check-in", post(check_in))
        .route("/check-out", post(check_out))
        .route("/me", get(my_attendance))
        .route("/streak", get(my_streak))
        .route("/user/:id", get(user_attendance))
        .route("/user/:id/absent", post(mark_absent))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ))
}

#[tracing::instrument(skip(state))]
async fn check_in(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<(StatusCode, Json<AttendanceResponse>)> {
    let record = state.attendance.check_in(session.user_id).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

#[tracing::instrument(skip(state))]
async fn check_out(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<AttendanceResponse>> {
    let record = state.attendance.check_out(session.user_id).await?;
    Ok(Json(record.into()))
}

#[tracing::instrument(skip(state))]
async fn my_attendance(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<AttendanceQuery>, AppError>,
) -> AppResult<Json<Vec<AttendanceResponse>>> {
    let records = state.attendance.history(session.user_id, &query).await?;
    Ok(Json(records.into_iter().map(AttendanceResponse::from).collect()))
}

#[tracing::instrument(skip(state))]
async fn my_streak(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<AttendanceStreak>> {
    let streak = state.attendance.streak(session.user_id).await?;
    Ok(Json(streak))
}

/// Admin or the member's assigned trainer
#[tracing::instrument(skip(state))]
async fn user_attendance(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<AttendanceQuery>, AppError>,
) -> AppResult<Json<Vec<AttendanceResponse>>> {
    state.trainers.ensure_can_manage(&session, user_id).await?;

    let records = state.attendance.history(user_id, &query).await?;
    Ok(Json(records.into_iter().map(AttendanceResponse::from).collect()))
}

#[tracing::instrument(skip(state))]
async fn mark_absent(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<MarkAbsentRequest>, AppError>,
) -> AppResult<Json<AttendanceResponse>> {
    state.trainers.ensure_can_manage(&session, user_id).await?;

    let record = state.attendance.mark_absent(user_id, request.date).await?;
    Ok(Json(record.into()))
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{delete, get},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use chrono::NaiveDate;

use super::AppState;
use crate::auth::{jwt_auth_middleware, UserSession};
use crate::error::{AppError, AppResult};
use crate::models::{SleepLog, SleepLogQuery, SleepLogRequest};

pub fn sleep_log_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_sleep_logs).post(create_sleep_log).put(update_sleep_log))
        .route("/:date", delete(delete_sleep_log))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ))
}

#[tracing::instrument(skip(state))]
async fn list_sleep_logs(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<SleepLogQuery>, AppError>,
) -> AppResult<Json<Vec<SleepLog>>> {
    let logs = state.sleep_logs.list(session.user_id, &query).await?;
    Ok(Json(logs))
}

#[tracing::instrument(skip(state, request))]
async fn create_sleep_log(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<SleepLogRequest>, AppError>,
) -> AppResult<(StatusCode, Json<SleepLog>)> {
    let log = state.sleep_logs.create(session.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

#[tracing::instrument(skip(state, request))]
async fn update_sleep_log(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<SleepLogRequest>, AppError>,
) -> AppResult<Json<SleepLog>> {
    let log = state.sleep_logs.update(session.user_id, request).await?;
    Ok(Json(log))
}

#[tracing::instrument(skip(state))]
async fn delete_sleep_log(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(sleep_date), _): WithRejection<Path<NaiveDate>, AppError>,
) -> AppResult<StatusCode> {
    state.sleep_logs.delete(session.user_id, sleep_date).await?;
    Ok(StatusCode::NO_CONTENT)
}

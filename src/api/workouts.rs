use axum::{
    extract::{Path, State},
    middleware,
    response::Json,
    routing::{get, put},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use chrono::NaiveDate;
use uuid::Uuid;

use super::AppState;
use crate::auth::{jwt_auth_middleware, UserSession};
use crate::error::{AppError, AppResult};
use crate::models::{DailyWorkout, SaveWorkoutRequest, WorkoutPlan};

pub fn workout_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/daily/:date", get(daily_workout).post(save_daily_workout))
        .route("/daily/user/:id/:date", get(client_daily_workout))
        .route("/plan", get(workout_plan).post(save_workout_plan))
        .route("/plan/user/:id", put(save_client_plan))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ))
}

#[tracing::instrument(skip(state))]
async fn daily_workout(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(workout_date), _): WithRejection<Path<NaiveDate>, AppError>,
) -> AppResult<Json<DailyWorkout>> {
    let workout = state.workouts.daily(session.user_id, workout_date).await?;
    Ok(Json(workout))
}

#[tracing::instrument(skip(state, request))]
async fn save_daily_workout(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(workout_date), _): WithRejection<Path<NaiveDate>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<SaveWorkoutRequest>, AppError>,
) -> AppResult<Json<DailyWorkout>> {
    let workout = state
        .workouts
        .save_daily(session.user_id, workout_date, request.exercise_data)
        .await?;
    Ok(Json(workout))
}

#[tracing::instrument(skip(state))]
async fn workout_plan(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<WorkoutPlan>> {
    let plan = state.workouts.plan(session.user_id).await?;
    Ok(Json(plan))
}

#[tracing::instrument(skip(state, request))]
async fn save_workout_plan(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<SaveWorkoutRequest>, AppError>,
) -> AppResult<Json<WorkoutPlan>> {
    let plan = state
        .workouts
        .save_plan(session.user_id, session.user_id, request.exercise_data)
        .await?;
    Ok(Json(plan))
}

/// Trainers edit their clients' plans
#[tracing::instrument(skip(state, request))]
async fn save_client_plan(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<SaveWorkoutRequest>, AppError>,
) -> AppResult<Json<WorkoutPlan>> {
    state.trainers.ensure_can_manage(&session, user_id).await?;

    let plan = state
        .workouts
        .save_plan(user_id, session.user_id, request.exercise_data)
        .await?;
    Ok(Json(plan))
}

#[tracing::instrument(skip(state))]
async fn client_daily_workout(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path((user_id, workout_date)), _): WithRejection<Path<(Uuid, NaiveDate)>, AppError>,
) -> AppResult<Json<DailyWorkout>> {
    state.trainers.ensure_can_manage(&session, user_id).await?;

    let workout = state.workouts.daily(user_id, workout_date).await?;
    Ok(Json(workout))
}

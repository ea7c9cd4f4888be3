use axum::{
    extract::{Path, State},
    middleware,
    response::Json,
    routing::get,
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use chrono::{NaiveDate, Utc};

use super::AppState;
use crate::auth::{jwt_auth_middleware, UserSession};
use crate::error::{AppError, AppResult};
use crate::models::{NutritionGoalRequest, NutritionGoalResponse};

pub fn nutrition_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(latest_goal).put(upsert_today))
        .route("/:date", get(goal_for_date).put(upsert_for_date))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ))
}

#[tracing::instrument(skip(state))]
async fn latest_goal(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<NutritionGoalResponse>> {
    let goal = state.nutrition.latest(session.user_id).await?;
    Ok(Json(goal.into()))
}

#[tracing::instrument(skip(state))]
async fn goal_for_date(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(goal_date), _): WithRejection<Path<NaiveDate>, AppError>,
) -> AppResult<Json<NutritionGoalResponse>> {
    let goal = state.nutrition.for_date(session.user_id, goal_date).await?;
    Ok(Json(goal.into()))
}

#[tracing::instrument(skip(state, request))]
async fn upsert_today(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<NutritionGoalRequest>, AppError>,
) -> AppResult<Json<NutritionGoalResponse>> {
    let today = Utc::now().date_naive();
    let goal = state.nutrition.upsert(session.user_id, today, request).await?;
    Ok(Json(goal.into()))
}

#[tracing::instrument(skip(state, request))]
async fn upsert_for_date(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(goal_date), _): WithRejection<Path<NaiveDate>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<NutritionGoalRequest>, AppError>,
) -> AppResult<Json<NutritionGoalResponse>> {
    let goal = state.nutrition.upsert(session.user_id, goal_date, request).await?;
    Ok(Json(goal.into()))
}

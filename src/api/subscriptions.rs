use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post, put},
    Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use super::{admin_only, AppState};
use crate::auth::jwt_auth_middleware;
use crate::error::{AppError, AppResult};
use crate::models::{CreatePlanRequest, SubscriptionPlan, UpdatePlanRequest};

/// Membership plans; reads for everyone, writes for admins
pub fn subscription_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_plans).merge(admin_only(post(create_plan))))
        .route(
            "/:id",
            get(get_plan).merge(admin_only(put(update_plan).delete(delete_plan))),
        )
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ))
}

#[tracing::instrument(skip(state))]
async fn list_plans(State(state): State<AppState>) -> AppResult<Json<Vec<SubscriptionPlan>>> {
    let plans = state.subscriptions.list_plans().await?;
    Ok(Json(plans))
}

#[tracing::instrument(skip(state))]
async fn get_plan(
    State(state): State<AppState>,
    WithRejection(Path(plan_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<SubscriptionPlan>> {
    let plan = state.subscriptions.get_plan(plan_id).await?;
    Ok(Json(plan))
}

#[tracing::instrument(skip(state, request))]
async fn create_plan(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<CreatePlanRequest>, AppError>,
) -> AppResult<(StatusCode, Json<SubscriptionPlan>)> {
    request.validate()?;
    let plan = state.subscriptions.create_plan(request).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

#[tracing::instrument(skip(state, request))]
async fn update_plan(
    State(state): State<AppState>,
    WithRejection(Path(plan_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdatePlanRequest>, AppError>,
) -> AppResult<Json<SubscriptionPlan>> {
    request.validate()?;
    let plan = state.subscriptions.update_plan(plan_id, request).await?;
    Ok(Json(plan))
}

#[tracing::instrument(skip(state))]
async fn delete_plan(
    State(state): State<AppState>,
    WithRejection(Path(plan_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<StatusCode> {
    state.subscriptions.delete_plan(plan_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

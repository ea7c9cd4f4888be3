use axum::{
    extract::{Path, State},
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use super::{admin_only, AppState};
use crate::auth::{jwt_auth_middleware, UserSession};
use crate::error::{AppError, AppResult};
use crate::models::{Membership, MembershipDetail, UpgradeMembershipRequest, UpgradeMembershipResponse};

pub fn membership_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(my_memberships))
        .route("/user/:id", get(user_memberships))
        .route("/:user_id/cancel", admin_only(post(cancel_membership)))
        .route("/:user_id/upgrade", admin_only(post(upgrade_membership)))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ))
}

#[tracing::instrument(skip(state))]
async fn my_memberships(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Vec<MembershipDetail>>> {
    let memberships = state.subscriptions.memberships_for_user(session.user_id).await?;
    Ok(Json(memberships))
}

/// Admin or the member's assigned trainer
#[tracing::instrument(skip(state))]
async fn user_memberships(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Vec<MembershipDetail>>> {
    state.trainers.ensure_can_manage(&session, user_id).await?;

    let memberships = state.subscriptions.memberships_for_user(user_id).await?;
    Ok(Json(memberships))
}

#[tracing::instrument(skip(state))]
async fn cancel_membership(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Membership>> {
    let membership = state.subscriptions.cancel_active(user_id).await?;
    Ok(Json(membership))
}

#[tracing::instrument(skip(state, request))]
async fn upgrade_membership(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpgradeMembershipRequest>, AppError>,
) -> AppResult<Json<UpgradeMembershipResponse>> {
    let response = state.subscriptions.upgrade(user_id, request).await?;
    Ok(Json(response))
}

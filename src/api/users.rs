use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, put},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use super::{admin_only, AppState};
use crate::auth::{jwt_auth_middleware, UserRole, UserSession};
use crate::error::{AppError, AppResult};
use crate::models::{
    TrainerProfile, TrainerProfileRequest, TrainerSummary, UpdateUserRequest, User, UserListItem,
    UserListQuery, UserProfileResponse,
};

pub fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", admin_only(get(list_users)))
        .route("/profile", get(get_profile))
        .route("/trainers", get(list_trainers))
        .route(
            "/:id",
            get(get_user).merge(admin_only(put(update_user).delete(delete_user))),
        )
        .route("/:id/trainer-profile", admin_only(put(upsert_trainer_profile)))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ))
}

/// Own record with membership, trainer profile and assigned trainer
#[tracing::instrument(skip(state))]
async fn get_profile(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<UserProfileResponse>> {
    let profile = state.users.profile(session.user_id).await?;
    Ok(Json(profile))
}

#[tracing::instrument(skip(state))]
async fn list_users(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<UserListQuery>, AppError>,
) -> AppResult<Json<Vec<UserListItem>>> {
    let kind = match query.user_type.as_deref() {
        None | Some("") => None,
        Some(kind) => Some(
            UserRole::parse(kind).ok_or_else(|| AppError::validation("Invalid user type"))?,
        ),
    };

    let users = state.users.list_users(kind).await?;
    Ok(Json(users))
}

#[tracing::instrument(skip(state))]
async fn list_trainers(State(state): State<AppState>) -> AppResult<Json<Vec<TrainerSummary>>> {
    let trainers = state.users.list_trainers().await?;
    Ok(Json(trainers))
}

/// Admins read anyone; everyone else only themselves
#[tracing::instrument(skip(state))]
async fn get_user(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<User>> {
    if !session.is_admin() && session.user_id != user_id {
        return Err(AppError::forbidden());
    }

    let user = state.users.get_user_by_id(user_id).await?;
    Ok(Json(user))
}

#[tracing::instrument(skip(state, request))]
async fn update_user(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateUserRequest>, AppError>,
) -> AppResult<Json<User>> {
    request.validate()?;
    let user = state.users.update_user(user_id, request).await?;
    Ok(Json(user))
}

#[tracing::instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<StatusCode> {
    if session.user_id == user_id {
        return Err(AppError::validation("Admins cannot delete their own account"));
    }

    state.users.delete_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state, request))]
async fn upsert_trainer_profile(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<TrainerProfileRequest>, AppError>,
) -> AppResult<Json<TrainerProfile>> {
    request.validate()?;
    let profile = state.trainers.upsert_profile(user_id, request).await?;
    Ok(Json(profile))
}

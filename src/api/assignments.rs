use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{delete, get},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use super::{admin_only, trainer_or_admin, AppState};
use crate::auth::{jwt_auth_middleware, UserSession};
use crate::error::{AppError, AppResult};
use crate::models::{AssignTrainerRequest, AssignmentDetail, ClientSummary, TrainerAssignment, TrainerSummary};

pub fn assignment_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", admin_only(get(list_assignments).post(assign_trainer)))
        .route("/me", get(my_trainer))
        .route("/clients", trainer_or_admin(get(my_clients)))
        .route("/:user_id", admin_only(delete(unassign_trainer)))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ))
}

#[tracing::instrument(skip(state))]
async fn list_assignments(State(state): State<AppState>) -> AppResult<Json<Vec<AssignmentDetail>>> {
    let assignments = state.trainers.list_assignments().await?;
    Ok(Json(assignments))
}

#[tracing::instrument(skip(state))]
async fn assign_trainer(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<AssignTrainerRequest>, AppError>,
) -> AppResult<(StatusCode, Json<TrainerAssignment>)> {
    let assignment = state.trainers.assign(request).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

#[tracing::instrument(skip(state))]
async fn unassign_trainer(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<StatusCode> {
    state.trainers.unassign(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state))]
async fn my_trainer(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<TrainerSummary>> {
    state
        .trainers
        .assigned_trainer(session.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("No trainer assigned"))
}

#[tracing::instrument(skip(state))]
async fn my_clients(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Vec<ClientSummary>>> {
    let clients = state.trainers.clients(session.user_id).await?;
    Ok(Json(clients))
}

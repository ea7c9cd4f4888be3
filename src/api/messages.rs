use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::get,
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use super::AppState;
use crate::auth::{jwt_auth_middleware, UserSession};
use crate::error::{AppError, AppResult};
use crate::models::{ChatMessage, ConversationSummary, MessageQuery, SendMessageRequest};

pub fn message_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_conversations).post(send_message))
        .route("/:peer_id", get(conversation_thread))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ))
}

#[tracing::instrument(skip(state, request))]
async fn send_message(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<SendMessageRequest>, AppError>,
) -> AppResult<(StatusCode, Json<ChatMessage>)> {
    let message = state.messages.send(&session, request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[tracing::instrument(skip(state))]
async fn list_conversations(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    let conversations = state.messages.conversations(session.user_id).await?;
    Ok(Json(conversations))
}

/// Oldest-first page of one conversation; marks incoming messages read
#[tracing::instrument(skip(state))]
async fn conversation_thread(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(peer_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<MessageQuery>, AppError>,
) -> AppResult<Json<Vec<ChatMessage>>> {
    let messages = state.messages.thread(session.user_id, peer_id, &query).await?;
    Ok(Json(messages))
}

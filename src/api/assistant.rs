use axum::{extract::State, response::Json, routing::post, Router};
use axum_extra::extract::WithRejection;

use super::{rate_limited, AppState};
use crate::error::{AppError, AppResult};
use crate::models::{AssistantChatRequest, AssistantChatResponse};

/// Public gym assistant backed by the hosted chat model
pub fn assistant_routes(state: &AppState) -> Router<AppState> {
    Router::new().route("/chat", rate_limited(post(chat), &state.rate_limiter))
}

#[tracing::instrument(skip(state, request))]
async fn chat(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<AssistantChatRequest>, AppError>,
) -> AppResult<Json<AssistantChatResponse>> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(AppError::validation("message: is required"));
    }

    let response = state.assistant.reply(message).await.map_err(|err| {
        tracing::error!("Assistant request failed: {}", err);
        AppError::from(err)
    })?;

    Ok(Json(AssistantChatResponse { response }))
}

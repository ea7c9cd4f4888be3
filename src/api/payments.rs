use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use super::{admin_only, AppState};
use crate::auth::{jwt_auth_middleware, UserRole, UserSession};
use crate::error::{AppError, AppResult};
use crate::models::{CheckoutRequest, CheckoutResponse, ConfirmPaymentResponse, Payment};

pub fn payment_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(my_payments))
        .route("/user/:id", admin_only(get(user_payments)))
        .route("/checkout", post(checkout))
        .route("/:id/confirm", post(confirm_payment))
        .route("/:id/fail", admin_only(post(fail_payment)))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ))
}

#[tracing::instrument(skip(state))]
async fn my_payments(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Vec<Payment>>> {
    let payments = state.payments.payments_for_user(session.user_id).await?;
    Ok(Json(payments))
}

#[tracing::instrument(skip(state))]
async fn user_payments(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Vec<Payment>>> {
    let payments = state.payments.payments_for_user(user_id).await?;
    Ok(Json(payments))
}

/// Members start a checkout for themselves
#[tracing::instrument(skip(state, request))]
async fn checkout(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<CheckoutRequest>, AppError>,
) -> AppResult<(StatusCode, Json<CheckoutResponse>)> {
    if session.role != UserRole::User {
        return Err(AppError::forbidden());
    }

    let response = state.payments.checkout(session.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[tracing::instrument(skip(state))]
async fn confirm_payment(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(payment_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<ConfirmPaymentResponse>> {
    let response = state.payments.confirm(&session, payment_id).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state))]
async fn fail_payment(
    State(state): State<AppState>,
    WithRejection(Path(payment_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Payment>> {
    let payment = state.payments.mark_failed(payment_id).await?;
    Ok(Json(payment))
}

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::Json,
    routing::post,
    Router,
};
use axum_extra::{
    extract::WithRejection,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use super::{admin_only, rate_limited, AppState};
use crate::auth::{
    jwt_auth_middleware, AuthError, LoginRequest, LoginResponse, MessageResponse,
    RefreshTokenRequest, TokenResponse,
};
use crate::error::{AppError, AppResult};
use crate::models::{PasswordResetRequest, RegisterRequest, RegisterResponse, SendOtpRequest, VerifyOtpRequest};

/// Registration and session routes
pub fn auth_routes(state: &AppState) -> Router<AppState> {
    let limiter = &state.rate_limiter;

    let admin = Router::new()
        .route("/register", admin_only(post(register)))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ));

    Router::new()
        .route("/send-otp", rate_limited(post(send_otp), limiter))
        .route("/verify-otp", rate_limited(post(verify_otp), limiter))
        .route("/login", rate_limited(post(login), limiter))
        .route("/refresh", post(refresh_token))
        .route("/logout", post(logout))
        .route("/password-reset", rate_limited(post(password_reset), limiter))
        .merge(admin)
}

#[tracing::instrument(skip(state, request))]
async fn send_otp(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<SendOtpRequest>, AppError>,
) -> AppResult<Json<MessageResponse>> {
    let response = state.registration.send_otp(request).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state, request))]
async fn verify_otp(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<VerifyOtpRequest>, AppError>,
) -> AppResult<Json<MessageResponse>> {
    let response = state.registration.verify_otp(request).await?;
    Ok(Json(response))
}

/// Register a member, trainer or admin (admin only)
#[tracing::instrument(skip(state, request))]
async fn register(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let response = state.registration.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[tracing::instrument(skip(state, request))]
async fn login(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<Json<LoginResponse>, AuthError> {
    let response = state.auth.login(request).await?;
    Ok(Json(response))
}

/// Refresh access token
#[tracing::instrument(skip(state, request))]
async fn refresh_token(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<RefreshTokenRequest>, AppError>,
) -> Result<Json<TokenResponse>, AuthError> {
    let response = state.auth.refresh_token(request).await?;
    Ok(Json(response))
}

/// Logout user
#[tracing::instrument(skip(state, bearer))]
async fn logout(
    State(state): State<AppState>,
    WithRejection(TypedHeader(Authorization(bearer)), _): WithRejection<
        TypedHeader<Authorization<Bearer>>,
        AuthError,
    >,
) -> Result<Json<MessageResponse>, AuthError> {
    let response = state.auth.logout(bearer.token()).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state, request))]
async fn password_reset(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<PasswordResetRequest>, AppError>,
) -> AppResult<Json<MessageResponse>> {
    let response = state.registration.request_password_reset(request).await?;
    Ok(Json(response))
}

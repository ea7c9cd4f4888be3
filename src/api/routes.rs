use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::assignments::assignment_routes;
use super::assistant::assistant_routes;
use super::attendance::attendance_routes;
use super::auth::auth_routes;
use super::health::health_check;
use super::memberships::membership_routes;
use super::messages::message_routes;
use super::nutrition::nutrition_routes;
use super::payments::payment_routes;
use super::sleep::sleep_log_routes;
use super::state::AppState;
use super::subscriptions::subscription_routes;
use super::users::user_routes;
use super::workouts::workout_routes;
use crate::auth::{cors_layer, security_headers_layer};

pub fn create_routes(state: AppState) -> Router {
    let api_v1 = Router::new()
        .nest("/auth", auth_routes(&state))
        .nest("/users", user_routes(&state))
        .nest("/subscriptions", subscription_routes(&state))
        .nest("/memberships", membership_routes(&state))
        .nest("/payments", payment_routes(&state))
        .nest("/assignments", assignment_routes(&state))
        .nest("/attendance", attendance_routes(&state))
        .nest("/sleep-logs", sleep_log_routes(&state))
        .nest("/nutrition-goals", nutrition_routes(&state))
        .nest("/workouts", workout_routes(&state))
        .nest("/messages", message_routes(&state))
        .nest("/assistant", assistant_routes(&state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .layer(security_headers_layer())
        .layer(cors_layer())
        .with_state(state)
}

// HTTP handlers and route tables

pub mod assignments;
pub mod assistant;
pub mod attendance;
pub mod auth;
pub mod health;
pub mod memberships;
pub mod messages;
pub mod nutrition;
pub mod payments;
pub mod routes;
pub mod sleep;
pub mod state;
pub mod subscriptions;
pub mod users;
pub mod workouts;

use axum::{middleware, routing::MethodRouter};

use crate::auth::{admin_only_middleware, trainer_or_admin_middleware};
use crate::middleware::{rate_limit_middleware, RateLimiter};

pub use routes::create_routes;
pub use state::{AppState, ExternalServices};

/// Restrict a single method router to admins. Must sit inside the JWT layer.
pub(crate) fn admin_only<S>(route: MethodRouter<S>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.route_layer(middleware::from_fn(admin_only_middleware))
}

pub(crate) fn trainer_or_admin<S>(route: MethodRouter<S>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.route_layer(middleware::from_fn(trainer_or_admin_middleware))
}

pub(crate) fn rate_limited<S>(route: MethodRouter<S>, limiter: &RateLimiter) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.route_layer(middleware::from_fn_with_state(limiter.clone(), rate_limit_middleware))
}

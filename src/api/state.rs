use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::middleware::{RateLimitConfig, RateLimiter};
use crate::services::{
    AssistantClient, AttendanceService, EmailTemplates, IdentityProvider, Mailer, MessageService,
    NutritionService, PaymentService, QueryCache, RegistrationService, SleepLogService,
    SubscriptionService, TrainerService, UserService, WorkoutService,
};

/// Clients for the hosted services the API talks to.
#[derive(Clone)]
pub struct ExternalServices {
    pub identity: Arc<dyn IdentityProvider>,
    pub mailer: Arc<dyn Mailer>,
    pub assistant: Arc<dyn AssistantClient>,
}

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub registration: RegistrationService,
    pub users: UserService,
    pub subscriptions: SubscriptionService,
    pub payments: PaymentService,
    pub trainers: TrainerService,
    pub attendance: AttendanceService,
    pub sleep_logs: SleepLogService,
    pub nutrition: NutritionService,
    pub workouts: WorkoutService,
    pub messages: MessageService,
    pub assistant: Arc<dyn AssistantClient>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(db: PgPool, config: &AppConfig, cache: QueryCache, external: ExternalServices) -> Self {
        let templates = EmailTemplates::new("Gym Manager");
        let subscriptions = SubscriptionService::new(db.clone(), cache.clone());
        let trainers = TrainerService::new(db.clone(), cache.clone());

        Self {
            auth: AuthService::new(db.clone(), &config.jwt_secret, external.identity.clone()),
            registration: RegistrationService::new(
                db.clone(),
                external.identity.clone(),
                external.mailer.clone(),
                templates.clone(),
                subscriptions.clone(),
                cache.clone(),
                config.otp_ttl(),
            ),
            users: UserService::new(
                db.clone(),
                cache.clone(),
                external.identity,
                subscriptions.clone(),
                trainers.clone(),
            ),
            payments: PaymentService::new(
                db.clone(),
                subscriptions.clone(),
                cache,
                external.mailer,
                templates,
            ),
            subscriptions,
            trainers,
            attendance: AttendanceService::new(db.clone()),
            sleep_logs: SleepLogService::new(db.clone()),
            nutrition: NutritionService::new(db.clone()),
            workouts: WorkoutService::new(db.clone()),
            messages: MessageService::new(db),
            assistant: external.assistant,
            rate_limiter: RateLimiter::new(RateLimitConfig::sensitive(config.trust_proxy)),
        }
    }
}

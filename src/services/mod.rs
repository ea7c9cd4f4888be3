// Business logic services

pub mod assistant_service;
pub mod attendance_service;
pub mod cache;
pub mod email_service;
pub mod identity_provider;
pub mod message_service;
pub mod nutrition_service;
pub mod payment_service;
pub mod registration_service;
pub mod scheduler;
pub mod sleep_log_service;
pub mod subscription_service;
pub mod trainer_service;
pub mod user_service;
pub mod workout_service;

pub use assistant_service::{AssistantClient, HttpAssistantClient};
pub use attendance_service::AttendanceService;
pub use cache::QueryCache;
pub use email_service::{EmailTemplates, Mailer, SmtpMailer};
pub use identity_provider::{HttpIdentityProvider, IdentityProvider};
pub use message_service::MessageService;
pub use nutrition_service::NutritionService;
pub use payment_service::PaymentService;
pub use registration_service::RegistrationService;
pub use scheduler::{MaintenanceScheduler, MaintenanceTasks};
pub use sleep_log_service::SleepLogService;
pub use subscription_service::SubscriptionService;
pub use trainer_service::TrainerService;
pub use user_service::UserService;
pub use workout_service::WorkoutService;

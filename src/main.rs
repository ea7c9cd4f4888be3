use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gym_manager::api::{create_routes, AppState, ExternalServices};
use gym_manager::config::{run_migrations, AppConfig, DatabaseConfig, DatabaseSeeder};
use gym_manager::services::{
    HttpAssistantClient, HttpIdentityProvider, MaintenanceScheduler, MaintenanceTasks, QueryCache,
    SmtpMailer,
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let db = DatabaseConfig::from_env()?.create_pool().await?;
    run_migrations(&db).await?;
    info!("Database migrations applied");

    let cache = QueryCache::from_url(config.redis_url.as_deref(), config.cache_ttl).await?;
    let external = ExternalServices {
        identity: Arc::new(HttpIdentityProvider::new(
            config.identity.api_url.clone(),
            config.identity.api_key.clone(),
        )?),
        mailer: Arc::new(SmtpMailer::new(&config.smtp)?),
        assistant: Arc::new(HttpAssistantClient::new(
            config.chat.api_url.clone(),
            config.chat.api_key.clone(),
            config.chat.model.clone(),
        )?),
    };

    let state = AppState::new(db.clone(), &config, cache, external.clone());

    DatabaseSeeder::new(db, state.subscriptions.clone(), external.identity)
        .seed_all(config.admin.as_ref())
        .await?;

    let scheduler = MaintenanceScheduler::start(MaintenanceTasks::new(
        state.subscriptions.clone(),
        state.registration.clone(),
        state.auth.clone(),
    ))
    .await?;

    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiter.cleanup_old_entries();
        }
    });

    let app = create_routes(state);

    let address = config.server_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Gym manager starting on http://{} ({})", address, config.environment);
    info!("Health check available at http://{}/health", address);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(err) = scheduler.shutdown().await {
        warn!("Scheduler did not shut down cleanly: {}", err);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", err);
    }
    info!("Shutdown signal received");
}

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::auth::AuthService;
use crate::services::{RegistrationService, SubscriptionService};

/// Hourly, on the hour.
const MAINTENANCE_SCHEDULE: &str = "0 0 * * * *";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub memberships_expired: u64,
    pub otps_purged: u64,
    pub tokens_purged: u64,
}

/// Housekeeping that keeps statuses and token tables current.
#[derive(Clone)]
pub struct MaintenanceTasks {
    subscriptions: SubscriptionService,
    registration: RegistrationService,
    auth: AuthService,
}

impl MaintenanceTasks {
    pub fn new(subscriptions: SubscriptionService, registration: RegistrationService, auth: AuthService) -> Self {
        Self {
            subscriptions,
            registration,
            auth,
        }
    }

    /// Run every task once. A failing task is logged and does not stop the others.
    pub async fn run_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match self.subscriptions.expire_overdue(Utc::now().date_naive()).await {
            Ok(count) => report.memberships_expired = count,
            Err(err) => error!("Failed to expire memberships: {}", err),
        }

        match self.registration.purge_stale_otps(Duration::days(1)).await {
            Ok(count) => report.otps_purged = count,
            Err(err) => error!("Failed to purge OTPs: {}", err),
        }

        match self.auth.purge_expired_tokens().await {
            Ok(count) => report.tokens_purged = count,
            Err(err) => error!("Failed to purge expired tokens: {}", err),
        }

        info!(
            memberships_expired = report.memberships_expired,
            otps_purged = report.otps_purged,
            tokens_purged = report.tokens_purged,
            "Maintenance run finished"
        );
        report
    }
}

pub struct MaintenanceScheduler {
    scheduler: JobScheduler,
}

impl MaintenanceScheduler {
    pub async fn start(tasks: MaintenanceTasks) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create job scheduler: {}", e))?;

        let job = Job::new_async(MAINTENANCE_SCHEDULE, move |_uuid, _l| {
            let tasks = tasks.clone();
            Box::pin(async move {
                tasks.run_once().await;
            })
        })
        .map_err(|e| anyhow!("Failed to create maintenance job: {}", e))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add maintenance job: {}", e))?;
        scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start job scheduler: {}", e))?;

        info!("Maintenance scheduler started");
        Ok(Self { scheduler })
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to stop job scheduler: {}", e))?;

        info!("Maintenance scheduler stopped");
        Ok(())
    }
}

use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::auth::UserRole;
use crate::config::AdminBootstrap;
use crate::models::{normalize_email, CreatePlanRequest};
use crate::services::{IdentityProvider, SubscriptionService};

pub struct DatabaseSeeder {
    pool: PgPool,
    subscriptions: SubscriptionService,
    identity: Arc<dyn IdentityProvider>,
}

impl DatabaseSeeder {
    pub fn new(pool: PgPool, subscriptions: SubscriptionService, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            pool,
            subscriptions,
            identity,
        }
    }

    pub async fn seed_all(&self, admin: Option<&AdminBootstrap>) -> Result<()> {
        tracing::info!("Starting database seeding...");

        self.seed_plans().await?;
        if let Some(admin) = admin {
            self.seed_admin(admin).await?;
        }

        tracing::info!("Database seeding completed!");
        Ok(())
    }

    async fn seed_plans(&self) -> Result<()> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscription_plans")
            .fetch_one(&self.pool)
            .await?;
        if existing > 0 {
            return Ok(());
        }

        for plan in default_plans() {
            let name = plan.name.clone();
            self.subscriptions.create_plan(plan).await?;
            tracing::info!("Created default plan {}", name);
        }

        Ok(())
    }

    async fn seed_admin(&self, admin: &AdminBootstrap) -> Result<()> {
        let email = normalize_email(&admin.email);

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = $1)")
            .bind(&email)
            .fetch_one(&self.pool)
            .await?;
        if exists {
            return Ok(());
        }

        let uid = match self.identity.find_user_by_email(&email).await? {
            Some(account) => account.uid,
            None => {
                self.identity
                    .create_user(&email, &admin.password, &admin.phone_number)
                    .await?
            }
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, uid, email, password_hash, name, user_type, phone_number, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&uid)
        .bind(&email)
        .bind(hash_password(&admin.password)?)
        .bind("Administrator")
        .bind(UserRole::Admin)
        .bind(admin.phone_number.trim())
        .execute(&self.pool)
        .await?;

        tracing::info!(uid = %uid, "Created bootstrap admin {}", email);
        Ok(())
    }
}

fn default_plans() -> Vec<CreatePlanRequest> {
    vec![
        CreatePlanRequest {
            name: "Basic".to_string(),
            description: "Gym floor access for one month".to_string(),
            duration_months: 1,
            personal_training: false,
            price_cents: 2_999,
        },
        CreatePlanRequest {
            name: "Quarterly".to_string(),
            description: "Gym floor and group classes for three months".to_string(),
            duration_months: 3,
            personal_training: false,
            price_cents: 7_999,
        },
        CreatePlanRequest {
            name: "Annual".to_string(),
            description: "Full access for twelve months with a personal trainer".to_string(),
            duration_months: 12,
            personal_training: true,
            price_cents: 29_999,
        },
    ]
}

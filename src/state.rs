use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;
use crate::mail::{self, Mailer, MemoryMailer};
use crate::users::{memory::MemoryUserRepo, repo::PgUserRepo, repo::UserRepo};

/// Applies pending migrations; the service does not start on a failure.
pub async fn run_migrations(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    tracing::info!("migrations applied");
    Ok(())
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepo>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        run_migrations(&db).await?;

        let users = Arc::new(PgUserRepo::new(db)) as Arc<dyn UserRepo>;
        let mailer = mail::from_config(&config.mail)?;

        Ok(Self {
            users,
            mailer,
            config,
        })
    }

    pub fn from_parts(
        users: Arc<dyn UserRepo>,
        mailer: Arc<dyn Mailer>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            users,
            mailer,
            config,
        }
    }

    /// In-memory state with test config; nothing touches the network.
    pub fn fake() -> Self {
        Self::from_parts(
            Arc::new(MemoryUserRepo::new()),
            Arc::new(MemoryMailer::new()),
            Arc::new(AppConfig::for_tests()),
        )
    }
}

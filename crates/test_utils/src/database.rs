//! PostgreSQL for integration tests
//!
//! [`TestDatabase::start`] connects to `TEST_DATABASE_URL` when it is set,
//! otherwise starts a throwaway `postgres:16-alpine` container. Callers
//! apply the schema themselves (`infra_db::run_migrations`). Each test gets
//! its own pool, since a pool cannot outlive the runtime that opened it.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "cod_test";
const POSTGRES_PASSWORD: &str = "cod_test";
const POSTGRES_DB: &str = "cod_dispatch_test";

/// Environment variable naming an existing database to test against
pub const TEST_DATABASE_URL: &str = "TEST_DATABASE_URL";

pub type TestDbError = Box<dyn std::error::Error + Send + Sync>;

/// A live database; the container, if any, stops on drop
pub struct TestDatabase {
    _container: Option<ContainerAsync<GenericImage>>,
    pub url: String,
    pub pool: PgPool,
}

impl TestDatabase {
    pub async fn start() -> Result<Self, TestDbError> {
        if let Ok(url) = std::env::var(TEST_DATABASE_URL) {
            let pool = connect(&url).await?;
            return Ok(Self { _container: None, url, pool });
        }

        let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr("database system is ready to accept connections"))
            .with_env_var("POSTGRES_USER", POSTGRES_USER)
            .with_env_var("POSTGRES_PASSWORD", POSTGRES_PASSWORD)
            .with_env_var("POSTGRES_DB", POSTGRES_DB)
            .start()
            .await?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432).await?;
        let url = connection_url(&host.to_string(), port);
        let pool = connect(&url).await?;

        Ok(Self {
            _container: Some(container),
            url,
            pool,
        })
    }

    /// `None` (with a note on stderr) when no database can be reached, so
    /// suites degrade to a skip on machines without Docker
    pub async fn start_or_skip(test: &str) -> Option<Self> {
        match Self::start().await {
            Ok(db) => Some(db),
            Err(e) => {
                eprintln!("skipping {}: no test database ({})", test, e);
                None
            }
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn connection_url(host: &str, port: u16) -> String {
    format!(
        "postgres://{}:{}@{}:{}/{}",
        POSTGRES_USER, POSTGRES_PASSWORD, host, port, POSTGRES_DB
    )
}

async fn connect(url: &str) -> Result<PgPool, TestDbError> {
    // The server can log "ready" once before its init restart, so retry briefly
    let mut attempts = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(_) if attempts < 10 => {
                attempts += 1;
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

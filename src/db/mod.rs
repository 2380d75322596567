// SQLite pool setup and migrations

pub mod seed;

use crate::config::Config;
use crate::core::errors::QhseError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Open the pool described by `config` and apply migrations
pub async fn connect(config: &Config) -> Result<SqlitePool, QhseError> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let in_memory = config.database_url.contains(":memory:");
    let mut pool_options = SqlitePoolOptions::new();
    if in_memory {
        // Each connection to :memory: is a separate database
        pool_options = pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    } else {
        pool_options = pool_options.max_connections(config.database_max_connections);
    }

    let pool = pool_options.connect_with(options).await?;
    migrate(&pool).await?;

    info!(in_memory, "Database ready");
    Ok(pool)
}

/// Single-connection in-memory database with the schema applied
pub async fn connect_in_memory() -> Result<SqlitePool, QhseError> {
    let mut config = Config::test_config();
    config.database_url = "sqlite::memory:".to_string();
    connect(&config).await
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), QhseError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Cheap liveness check used by the health endpoint
pub async fn ping(pool: &SqlitePool) -> Result<(), QhseError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

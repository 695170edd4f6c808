//! Database layer - connection pool and repositories

pub mod acl;
pub mod filter;
pub mod values;

pub use acl::AclRepository;
pub use filter::{FilterRepository, FilteredEntity};
pub use values::{ValuesRepository, VariableValue};

use crate::{config::DatabaseConfig, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;

fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions> {
    let mut options = PgConnectOptions::from_str(&config.url)?;
    if config.statement_timeout_seconds > 0 {
        options = options.options([(
            "statement_timeout",
            format!("{}s", config.statement_timeout_seconds),
        )]);
    }
    Ok(options)
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .min_connections(config.pool_min_size)
        .max_connections(config.pool_max_size)
        .acquire_timeout(Duration::from_secs(config.pool_timeout_seconds))
}

/// Open the pool and establish the first connection
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = pool_options(config)
        .connect_with(connect_options(config)?)
        .await?;
    tracing::info!(
        max_connections = config.pool_max_size,
        schema = %config.schema,
        "Database pool connected"
    );
    Ok(pool)
}

/// Build the pool without connecting; connections open on first use
pub fn connect_lazy(config: &DatabaseConfig) -> Result<PgPool> {
    Ok(pool_options(config).connect_lazy_with(connect_options(config)?))
}

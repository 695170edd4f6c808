//! Shared application state

use std::sync::Arc;

use sqlx::PgPool;
use tagql_filter::sql::is_identifier;

use crate::{
    config::Config,
    db::{self, AclRepository, FilterRepository, ValuesRepository},
    services::{FilterService, ValuesService},
    Error, Result,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: PgPool,
    pub filter_service: Arc<FilterService>,
    pub values_service: Arc<ValuesService>,
}

impl AppState {
    /// Connect to the database and wire up services
    pub async fn new(config: Config) -> Result<Self> {
        let pool = db::connect(&config.database).await?;
        Self::with_pool(config, pool)
    }

    /// Wire up services on an existing pool
    pub fn with_pool(config: Config, db_pool: PgPool) -> Result<Self> {
        let compiler = config
            .filter
            .compiler()
            .map_err(|e| Error::Internal(format!("invalid filter configuration: {e}")))?;
        let schema = config.database.schema.clone();
        if !is_identifier(&schema) {
            return Err(Error::Validation(format!(
                "database schema '{schema}' is not a valid identifier"
            )));
        }

        let filter_service = Arc::new(FilterService::new(
            compiler,
            schema.clone(),
            AclRepository::new(db_pool.clone(), schema.clone()),
            FilterRepository::new(db_pool.clone()),
        ));
        let values_service = ValuesService::new(
            filter_service.clone(),
            ValuesRepository::new(db_pool.clone(), schema),
        );

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            filter_service,
            values_service: Arc::new(values_service),
        })
    }
}

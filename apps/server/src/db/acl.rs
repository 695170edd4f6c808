//! Organization visibility checks

use crate::{metrics, Result};
use sqlx::PgPool;
use std::time::Instant;

#[derive(Clone)]
pub struct AclRepository {
    pool: PgPool,
    schema: String,
}

impl AclRepository {
    /// `schema` must already be a validated identifier
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    /// True when the user is a member of the organization
    pub async fn is_org_visible_for_user(&self, org_id: i64, user_id: i64) -> Result<bool> {
        let query = format!(
            "SELECT EXISTS (SELECT 1 FROM {}.org_user WHERE user_id = $1 AND org_id = $2)",
            self.schema
        );

        let started = Instant::now();
        let result = sqlx::query_scalar::<_, bool>(&query)
            .bind(user_id)
            .bind(org_id)
            .fetch_one(&self.pool)
            .await;
        metrics::observe_query("org_visibility", started, &result);

        Ok(result?)
    }
}

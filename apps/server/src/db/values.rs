//! Time-series values and current tag values of filtered entities

use crate::{db::filter::decode_object, metrics, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::time::Instant;

/// Current value of one tag on one entity
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct VariableValue {
    pub entity_id: i64,
    pub tag_id: i64,
    /// Text rendering of whichever value column the tag's kind selects
    pub value: Option<String>,
}

#[derive(Clone)]
pub struct ValuesRepository {
    pool: PgPool,
    schema: String,
}

impl ValuesRepository {
    /// `schema` must already be a validated identifier
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    /// Name of the organization's time-series table, if the org exists
    pub async fn value_table(&self, org_id: i64) -> Result<Option<String>> {
        let query = format!("SELECT value_table FROM {}.org WHERE id = $1", self.schema);

        let started = Instant::now();
        let result = sqlx::query_scalar::<_, Option<String>>(&query)
            .bind(org_id)
            .fetch_optional(&self.pool)
            .await;
        metrics::observe_query("value_table", started, &result);

        Ok(result?.flatten())
    }

    /// Run a statement from [`tagql_filter::values_sql`]
    pub async fn values(
        &self,
        sql: &str,
        entity_ids: &[i64],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Map<String, Value>>> {
        let started = Instant::now();
        let result = sqlx::query(sql)
            .persistent(false)
            .bind(entity_ids)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await;
        metrics::observe_query("values", started, &result);

        let rows = result?
            .iter()
            .map(decode_object)
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;
        tracing::debug!(rows = rows.len(), "Values statement executed");
        Ok(rows)
    }

    /// Run a statement from [`tagql_filter::variable_values_sql`]
    pub async fn variable_values(
        &self,
        sql: &str,
        tag: &str,
        entity_ids: &[i64],
    ) -> Result<Vec<VariableValue>> {
        let started = Instant::now();
        let result = sqlx::query_as::<_, VariableValue>(sql)
            .bind(tag)
            .bind(entity_ids)
            .fetch_all(&self.pool)
            .await;
        metrics::observe_query("variable_values", started, &result);

        Ok(result?)
    }
}

//! Execution of compiled filter statements and result shaping

use crate::{metrics, Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row, TypeInfo, ValueRef};
use std::collections::HashMap;
use std::time::Instant;
use tagql_filter::{CompiledQuery, TagSelection};

/// One entity in a filter response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredEntity {
    pub entity_id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Map<String, Value>>>,
}

#[derive(Clone)]
pub struct FilterRepository {
    pool: PgPool,
}

impl FilterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the statement once and shape its rows per the requested selection
    pub async fn execute(&self, compiled: &CompiledQuery) -> Result<Vec<FilteredEntity>> {
        let started = Instant::now();
        let result = sqlx::query(&compiled.sql)
            .persistent(false)
            .fetch_all(&self.pool)
            .await;
        metrics::observe_query("filter", started, &result);
        let rows = result.map_err(translate_error)?;

        let rows = rows
            .iter()
            .map(decode_row)
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        tracing::debug!(rows = rows.len(), "Filter statement executed");

        Ok(materialize(&compiled.selection, &compiled.columns, rows))
    }
}

/// Rewrite `column "x" does not exist` into a message naming the column
fn translate_error(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(column) = unknown_column(db_err.message()) {
            tracing::warn!(column = %column, "Filter referenced an unknown column");
            return Error::UnknownColumn { column };
        }
    }
    Error::Database(err)
}

fn unknown_column(message: &str) -> Option<String> {
    let rest = message.split_once("column ")?.1;
    let (name, _) = rest.split_once(" does not exist")?;
    let name = name.trim().trim_matches('"');
    (!name.is_empty()).then(|| name.to_string())
}

pub(crate) fn decode_row(row: &PgRow) -> std::result::Result<Vec<Value>, sqlx::Error> {
    (0..row.columns().len())
        .map(|index| decode_cell(row, index))
        .collect()
}

fn decode_cell(row: &PgRow, index: usize) -> std::result::Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "INT2" => Value::from(row.try_get::<i16, _>(index)?),
        "INT4" => Value::from(row.try_get::<i32, _>(index)?),
        "INT8" => Value::from(row.try_get::<i64, _>(index)?),
        "FLOAT4" => float(row.try_get::<f32, _>(index)?.into()),
        "FLOAT8" => float(row.try_get::<f64, _>(index)?),
        "NUMERIC" => decimal(row.try_get::<Decimal, _>(index)?),
        "BOOL" => Value::Bool(row.try_get::<bool, _>(index)?),
        "TIMESTAMPTZ" => Value::String(row.try_get::<DateTime<Utc>, _>(index)?.to_rfc3339()),
        "TIMESTAMP" => Value::String(
            row.try_get::<NaiveDateTime, _>(index)?
                .format("%Y-%m-%dT%H:%M:%S%.f")
                .to_string(),
        ),
        "DATE" => Value::String(row.try_get::<NaiveDate, _>(index)?.to_string()),
        "TIME" => Value::String(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index)?,
        _ => Value::String(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}

/// Decoded row keyed by column name, in select order
pub(crate) fn decode_object(row: &PgRow) -> std::result::Result<Map<String, Value>, sqlx::Error> {
    let names = row.columns().iter().map(|c| c.name().to_string());
    Ok(names.zip(decode_row(row)?).collect())
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// Integral numerics stay integers; others become floats
fn decimal(value: Decimal) -> Value {
    if value.fract().is_zero() {
        if let Some(int) = value.to_i64() {
            return Value::from(int);
        }
    }
    match value.to_f64() {
        Some(f) => float(f),
        None => Value::String(value.to_string()),
    }
}

/// Shape decoded rows into per-entity records
///
/// The first column is always `entity_id`. Without tags each entity appears
/// once; with tags each row becomes a tag object keyed by `columns`. Entities
/// keep the order of their first row.
pub fn materialize(
    selection: &TagSelection,
    columns: &[String],
    rows: Vec<Vec<Value>>,
) -> Vec<FilteredEntity> {
    let mut entities: Vec<FilteredEntity> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let Some(entity_id) = row.first().cloned() else {
            continue;
        };
        let key = entity_id.to_string();
        let position = *positions.entry(key).or_insert_with(|| {
            entities.push(FilteredEntity {
                entity_id: entity_id.clone(),
                tags: selection.includes_tags().then(Vec::new),
            });
            entities.len() - 1
        });

        if let Some(tags) = entities[position].tags.as_mut() {
            let tag: Map<String, Value> = columns.iter().cloned().zip(row).collect();
            tags.push(tag);
        }
    }

    entities
}

//! Values Service
//!
//! Time-series values and current tag values of the entities a filter
//! matches. Both reuse [`FilterService`] for compilation, organization
//! visibility and entity access control, then read values for the ids it
//! returns.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tagql_filter::{values_sql, variable_values_sql, Aggregation, Bucketing, ValuesQuery};
use validator::Validate;

use crate::{
    auth::Principal,
    db::{ValuesRepository, VariableValue},
    metrics,
    services::{FilterRequest, FilterService},
    Error, Result,
};

/// Aggregation settings of a values request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationRequest {
    /// One of `avg`, `min`, `max`, `sum`, `count`; empty means raw rows
    #[serde(default)]
    pub aggregation: Option<String>,
    /// Display form of the bucket width, kept for clients
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default, rename = "timeInSeconds")]
    pub time_in_seconds: Option<u32>,
}

/// Body of `POST /values`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ValuesRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub filter: FilterRequest,
    pub date_from: String,
    pub date_to: String,
    /// Tag whose value labels each series; `dis` when absent
    #[serde(default)]
    pub val_tag: Option<String>,
    #[serde(default)]
    pub operation: Option<OperationRequest>,
}

impl ValuesRequest {
    /// Label tags, from `tags` when given, else `val_tag`
    fn label_tags(&self) -> Vec<String> {
        match (&self.filter.tags, &self.val_tag) {
            (Some(tags), _) if !tags.is_empty() => tags.clone(),
            (_, Some(tag)) if !tag.trim().is_empty() => vec![tag.trim().to_string()],
            _ => Vec::new(),
        }
    }

    fn bucketing(&self) -> Result<Option<Bucketing>> {
        let Some(operation) = &self.operation else {
            return Ok(None);
        };
        let name = operation.aggregation.as_deref().unwrap_or_default();
        if name.trim().is_empty() {
            return Ok(None);
        }
        let aggregation = Aggregation::from_name(name)
            .ok_or_else(|| Error::Validation(format!("unknown aggregation '{name}'")))?;
        match operation.time_in_seconds {
            Some(0) => Err(Error::Validation(
                "timeInSeconds must be positive".to_string(),
            )),
            Some(seconds) => Ok(Some(Bucketing {
                aggregation,
                seconds,
            })),
            None => Ok(None),
        }
    }

    fn range(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let from = parse_timestamp("date_from", &self.date_from)?;
        let to = parse_timestamp("date_to", &self.date_to)?;
        if from >= to {
            return Err(Error::Validation(
                "date_from must be before date_to".to_string(),
            ));
        }
        Ok((from, to))
    }
}

/// Body of `POST /variable/values`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VariableValuesRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub filter: FilterRequest,
    #[validate(length(min = 1, max = 255, message = "tag must be 1 to 255 characters"))]
    pub tag: String,
}

/// Accepts RFC 3339, naive date-times (read as UTC) and plain dates
fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
        .ok_or_else(|| Error::Validation(format!("{field} '{value}' is not a timestamp")))
}

pub struct ValuesService {
    filter: Arc<FilterService>,
    repo: ValuesRepository,
}

impl ValuesService {
    pub fn new(filter: Arc<FilterService>, repo: ValuesRepository) -> Self {
        Self { filter, repo }
    }

    /// Time-series rows of the matching entities between the two dates
    #[tracing::instrument(
        name = "values",
        skip_all,
        fields(user_id = principal.user_id, org_id = request.filter.org_id)
    )]
    pub async fn values(
        &self,
        principal: &Principal,
        request: &ValuesRequest,
    ) -> Result<Vec<Map<String, Value>>> {
        request
            .validate()
            .map_err(|e| Error::Validation(e.to_string()))?;
        let (from, to) = request.range()?;
        let bucketing = request.bucketing()?;
        let label_tags = request.label_tags();

        let entity_ids = self.filter.entity_ids(principal, &request.filter).await?;
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }

        let value_table = self
            .repo
            .value_table(request.filter.org_id)
            .await?
            .ok_or_else(|| {
                Error::Internal(format!(
                    "organization {} has no value table",
                    request.filter.org_id
                ))
            })?;
        let sql = values_sql(&ValuesQuery {
            schema: self.filter.schema(),
            value_table: &value_table,
            label_tags: &label_tags,
            bucketing,
        })?;

        let rows = self.repo.values(&sql, &entity_ids, from, to).await?;
        metrics::FILTER_RESULTS
            .with_label_values(&["values"])
            .observe(rows.len() as f64);
        tracing::info!(
            entities = entity_ids.len(),
            rows = rows.len(),
            bucketed = bucketing.is_some(),
            "Values completed"
        );
        Ok(rows)
    }

    /// Current value of one tag on each matching entity, in filter order
    #[tracing::instrument(
        name = "variable_values",
        skip_all,
        fields(user_id = principal.user_id, org_id = request.filter.org_id)
    )]
    pub async fn variable_values(
        &self,
        principal: &Principal,
        request: &VariableValuesRequest,
    ) -> Result<Vec<VariableValue>> {
        request
            .validate()
            .map_err(|e| Error::Validation(e.to_string()))?;

        let entity_ids = self.filter.entity_ids(principal, &request.filter).await?;
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = variable_values_sql(self.filter.schema())?;
        let values = self
            .repo
            .variable_values(&sql, request.tag.trim(), &entity_ids)
            .await?;
        metrics::FILTER_RESULTS
            .with_label_values(&["variable_values"])
            .observe(values.len() as f64);
        tracing::info!(
            entities = entity_ids.len(),
            values = values.len(),
            "Variable values completed"
        );
        Ok(values)
    }
}

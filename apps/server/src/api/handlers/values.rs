//! Values endpoint handlers

use crate::{
    auth::Principal,
    db::VariableValue,
    services::{ValuesRequest, VariableValuesRequest},
    state::AppState,
    Error, Result,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{Map, Value};

/// Time-series values of filtered entities (POST /values)
///
/// Takes the `/filter` body plus `date_from`, `date_to`, an optional
/// `val_tag` and an optional `operation` of
/// `{"aggregation": "avg", "timeInSeconds": 900}` for gap-filled buckets.
pub async fn values(
    State(state): State<AppState>,
    principal: Principal,
    body: std::result::Result<Json<ValuesRequest>, JsonRejection>,
) -> Result<Json<Vec<Map<String, Value>>>> {
    let Json(request) = body.map_err(|rejection| Error::Validation(rejection.body_text()))?;
    let rows = state.values_service.values(&principal, &request).await?;
    Ok(Json(rows))
}

/// Current value of one tag on each filtered entity (POST /variable/values)
pub async fn variable_values(
    State(state): State<AppState>,
    principal: Principal,
    body: std::result::Result<Json<VariableValuesRequest>, JsonRejection>,
) -> Result<Json<Vec<VariableValue>>> {
    let Json(request) = body.map_err(|rejection| Error::Validation(rejection.body_text()))?;
    let values = state
        .values_service
        .variable_values(&principal, &request)
        .await?;
    Ok(Json(values))
}

//! Filter endpoint handler

use crate::{
    auth::Principal, db::FilteredEntity, request_context::RequestContext,
    services::FilterRequest, state::AppState, Error, Result,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

/// Filter entities visible to the caller (POST /filter)
///
/// Request body: `{"filter": "...", "org_id": 1, "tags": ["dis"]}`. The
/// response is an array of `{entity_id}` records, or `{entity_id, tags}`
/// when tags were requested.
pub async fn filter_entities(
    State(state): State<AppState>,
    principal: Principal,
    context: Option<Extension<RequestContext>>,
    body: std::result::Result<Json<FilterRequest>, JsonRejection>,
) -> Result<Json<Vec<FilteredEntity>>> {
    let Json(request) = body.map_err(|rejection| Error::Validation(rejection.body_text()))?;

    if let Some(Extension(context)) = &context {
        tracing::debug!(
            request_id = %context.request_id,
            user_id = principal.user_id,
            "Handling filter request"
        );
    }

    let entities = state
        .filter_service
        .filter_entities(&principal, &request)
        .await?;
    Ok(Json(entities))
}

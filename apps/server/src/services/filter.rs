//! Filter Service
//!
//! Runs one filter request end to end: compile, check organization
//! visibility, execute, shape the rows. Compilation happens before any
//! database access, so malformed filters fail fast.

use crate::{
    auth::Principal,
    db::{AclRepository, FilterRepository, FilteredEntity},
    metrics, Error, Result,
};
use serde::Deserialize;
use tagql_filter::{CompiledQuery, FilterCompiler, FilterQuery, KindSource};
use validator::Validate;

/// Body of `POST /filter`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FilterRequest {
    #[validate(length(min = 1, max = 4096, message = "filter must be 1 to 4096 characters"))]
    pub filter: String,
    pub org_id: i64,
    /// Tag names to return per entity; `"*"` returns every tag
    #[serde(default)]
    #[validate(length(max = 256, message = "at most 256 tags may be requested"))]
    pub tags: Option<Vec<String>>,
}

impl FilterRequest {
    pub fn requested_tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or_default()
    }
}

pub struct FilterService {
    compiler: FilterCompiler,
    schema: String,
    acl: AclRepository,
    repo: FilterRepository,
}

impl FilterService {
    pub fn new(
        compiler: FilterCompiler,
        schema: impl Into<String>,
        acl: AclRepository,
        repo: FilterRepository,
    ) -> Self {
        Self {
            compiler,
            schema: schema.into(),
            acl,
            repo,
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Compile without touching the database
    pub fn compile(&self, user_id: i64, request: &FilterRequest) -> Result<CompiledQuery> {
        let result = self.compiler.compile(&FilterQuery {
            filter: &request.filter,
            org_id: request.org_id,
            user_id,
            tags: request.requested_tags(),
            schema: &self.schema,
        });
        metrics::FILTER_COMPILATIONS_TOTAL
            .with_label_values(&[metrics::compilation_outcome(&result)])
            .inc();
        let compiled = result?;

        let kind_source = match self.compiler.options().kind_source {
            KindSource::Hierarchy => "hierarchy",
            KindSource::ParentsView => "parents_view",
        };
        metrics::FILTER_ALIASES
            .with_label_values(&[kind_source])
            .observe(compiled.alias_count as f64);
        tracing::debug!(
            sql_len = compiled.sql.len(),
            alias_count = compiled.alias_count,
            "Filter compiled"
        );
        Ok(compiled)
    }

    /// Entities matching the filter, shaped by the requested tags
    pub async fn filter_entities(
        &self,
        principal: &Principal,
        request: &FilterRequest,
    ) -> Result<Vec<FilteredEntity>> {
        let entities = self.run(principal, request).await?;
        metrics::FILTER_RESULTS
            .with_label_values(&["filter"])
            .observe(entities.len() as f64);
        Ok(entities)
    }

    /// Ids of the entities matching the filter, ignoring requested tags
    pub async fn entity_ids(
        &self,
        principal: &Principal,
        request: &FilterRequest,
    ) -> Result<Vec<i64>> {
        let ids_only = FilterRequest {
            tags: None,
            ..request.clone()
        };
        let entities = self.run(principal, &ids_only).await?;
        Ok(entities
            .iter()
            .filter_map(|entity| entity.entity_id.as_i64())
            .collect())
    }

    #[tracing::instrument(
        name = "filter_entities",
        skip_all,
        fields(user_id = principal.user_id, org_id = request.org_id)
    )]
    async fn run(
        &self,
        principal: &Principal,
        request: &FilterRequest,
    ) -> Result<Vec<FilteredEntity>> {
        request
            .validate()
            .map_err(|e| Error::Validation(e.to_string()))?;

        let compiled = self.compile(principal.user_id, request)?;

        if !self
            .acl
            .is_org_visible_for_user(request.org_id, principal.user_id)
            .await?
        {
            tracing::info!("Organization not visible to user");
            return Err(Error::AccessDenied {
                user_id: principal.user_id,
                org_id: request.org_id,
            });
        }

        let entities = self.repo.execute(&compiled).await?;
        tracing::info!(entities = entities.len(), "Filter completed");
        Ok(entities)
    }
}

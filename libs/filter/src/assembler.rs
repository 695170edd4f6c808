//! Query assembler
//!
//! Wraps a compiled predicate into the final statement:
//!
//! 1. base query: entities matching the predicate
//! 2. tag rows of those entities, shaped by the requested tags
//! 3. access-control wrapper, entity axis and tag axis
//! 4. outer projection, grouped when only entity ids were requested
//!
//! Each ACL axis renders as `((org grant OR user add grant) AND NOT user revoke)`.

use serde::Serialize;

use crate::compiler::{compile_expr, CompileOptions, CompiledFilter};
use crate::error::{Error, Result};
use crate::parser::parse;
use crate::sql::{is_identifier, quote_literal, SqlWriter};

/// `entity_tag` columns projected per tag row by default
pub const DEFAULT_VALUE_COLUMNS: [&str; 7] = [
    "tag_id",
    "value_n",
    "value_b",
    "value_s",
    "value_ts",
    "value_ref",
    "value_enum",
];

/// Which tag rows the caller asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "selection", content = "tags")]
pub enum TagSelection {
    /// Empty tag list: one row per entity, ids only
    EntityIds,
    /// `"*"` anywhere in the list: every tag row
    All,
    /// Tag rows whose tag name is listed
    Named(Vec<String>),
}

impl TagSelection {
    pub fn from_requested(tags: &[String]) -> Self {
        if tags.is_empty() {
            TagSelection::EntityIds
        } else if tags.iter().any(|t| t == "*") {
            TagSelection::All
        } else {
            TagSelection::Named(tags.to_vec())
        }
    }

    /// True when result rows carry tag values
    pub fn includes_tags(&self) -> bool {
        !matches!(self, TagSelection::EntityIds)
    }
}

/// Ordered `entity_tag` value columns used for dynamic projections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueColumns(Vec<String>);

impl ValueColumns {
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(Error::InvalidOptions(
                "value column list is empty".to_string(),
            ));
        }
        for (index, column) in columns.iter().enumerate() {
            if !is_identifier(column) {
                return Err(Error::InvalidIdentifier(column.clone()));
            }
            if column == "id" || column == "entity_id" {
                return Err(Error::InvalidOptions(format!(
                    "'{column}' is always projected and cannot be listed as a value column"
                )));
            }
            if columns[..index].contains(column) {
                return Err(Error::InvalidOptions(format!(
                    "value column '{column}' listed twice"
                )));
            }
        }
        if !columns.iter().any(|c| c == "tag_id") {
            return Err(Error::InvalidOptions(
                "value columns must include 'tag_id'".to_string(),
            ));
        }
        Ok(Self(columns))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for ValueColumns {
    fn default() -> Self {
        Self(DEFAULT_VALUE_COLUMNS.iter().map(|c| c.to_string()).collect())
    }
}

/// One filter request as seen by the compiler
#[derive(Debug, Clone, Copy)]
pub struct FilterQuery<'a> {
    pub filter: &'a str,
    pub org_id: i64,
    pub user_id: i64,
    pub tags: &'a [String],
    pub schema: &'a str,
}

/// A finished statement and the shape of the rows it returns
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub selection: TagSelection,
    /// Result column names in select order
    pub columns: Vec<String>,
    pub alias_count: usize,
}

/// Filter-to-SQL compiler with fixed options and output columns
#[derive(Debug, Clone, Default)]
pub struct FilterCompiler {
    options: CompileOptions,
    columns: ValueColumns,
}

impl FilterCompiler {
    pub fn new(options: CompileOptions, columns: ValueColumns) -> Result<Self> {
        options.validate()?;
        Ok(Self { options, columns })
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn value_columns(&self) -> &ValueColumns {
        &self.columns
    }

    /// Parse, compile and assemble one request
    pub fn compile(&self, query: &FilterQuery<'_>) -> Result<CompiledQuery> {
        if !is_identifier(query.schema) {
            return Err(Error::InvalidIdentifier(query.schema.to_string()));
        }

        let expr = parse(query.filter)?;
        let compiled = compile_expr(&expr, &self.options)?;
        let selection = TagSelection::from_requested(query.tags);
        let sql = self.assemble(&compiled, &selection, query);

        let mut columns = vec!["entity_id".to_string()];
        if selection.includes_tags() {
            columns.extend(self.columns.as_slice().iter().cloned());
        }

        tracing::debug!(
            sql_len = sql.len(),
            aliases = compiled.alias_count,
            ctes = compiled.ctes.len(),
            with_tags = selection.includes_tags(),
            "Assembled filter statement"
        );

        Ok(CompiledQuery {
            sql,
            selection,
            columns,
            alias_count: compiled.alias_count,
        })
    }

    fn assemble(
        &self,
        compiled: &CompiledFilter,
        selection: &TagSelection,
        query: &FilterQuery<'_>,
    ) -> String {
        let mut w = SqlWriter::new(query.schema);
        let with_tags = selection.includes_tags();

        w.ctes(&compiled.ctes);

        // Outer projection
        w.push("SELECT root.id AS entity_id");
        if with_tags {
            self.column_list(&mut w, "root");
        }
        w.push(" FROM (\n");

        // ACL wrapper
        w.push("SELECT a.id");
        if with_tags {
            self.column_list(&mut w, "a");
        }
        w.push(" FROM (\n");

        // Tag rows of matched entities
        w.push("SELECT ");
        if !with_tags {
            w.push("DISTINCT ON (et.entity_id) ");
        }
        w.push("et.entity_id AS id");
        self.column_list(&mut w, "et");
        w.push(" FROM ");
        w.table("entity_tag");
        w.push(" et JOIN ");
        w.table("tag_def");
        w.push(" td ON et.tag_id = td.id WHERE et.entity_id IN (\n");

        // Base entity query
        w.push("SELECT e.id FROM ");
        w.table("\"entity\"");
        w.push(" e, ");
        w.table("entity_tag");
        w.push(" et");
        for lookup in &compiled.lookups {
            w.push(", ");
            w.lookup(lookup);
        }
        w.push(" WHERE e.id = et.entity_id AND (");
        w.predicate(&compiled.predicate);
        w.push(")\n)");

        match selection {
            TagSelection::EntityIds => w.push(" ORDER BY et.entity_id, et.tag_id"),
            TagSelection::All => {}
            TagSelection::Named(names) => {
                let quoted: Vec<String> = names.iter().map(|n| quote_literal(n)).collect();
                w.push(&format!(" AND td.name IN ({})", quoted.join(", ")));
            }
        }

        w.push("\n) a, ");
        w.table("tag_def");
        w.push(" td, ");
        w.table("tag_meta");
        w.push(" tm WHERE td.name = 'lib' AND td.id = tm.attribute AND tm.tag_id = a.tag_id\nAND ");
        access_axis(&mut w, &ENTITY_AXIS, query, "a.id");
        w.push("\nAND ");
        access_axis(&mut w, &TAG_AXIS, query, "tm.value");
        w.push("\n) root");

        if !with_tags {
            w.push(" GROUP BY root.id");
        }

        w.finish()
    }

    fn column_list(&self, w: &mut SqlWriter<'_>, alias: &str) {
        for column in self.columns.as_slice() {
            w.push(&format!(", {alias}.{column}"));
        }
    }
}

/// Grant/revoke tables of one ACL axis: `(table, alias, key column)`
struct AccessAxis {
    org_grant: (&'static str, &'static str, &'static str),
    user_grant: (&'static str, &'static str, &'static str),
    user_revoke: (&'static str, &'static str, &'static str),
}

const ENTITY_AXIS: AccessAxis = AccessAxis {
    org_grant: ("org_entity_permission", "oep", "entity_id"),
    user_grant: ("user_entity_add_permission", "ueap", "entity_id"),
    user_revoke: ("user_entity_rev_permission", "uerp", "entity_id"),
};

const TAG_AXIS: AccessAxis = AccessAxis {
    org_grant: ("org_tag_permission", "otp", "tag_id"),
    user_grant: ("user_tag_add_permission", "utap", "tag_id"),
    user_revoke: ("user_tag_rev_permission", "utrp", "tag_id"),
};

fn access_axis(w: &mut SqlWriter<'_>, axis: &AccessAxis, query: &FilterQuery<'_>, subject: &str) {
    w.push("((");
    permission_check(w, axis.org_grant, "org_id", query.org_id, subject);
    w.push(" OR ");
    permission_check(w, axis.user_grant, "user_id", query.user_id, subject);
    w.push(") AND NOT ");
    permission_check(w, axis.user_revoke, "user_id", query.user_id, subject);
    w.push(")");
}

fn permission_check(
    w: &mut SqlWriter<'_>,
    (table, alias, key): (&str, &str, &str),
    owner: &str,
    id: i64,
    subject: &str,
) {
    w.push("EXISTS (SELECT 1 FROM ");
    w.table(table);
    w.push(&format!(
        " {alias} WHERE {alias}.{owner} = {id} AND {alias}.{key} = {subject})"
    ));
}

/// Compile a filter with default options and columns
pub fn compile_filter(
    filter: &str,
    org_id: i64,
    user_id: i64,
    tags: &[String],
    schema: &str,
) -> Result<String> {
    FilterCompiler::default()
        .compile(&FilterQuery {
            filter,
            org_id,
            user_id,
            tags,
            schema,
        })
        .map(|compiled| compiled.sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_anywhere_selects_all() {
        let tags = vec!["dis".to_string(), "*".to_string()];
        assert_eq!(TagSelection::from_requested(&tags), TagSelection::All);
        assert_eq!(TagSelection::from_requested(&[]), TagSelection::EntityIds);
    }

    #[test]
    fn value_columns_require_tag_id() {
        let err = ValueColumns::new(["value_n", "value_s"]).unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
    }

    #[test]
    fn value_columns_reject_sql() {
        let err = ValueColumns::new(["tag_id", "value_s; drop"]).unwrap_err();
        assert_eq!(err, Error::InvalidIdentifier("value_s; drop".into()));
    }

    #[test]
    fn value_columns_reject_duplicates() {
        assert!(ValueColumns::new(["tag_id", "value_n", "value_n"]).is_err());
        assert!(ValueColumns::new(["tag_id", "entity_id"]).is_err());
    }

    #[test]
    fn invalid_schema_is_rejected_before_parsing() {
        let err = compile_filter("a and and b", 1, 1, &[], "core dev").unwrap_err();
        assert_eq!(err, Error::InvalidIdentifier("core dev".into()));
    }
}

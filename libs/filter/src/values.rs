//! Statements over the values of already-filtered entities
//!
//! Two read paths sit on top of a filter: time-series rows from the org's
//! value table (raw, or bucketed with `time_bucket_gapfill`) and the current
//! value of one tag per entity. Both take the matched entity ids as a bound
//! `bigint[]` parameter instead of splicing them into the text.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sql::{is_identifier, quote_identifier, quote_literal, SqlWriter};

/// Row cap of every values statement
pub const VALUES_ROW_LIMIT: usize = 1000;

/// Tag whose text labels an entity when no label tags are requested
pub const DEFAULT_LABEL_TAG: &str = "dis";

/// Separator between label tag values in `entity_name`
pub const LABEL_SEPARATOR: &str = "||";

// Label joins start at 10 so they never collide with the `kind` join (2)
const LABEL_ALIAS_BASE: usize = 10;

/// Aggregate applied to `value_n` inside each time bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Sum,
    Count,
}

impl Aggregation {
    pub fn function(self) -> &'static str {
        match self {
            Aggregation::Avg => "avg",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Sum => "sum",
            Aggregation::Count => "count",
        }
    }

    /// Case-insensitive lookup by function name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "avg" => Some(Aggregation::Avg),
            "min" => Some(Aggregation::Min),
            "max" => Some(Aggregation::Max),
            "sum" => Some(Aggregation::Sum),
            "count" => Some(Aggregation::Count),
            _ => None,
        }
    }
}

/// Gap-filled buckets of `seconds` width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucketing {
    pub aggregation: Aggregation,
    pub seconds: u32,
}

/// Inputs of [`values_sql`]
///
/// Parameters of the rendered statement: `$1` entity ids (`bigint[]`),
/// `$2` lower and `$3` upper time bound, both exclusive.
#[derive(Debug, Clone)]
pub struct ValuesQuery<'a> {
    pub schema: &'a str,
    /// Per-org time-series table, quoted as an identifier
    pub value_table: &'a str,
    /// Tags concatenated into `entity_name`; empty means [`DEFAULT_LABEL_TAG`]
    pub label_tags: &'a [String],
    pub bucketing: Option<Bucketing>,
}

/// Time-series rows of the given entities, labelled with `kind` and `entity_name`
pub fn values_sql(query: &ValuesQuery<'_>) -> Result<String> {
    if !is_identifier(query.schema) {
        return Err(Error::InvalidIdentifier(query.schema.to_string()));
    }
    if query.value_table.is_empty() {
        return Err(Error::InvalidIdentifier(String::new()));
    }
    if matches!(query.bucketing, Some(Bucketing { seconds: 0, .. })) {
        return Err(Error::InvalidOptions(
            "bucket width must be at least one second".to_string(),
        ));
    }

    let default_label = [DEFAULT_LABEL_TAG.to_string()];
    let labels = if query.label_tags.is_empty() {
        &default_label[..]
    } else {
        query.label_tags
    };

    let mut w = SqlWriter::new(query.schema);
    w.push("SELECT ");
    match query.bucketing {
        Some(bucketing) => w.push(&format!(
            "time_bucket_gapfill(INTERVAL '{} seconds', v.ts, $2, $3) AS time, \
             v.entity_id, v.status, et2.value_s AS kind, ",
            bucketing.seconds
        )),
        None => w.push("v.*, et2.value_s AS kind, "),
    }
    label_expression(&mut w, labels.len());
    w.push(" AS entity_name");
    if let Some(bucketing) = query.bucketing {
        w.push(&format!(
            ", locf(CASE WHEN et2.value_s = 'Number' THEN {}(v.value_n) END) AS value_n",
            bucketing.aggregation.function()
        ));
    }

    w.push(" FROM ");
    w.table(&quote_identifier(query.value_table));
    w.push(" v");
    for index in 0..labels.len() {
        let n = LABEL_ALIAS_BASE + index;
        w.push(", ");
        w.table("tag_def");
        w.push(&format!(" td{n}, "));
        w.table("entity_tag");
        w.push(&format!(" et{n}"));
    }
    w.push(", ");
    w.table("tag_def");
    w.push(" td2, ");
    w.table("entity_tag");
    w.push(" et2");

    w.push(" WHERE v.entity_id = ANY($1)");
    for (index, tag) in labels.iter().enumerate() {
        let n = LABEL_ALIAS_BASE + index;
        w.push(&format!(
            " AND td{n}.name = {} AND td{n}.id = et{n}.tag_id AND et{n}.entity_id = v.entity_id",
            quote_literal(tag)
        ));
    }
    w.push(
        " AND td2.name = 'kind' AND td2.id = et2.tag_id AND et2.entity_id = v.entity_id \
         AND v.ts > $2 AND v.ts < $3",
    );
    if query.bucketing.is_some() {
        w.push(" GROUP BY v.entity_id, v.status, kind, entity_name, time");
    }
    w.push(&format!(" LIMIT {VALUES_ROW_LIMIT}"));
    Ok(w.finish())
}

/// `etA.value_s || '||' || etB.value_s ...`
fn label_expression(w: &mut SqlWriter<'_>, count: usize) {
    let separator = quote_literal(LABEL_SEPARATOR);
    for index in 0..count {
        if index > 0 {
            w.push(&format!(" || {separator} || "));
        }
        w.push(&format!("et{}.value_s", LABEL_ALIAS_BASE + index));
    }
}

/// First-ancestor markers of a tag and the column its value is read from,
/// tested in this order
pub const VARIABLE_COLUMNS: [(&[&str], &str); 8] = [
    (&["str"], "value_s"),
    (&["number"], "value_n"),
    (&["bool"], "value_b"),
    (&["date", "dateTime", "time"], "value_ts"),
    (&["dict"], "value_dict"),
    (&["enum"], "value_enum"),
    (&["list"], "value_list"),
    (&["ref"], "value_ref"),
];

/// Current value of one tag for each entity, rendered as text
///
/// Parameters: `$1` tag name, `$2` entity ids (`bigint[]`). Rows come back in
/// entity order with at most [`VALUES_ROW_LIMIT`] rows per entity.
pub fn variable_values_sql(schema: &str) -> Result<String> {
    if !is_identifier(schema) {
        return Err(Error::InvalidIdentifier(schema.to_string()));
    }

    let mut w = SqlWriter::new(schema);
    w.push(
        "SELECT ids.entity_id, tv.tag_id, tv.value \
         FROM unnest($2::bigint[]) WITH ORDINALITY AS ids(entity_id, ord) \
         CROSS JOIN LATERAL (SELECT et.tag_id::bigint AS tag_id, CASE",
    );
    for (markers, column) in VARIABLE_COLUMNS {
        w.push(" WHEN ");
        for (index, marker) in markers.iter().enumerate() {
            if index > 0 {
                w.push(" OR ");
            }
            w.push(&format!(
                "p.parent_ids LIKE {}",
                quote_literal(&format!(",{marker},%"))
            ));
        }
        w.push(&format!(" THEN et.{column}::text"));
    }
    w.push(" END AS value FROM ");
    w.table("tag_def");
    w.push(" tg LEFT JOIN ");
    w.table("entity_tag");
    w.push(" et ON et.tag_id = tg.id LEFT JOIN ");
    w.table("tag_def_parents");
    w.push(&format!(
        " p ON p.tag_id = tg.id WHERE tg.name = $1 AND et.entity_id = ids.entity_id \
         LIMIT {VALUES_ROW_LIMIT}) tv ORDER BY ids.ord"
    ));
    Ok(w.finish())
}

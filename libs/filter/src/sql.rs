//! SQL fragment tree and its renderer
//!
//! The compiler builds these fragments; [`SqlWriter`] turns the finished tree
//! into text exactly once. Every table reference is qualified with the
//! tenant schema at render time, and every string value goes through
//! [`quote_literal`].

use serde::{Deserialize, Serialize};

use crate::ast::{CmpOp, Literal};
use crate::kind::ValueKind;

/// Where a tag's ancestor list comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindSource {
    /// One recursive `hier_queryN` CTE per kind-resolved reference
    #[default]
    Hierarchy,
    /// The precomputed `tag_def_parents` view
    ParentsView,
}

/// `hier_queryN`: walks `tag_hierarchy` upward from one tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyCte {
    pub alias: usize,
    pub tag: String,
}

/// One-row subquery exposing `hqN.parent_id` as `,a,b,c,`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindLookup {
    pub alias: usize,
    pub tag: String,
    pub source: KindSource,
}

/// A value as it appears on the right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Emitted verbatim so PostgreSQL `numeric` sees the exact value
    Number(String),
    Integer(i64),
    Bool(bool),
    Text(String),
}

impl From<&Literal> for SqlValue {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Number(n) => SqlValue::Number(n.clone()),
            Literal::Ref(id) => SqlValue::Integer(*id),
            Literal::Bool(b) => SqlValue::Bool(*b),
            Literal::Str(s) | Literal::Uri(s) | Literal::DateTime(s) => SqlValue::Text(s.clone()),
            Literal::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
            Literal::Time(t) => SqlValue::Text(t.format("%H:%M:%S%.f").to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Binary { op: CmpOp, value: SqlValue },
    In(Vec<SqlValue>),
}

/// `CASE WHEN hqN.parent_id LIKE '%,<marker>,%' THEN etN.<column> <cmp> ... END`
#[derive(Debug, Clone, PartialEq)]
pub struct CaseDispatch {
    pub alias: usize,
    pub kinds: Vec<ValueKind>,
    pub comparison: Comparison,
}

/// A subquery yielding `entity_id`s of entities carrying a tag
#[derive(Debug, Clone, PartialEq)]
pub enum TagSubquery {
    /// Entities that carry `tag` at all
    Exists { alias: usize, tag: String },
    /// Entities whose `tag` value satisfies the dispatch, kind resolved inline
    Dispatch {
        tag: String,
        lookup: KindLookup,
        dispatch: CaseDispatch,
    },
    /// Entities whose reference `tag` points at an entity from `inner`
    Follow {
        alias: usize,
        tag: String,
        inner: Box<TagSubquery>,
    },
}

impl TagSubquery {
    /// Number of `entity_tag` scans, i.e. nesting levels
    pub fn depth(&self) -> usize {
        match self {
            TagSubquery::Exists { .. } | TagSubquery::Dispatch { .. } => 1,
            TagSubquery::Follow { inner, .. } => 1 + inner.depth(),
        }
    }
}

/// Compiled boolean predicate over the base entity row `e`
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
    Paren(Box<Predicate>),
    Not(Box<Predicate>),
    /// `e.id IN (<subquery>)`
    EntityIn(TagSubquery),
    /// `EXISTS (...)` correlated on `e.id`, kind resolved by base-level `hqN`
    Matches {
        alias: usize,
        tag: String,
        dispatch: CaseDispatch,
    },
}

/// Quote a string as a SQL literal, doubling embedded quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quote a string as a SQL identifier, doubling embedded double quotes
pub fn quote_identifier(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Plain unquoted SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    value.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Renders fragments into one statement
pub struct SqlWriter<'a> {
    schema: &'a str,
    out: String,
}

impl<'a> SqlWriter<'a> {
    pub fn new(schema: &'a str) -> Self {
        Self {
            schema,
            out: String::with_capacity(1024),
        }
    }

    pub fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    /// Schema-qualified table name
    pub fn table(&mut self, name: &str) {
        self.out.push_str(self.schema);
        self.out.push('.');
        self.out.push_str(name);
    }

    pub fn finish(self) -> String {
        self.out
    }

    /// `WITH RECURSIVE a AS (...), b AS (...) ` or nothing
    pub fn ctes(&mut self, ctes: &[HierarchyCte]) {
        for (index, cte) in ctes.iter().enumerate() {
            self.push(if index == 0 { "WITH RECURSIVE " } else { ", " });
            self.cte(cte);
        }
        if !ctes.is_empty() {
            self.push("\n");
        }
    }

    fn cte(&mut self, cte: &HierarchyCte) {
        let n = cte.alias;
        self.push(&format!(
            "hier_query{n} AS (SELECT th.child_id, th.parent_id FROM "
        ));
        self.table("tag_hierarchy");
        self.push(" th, ");
        self.table("tag_def");
        self.push(&format!(
            " td{n} WHERE th.child_id = td{n}.id AND td{n}.name = {} UNION ALL SELECT th2.child_id, th2.parent_id FROM ",
            quote_literal(&cte.tag)
        ));
        self.table("tag_hierarchy");
        self.push(&format!(
            " th2 INNER JOIN hier_query{n} c ON c.parent_id = th2.child_id)"
        ));
    }

    pub fn lookup(&mut self, lookup: &KindLookup) {
        let n = lookup.alias;
        match lookup.source {
            KindSource::Hierarchy => {
                self.push(&format!(
                    "(SELECT ',' || string_agg(td{n}.name, ',') || ',' AS parent_id FROM hier_query{n}, "
                ));
                self.table("tag_def");
                self.push(&format!(
                    " td{n} WHERE td{n}.id = hier_query{n}.parent_id) hq{n}"
                ));
            }
            KindSource::ParentsView => {
                // max() keeps the lookup at one row when the tag has no entry
                self.push(&format!("(SELECT max(tdp{n}.parent_ids) AS parent_id FROM "));
                self.table("tag_def_parents");
                self.push(&format!(" tdp{n}, "));
                self.table("tag_def");
                self.push(&format!(
                    " td{n} WHERE tdp{n}.tag_id = td{n}.id AND td{n}.name = {}) hq{n}",
                    quote_literal(&lookup.tag)
                ));
            }
        }
    }

    pub fn predicate(&mut self, predicate: &Predicate) {
        match predicate {
            Predicate::Or(operands) => {
                for (index, operand) in operands.iter().enumerate() {
                    if index > 0 {
                        self.push(" OR ");
                    }
                    // AND groups keep explicit parentheses inside OR lists
                    if matches!(operand, Predicate::And(_)) {
                        self.push("(");
                        self.predicate(operand);
                        self.push(")");
                    } else {
                        self.predicate(operand);
                    }
                }
            }
            Predicate::And(operands) => {
                for (index, operand) in operands.iter().enumerate() {
                    if index > 0 {
                        self.push(" AND ");
                    }
                    self.predicate(operand);
                }
            }
            Predicate::Paren(inner) => {
                self.push("(");
                self.predicate(inner);
                self.push(")");
            }
            Predicate::Not(inner) => {
                self.push("NOT ");
                self.predicate(inner);
            }
            Predicate::EntityIn(subquery) => {
                self.push("e.id IN (");
                self.subquery(subquery);
                self.push(")");
            }
            Predicate::Matches {
                alias,
                tag,
                dispatch,
            } => {
                let n = *alias;
                self.push("EXISTS (SELECT 1 FROM ");
                self.table("entity_tag");
                self.push(&format!(" et{n}, "));
                self.table("tag_def");
                self.push(&format!(
                    " td{n} WHERE et{n}.entity_id = e.id AND et{n}.tag_id = td{n}.id AND td{n}.name = {} AND ",
                    quote_literal(tag)
                ));
                self.case(dispatch);
                self.push(")");
            }
        }
    }

    fn subquery(&mut self, subquery: &TagSubquery) {
        match subquery {
            TagSubquery::Exists { alias, tag } => {
                self.tag_rows(*alias, tag, "SELECT entity_id");
            }
            TagSubquery::Dispatch {
                tag,
                lookup,
                dispatch,
            } => {
                let n = lookup.alias;
                self.push(&format!("SELECT et{n}.entity_id FROM "));
                self.table("entity_tag");
                self.push(&format!(" et{n}, "));
                self.lookup(lookup);
                self.push(", ");
                self.table("tag_def");
                self.push(&format!(
                    " td{n} WHERE et{n}.tag_id = td{n}.id AND td{n}.name = {} AND ",
                    quote_literal(tag)
                ));
                self.case(dispatch);
                self.push(&format!(" GROUP BY et{n}.entity_id"));
            }
            TagSubquery::Follow { alias, tag, inner } => {
                self.tag_rows(*alias, tag, "SELECT entity_id");
                self.push(&format!(" AND et{alias}.value_ref IN ("));
                self.subquery(inner);
                self.push(")");
            }
        }
    }

    /// `<select> FROM S.entity_tag etN, S.tag_def tdN WHERE ... tdN.name = '<tag>'`
    fn tag_rows(&mut self, n: usize, tag: &str, select: &str) {
        self.push(select);
        self.push(" FROM ");
        self.table("entity_tag");
        self.push(&format!(" et{n}, "));
        self.table("tag_def");
        self.push(&format!(
            " td{n} WHERE et{n}.tag_id = td{n}.id AND td{n}.name = {}",
            quote_literal(tag)
        ));
    }

    fn case(&mut self, dispatch: &CaseDispatch) {
        let n = dispatch.alias;
        self.push("CASE");
        for kind in &dispatch.kinds {
            self.push(" WHEN ");
            for (index, marker) in kind.markers().iter().enumerate() {
                if index > 0 {
                    self.push(" OR ");
                }
                self.push(&format!(
                    "hq{n}.parent_id LIKE {}",
                    quote_literal(&format!("%,{marker},%"))
                ));
            }
            self.push(&format!(" THEN et{n}.{} ", kind.column()));
            self.comparison(&dispatch.comparison);
        }
        self.push(" END");
    }

    fn comparison(&mut self, comparison: &Comparison) {
        match comparison {
            Comparison::Binary { op, value } => {
                self.push(op.as_sql());
                self.push(" ");
                self.value(value);
            }
            Comparison::In(values) => {
                self.push("IN (");
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        self.push(", ");
                    }
                    self.value(value);
                }
                self.push(")");
            }
        }
    }

    fn value(&mut self, value: &SqlValue) {
        match value {
            SqlValue::Number(n) => self.push(n),
            SqlValue::Integer(i) => self.push(&i.to_string()),
            SqlValue::Bool(b) => self.push(if *b { "true" } else { "false" }),
            SqlValue::Text(s) => self.push(&quote_literal(s)),
        }
    }
}

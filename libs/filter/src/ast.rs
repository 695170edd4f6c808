//! Abstract syntax tree for filter expressions

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::fmt;

/// A parsed filter expression
///
/// `Or` and `And` always hold at least two operands; a single operand is
/// stored as itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Expr {
    Or { operands: Vec<Expr> },
    And { operands: Vec<Expr> },
    Paren { inner: Box<Expr> },
    Has { path: Path },
    Missing { path: Path },
    Cmp { path: Path, op: CmpOp, value: Literal },
    InCmp { path: Path, values: Vec<Literal> },
}

impl Expr {
    /// Visit every tag reference in the expression, left to right
    pub fn for_each_path<'a>(&'a self, f: &mut impl FnMut(&'a Path)) {
        match self {
            Expr::Or { operands } | Expr::And { operands } => {
                for operand in operands {
                    operand.for_each_path(f);
                }
            }
            Expr::Paren { inner } => inner.for_each_path(f),
            Expr::Has { path }
            | Expr::Missing { path }
            | Expr::Cmp { path, .. }
            | Expr::InCmp { path, .. } => f(path),
        }
    }
}

/// A tag reference: a single name or a `->` reference chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Path {
    pub segments: Vec<String>,
}

impl Path {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    /// True when the reference follows at least one `->`
    pub fn is_chain(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn terminal(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("->"))
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// SQL spelling; `==` becomes `=`
    pub fn as_sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Literal values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Literal {
    /// Numeric text as written; the lexer has already checked its shape
    Number(String),
    /// Target entity id of a reference
    Ref(i64),
    Str(String),
    Uri(String),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Validated ISO-8601 date-time, kept as written so offsets survive
    DateTime(String),
}

impl Literal {
    /// Numbers and references share the numeric dispatch branches
    pub fn is_numeric(&self) -> bool {
        matches!(self, Literal::Number(_) | Literal::Ref(_))
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, Literal::Str(_) | Literal::Uri(_))
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Literal::Date(_) | Literal::Time(_) | Literal::DateTime(_)
        )
    }
}

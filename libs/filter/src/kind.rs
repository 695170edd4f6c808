//! Value kinds and the kind dispatch table
//!
//! A tag's physical value column is implied by which abstract kind tags
//! (`number`, `str`, ...) appear among its hierarchy ancestors. Comparisons
//! therefore compile to a `CASE` over the ancestor list with one branch per
//! candidate kind, tested in [`KIND_DISPATCH`] order. When an ancestor set
//! matches several markers the earliest branch wins.

use serde::Serialize;

use crate::ast::Literal;

/// Value kinds that a comparison can dispatch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueKind {
    Number,
    Ref,
    Bool,
    Str,
    Temporal,
}

/// One row of the dispatch table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindBranch {
    pub kind: ValueKind,
    /// Ancestor tag names that select this branch (any one suffices)
    pub markers: &'static [&'static str],
    /// `entity_tag` column holding values of this kind
    pub column: &'static str,
}

/// Branch order of every emitted `CASE`. Number precedes ref.
pub const KIND_DISPATCH: [KindBranch; 5] = [
    KindBranch {
        kind: ValueKind::Number,
        markers: &["number"],
        column: "value_n",
    },
    KindBranch {
        kind: ValueKind::Ref,
        markers: &["ref"],
        column: "value_ref",
    },
    KindBranch {
        kind: ValueKind::Bool,
        markers: &["bool"],
        column: "value_b",
    },
    KindBranch {
        kind: ValueKind::Str,
        markers: &["str"],
        column: "value_s",
    },
    KindBranch {
        kind: ValueKind::Temporal,
        markers: &["date", "dateTime", "time"],
        column: "value_ts",
    },
];

impl ValueKind {
    pub fn branch(self) -> &'static KindBranch {
        // KIND_DISPATCH holds exactly one branch per variant, in declaration order
        &KIND_DISPATCH[self as usize]
    }

    pub fn column(self) -> &'static str {
        self.branch().column
    }

    pub fn markers(self) -> &'static [&'static str] {
        self.branch().markers
    }
}

const NUMERIC: &[ValueKind] = &[ValueKind::Number, ValueKind::Ref];
const BOOL: &[ValueKind] = &[ValueKind::Bool];
const TEXT: &[ValueKind] = &[ValueKind::Str];
const TEMPORAL: &[ValueKind] = &[ValueKind::Temporal];

/// Candidate kinds for a scalar comparison, in dispatch order
pub fn kinds_for_literal(literal: &Literal) -> &'static [ValueKind] {
    match literal {
        Literal::Number(_) | Literal::Ref(_) => NUMERIC,
        Literal::Bool(_) => BOOL,
        Literal::Str(_) | Literal::Uri(_) => TEXT,
        Literal::Date(_) | Literal::Time(_) | Literal::DateTime(_) => TEMPORAL,
    }
}

/// Candidate kinds for an `IN` list. Lists are homogeneous, so the first
/// element decides.
pub fn kinds_for_list(values: &[Literal]) -> &'static [ValueKind] {
    match values.first() {
        Some(first) if first.is_numeric() => NUMERIC,
        _ => TEXT,
    }
}

/// Every value column of `entity_tag`, in table order
pub const VALUE_COLUMNS: [&str; 8] = [
    "value_n",
    "value_b",
    "value_s",
    "value_ts",
    "value_list",
    "value_dict",
    "value_ref",
    "value_enum",
];

//! Tag filter language compiler
//!
//! Compiles filters such as
//!
//! ```text
//! site and yearBuilt >= 1980
//! equipRef->siteRef->geoCity == "Berlin"
//! not equipRef or dis in ('AHU-1', 'AHU-2')
//! ```
//!
//! into a single PostgreSQL statement over a tagged-entity schema
//! (`entity`, `entity_tag`, `tag_def`, `tag_hierarchy`, ...), scoped by the
//! per-entity and per-tag access-control tables.
//!
//! A tag's storage column is not known statically: it follows from the
//! kind tags (`number`, `str`, `ref`, ...) among the tag's hierarchy
//! ancestors, so comparisons compile to a `CASE` that dispatches on the
//! ancestor list at query time (see [`kind`]).
//!
//! # Example
//!
//! ```
//! use tagql_filter::compile_filter;
//!
//! let sql = compile_filter("yearBuilt == 1986", 5, 2, &[], "core_dev").unwrap();
//! assert!(sql.starts_with("WITH RECURSIVE hier_query1"));
//! assert!(sql.contains("et1.value_n = 1986"));
//! ```
//!
//! Compilation performs no I/O; executing the statement is up to the caller.

pub mod assembler;
pub mod ast;
pub mod compiler;
pub mod error;
pub mod kind;
pub mod lexer;
pub(crate) mod listener;
mod name;
pub mod parser;
mod path;
pub mod sql;
pub mod token;
pub mod values;

pub use assembler::{
    compile_filter, CompiledQuery, FilterCompiler, FilterQuery, TagSelection, ValueColumns,
    DEFAULT_VALUE_COLUMNS,
};
pub use ast::{CmpOp, Expr, Literal, Path};
pub use compiler::{CompileOptions, DEFAULT_MAX_PATH_DEPTH};
pub use error::{Error, Result};
pub use kind::{ValueKind, KIND_DISPATCH};
pub use parser::parse;
pub use sql::KindSource;
pub use values::{
    values_sql, variable_values_sql, Aggregation, Bucketing, ValuesQuery, VALUES_ROW_LIMIT,
};

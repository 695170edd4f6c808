//! Tag filter service
//!
//! HTTP front end for the `tagql-filter` compiler:
//! - `POST /filter` compiles a filter expression, checks organization
//!   visibility and returns the matching entities (optionally with tag rows)
//! - `POST /values` and `POST /variable/values` read time-series and current
//!   tag values of the entities a filter matches
//! - Per-entity and per-tag access control is enforced inside the compiled SQL
//! - Layered configuration, structured logging, Prometheus metrics on
//!   `/metrics` and OpenTelemetry export

#![allow(
    clippy::too_many_arguments,      // Functions with many args are acceptable for domain operations
    clippy::large_enum_variant,      // Large enum variants acceptable; boxing may impact performance
)]

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod request_context;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;

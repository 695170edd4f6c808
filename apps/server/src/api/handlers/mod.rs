//! Request handlers for API endpoints

pub mod filter;
pub mod health;
pub mod metrics;
pub mod values;

pub use filter::filter_entities;
pub use health::health_check;
pub use metrics::metrics_handler;
pub use values::{values, variable_values};

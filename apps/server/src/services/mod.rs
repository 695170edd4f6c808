//! Business logic layer

pub mod filter;
pub mod values;

pub use filter::{FilterRequest, FilterService};
pub use values::{OperationRequest, ValuesRequest, ValuesService, VariableValuesRequest};

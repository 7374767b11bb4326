//! AST Module - pipeline documents
//!
//! Contains the parsed types of a pipeline document:
//! - `pipeline`: PipelineDocument, TaskDescriptor, FailurePolicy, RetrySpec
//! - `params`: typed parameters of the built-in task kinds
//! - `schema_validator`: embedded JSON Schema check for raw documents
//! - `explain`: plain-language description of a document
//!
//! These types represent the "what". For execution, see the `runtime` module.

mod explain;
pub mod params;
mod pipeline;
pub mod schema_validator;

pub use explain::explain;
pub use params::{parse_params, TaskParams};
pub use pipeline::{FailurePolicy, PipelineDocument, RetrySpec, TaskDescriptor};

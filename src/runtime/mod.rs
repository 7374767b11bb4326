//! Runtime Module - pipeline execution
//!
//! - `engine`: `Engine`, run inputs (`InitialContext`) and results (`RunReport`)
//! - `retry`: exponential backoff for the `retry` failure policy
//! - `schedule`: groups tasks into sequential and independent stages
//!
//! This module is the "how" of a run. For the document model, see `ast`.

mod engine;
mod retry;
mod schedule;

pub use engine::{Engine, InitialContext, RunReport, ValidationIssue};
pub use retry::RetryConfig;
pub use schedule::{plan_stages, Stage};

//! Middleware pipeline.
//!
//! # Responsibilities
//! - Resolve route stage names into a fixed chain at table build
//! - Wrap dispatch with request/response transformers
//! - Map every failure to a client-visible response in the outermost stage

pub mod access_log;
pub mod auth;
pub mod error_mapping;
pub mod forwarded;
pub mod header_rewrite;
pub mod pipeline;
pub mod rate_limit;

pub use pipeline::{Next, Pipeline, Stage, StageResult, Terminal};

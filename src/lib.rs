//! ProductLens analysis engine.
//!
//! Collects a product title and photos into a submission, dispatches it to
//! a domain-specific analyzer, scores the findings deterministically and
//! keeps a per-domain history of results.
//!
//! The `productlens` binary runs one analysis per invocation. History
//! rendering and domain-level scoring helpers are exposed for long-lived
//! front ends.

pub mod analysis;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod submission;

pub use error::{OrchestratorError, Result};
pub use orchestrator::OrchestratorState;

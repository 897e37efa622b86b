//! Analysis modules.
//!
//! Deterministic scoring and statistics over item findings.

pub mod aggregator;

pub use aggregator::*;

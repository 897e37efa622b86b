//! Analyzer modules.
//!
//! Backends produce raw payloads; the dispatcher drives one request
//! through its lifecycle and normalizes the result.

pub mod backend;
pub mod catalog;
pub mod dispatch;
#[cfg(test)]
pub(crate) mod testing;

pub use backend::{backend_from_config, AnalyzerBackend, HttpBackend, RawAnalysis, RawFinding, SimulatedBackend};
pub use dispatch::{normalize, CancelToken, DispatchOptions, DispatchOutcome, DispatchState, Dispatcher};

//! Scripted backends for unit tests.

use super::backend::{AnalyzerBackend, RawAnalysis, RawFinding};
use crate::models::AnalysisRequest;
use crate::registry::Domain;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, Semaphore};

pub fn raw_finding(name: &str, status: &str) -> RawFinding {
    RawFinding {
        name: name.to_string(),
        status: status.to_string(),
        ..RawFinding::default()
    }
}

/// Payload with the given ingredient findings.
pub fn ingredients(findings: &[(&str, &str)]) -> RawAnalysis {
    RawAnalysis {
        ingredients: Some(
            findings
                .iter()
                .map(|(name, status)| raw_finding(name, status))
                .collect(),
        ),
        ..RawAnalysis::default()
    }
}

/// Returns a fixed payload and counts calls.
pub struct StaticBackend {
    raw: RawAnalysis,
    calls: AtomicUsize,
}

impl StaticBackend {
    pub fn new(raw: RawAnalysis) -> Self {
        Self {
            raw,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalyzerBackend for StaticBackend {
    fn name(&self) -> &str {
        "static"
    }

    async fn analyze(&self, _domain: &Domain, _request: &AnalysisRequest) -> anyhow::Result<RawAnalysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.raw.clone())
    }
}

pub struct FailingBackend;

#[async_trait]
impl AnalyzerBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn analyze(&self, _domain: &Domain, _request: &AnalysisRequest) -> anyhow::Result<RawAnalysis> {
        Err(anyhow::anyhow!("service unavailable"))
    }
}

/// Never answers.
pub struct HangingBackend;

#[async_trait]
impl AnalyzerBackend for HangingBackend {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn analyze(&self, _domain: &Domain, _request: &AnalysisRequest) -> anyhow::Result<RawAnalysis> {
        std::future::pending().await
    }
}

/// Signals when a call starts, then waits for a permit before answering.
pub struct GatedBackend {
    pub started: Notify,
    permits: Semaphore,
    raw: RawAnalysis,
}

impl GatedBackend {
    pub fn new(raw: RawAnalysis) -> Self {
        Self {
            started: Notify::new(),
            permits: Semaphore::new(0),
            raw,
        }
    }

    /// Let one pending call finish.
    pub fn release(&self) {
        self.permits.add_permits(1);
    }
}

#[async_trait]
impl AnalyzerBackend for GatedBackend {
    fn name(&self) -> &str {
        "gated"
    }

    async fn analyze(&self, _domain: &Domain, _request: &AnalysisRequest) -> anyhow::Result<RawAnalysis> {
        self.started.notify_one();
        self.permits.acquire().await?.forget();
        Ok(self.raw.clone())
    }
}

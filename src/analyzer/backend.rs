//! Analyzer backends.
//!
//! A backend receives one immutable `AnalysisRequest` and returns the raw,
//! domain-specific payload. Field names differ per domain (ingredients vs.
//! characteristics, safety vs. sustainability score); normalizing them is
//! the dispatcher's job, not the backend's.

use super::catalog;
use crate::config::{BackendConfig, BackendKind};
use crate::models::{AnalysisRequest, EnvironmentalImpact, PlasticType};
use crate::registry::Domain;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// One finding as reported by a backend, before status resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFinding {
    pub name: String,
    /// Domain-specific status word ("high_risk", "avoid", "good", ...).
    pub status: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub regulatory_status: BTreeMap<String, String>,
}

/// Raw backend payload in the wire shape of the analyzer service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnalysis {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    /// Reported by ingredient-schema domains.
    #[serde(default)]
    pub ingredients: Option<Vec<RawFinding>>,
    /// Reported by characteristic-schema domains.
    #[serde(default)]
    pub characteristics: Option<Vec<RawFinding>>,
    #[serde(default)]
    pub overall_safety_score: Option<i64>,
    #[serde(default)]
    pub overall_sustainability_score: Option<i64>,
    #[serde(default)]
    pub methodology: Option<String>,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub plastic_type: Option<PlasticType>,
    #[serde(default)]
    pub environmental_impact: Option<EnvironmentalImpact>,
    #[serde(default)]
    pub regional_analysis: BTreeMap<String, String>,
}

/// A pluggable, asynchronous analyzer.
#[async_trait]
pub trait AnalyzerBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Analyze one request for the given domain.
    async fn analyze(&self, domain: &Domain, request: &AnalysisRequest) -> Result<RawAnalysis>;
}

/// In-process backend that serves the literal catalog after a fixed delay.
pub struct SimulatedBackend {
    latency: Duration,
}

impl SimulatedBackend {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

#[async_trait]
impl AnalyzerBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn analyze(&self, domain: &Domain, request: &AnalysisRequest) -> Result<RawAnalysis> {
        debug!(
            "Simulating {} analysis of '{}' ({} images)",
            domain.id,
            request.title,
            request.images.len()
        );

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut raw = catalog::sample_for(&domain.id).unwrap_or_default();
        raw.product_name = Some(request.title.clone());
        Ok(raw)
    }
}

/// Body posted to the remote analyzer.
#[derive(Debug, Serialize)]
struct AnalyzeRequestBody<'a> {
    domain: &'a str,
    request: &'a AnalysisRequest,
}

/// Backend that forwards requests to a remote analyzer service.
pub struct HttpBackend {
    base_url: String,
    timeout_seconds: u64,
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a client for the analyzer at `base_url`.
    ///
    /// A `timeout_seconds` of 0 leaves the client without a deadline.
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(timeout_seconds));
        }
        let http_client = builder
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_seconds,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/analyze", self.base_url)
    }
}

#[async_trait]
impl AnalyzerBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn analyze(&self, domain: &Domain, request: &AnalysisRequest) -> Result<RawAnalysis> {
        let url = self.endpoint();
        debug!("POST {} (request {})", url, request.id);

        let body = AnalyzeRequestBody {
            domain: &domain.id,
            request,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow::anyhow!("Request timed out after {}s", self.timeout_seconds)
                } else if e.is_connect() {
                    anyhow::anyhow!("Cannot connect to analyzer at {}", self.base_url)
                } else {
                    anyhow::anyhow!("Failed to send request: {}", e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Analyzer API error {}: {}", status, body));
        }

        let raw: RawAnalysis = response
            .json()
            .await
            .context("Failed to parse analyzer response")?;

        Ok(raw)
    }
}

/// Build the backend selected in configuration.
pub fn backend_from_config(config: &BackendConfig) -> Result<Arc<dyn AnalyzerBackend>> {
    match config.kind {
        BackendKind::Simulated => {
            info!(
                "Using simulated analyzer ({}ms latency)",
                config.simulated_latency_ms
            );
            Ok(Arc::new(SimulatedBackend::new(Duration::from_millis(
                config.simulated_latency_ms,
            ))))
        }
        BackendKind::Http => {
            info!("Using HTTP analyzer at {}", config.url);
            Ok(Arc::new(HttpBackend::new(&config.url, config.timeout_seconds)?))
        }
    }
}

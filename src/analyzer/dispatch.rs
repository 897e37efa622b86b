//! Analyzer dispatch.
//!
//! Routes a ready submission to the analyzer backend and turns the raw
//! per-domain payload into a common `AnalysisResult`.
//!
//! Each dispatcher allows one request in flight at a time:
//! `Idle -> Dispatched -> (Completed | Failed) -> Idle`. A second dispatch
//! while one is pending fails with `RequestInProgress` instead of queueing,
//! so a double click can never produce two history entries.

use super::backend::{AnalyzerBackend, RawAnalysis};
use crate::analysis::{check_reported_score, clamp_score, compute_score};
use crate::error::{OrchestratorError, Result};
use crate::models::{AnalysisRequest, AnalysisResult, ItemFinding, ProductSubmission};
use crate::registry::{Domain, DomainRegistry, SchemaVariant};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Cooperative cancellation signal shared between a caller and a dispatch.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                // Sender gone without cancelling; never resolves.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle state of the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DispatchState {
    Idle,
    Dispatched { request_id: Uuid, domain: String },
}

/// How the most recent request ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Completed { request_id: Uuid },
    Failed { request_id: Uuid, cause: String },
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Overrides the dispatcher's default timeout.
    pub timeout: Option<Duration>,
    /// Abandons the request when cancelled.
    pub cancel: Option<CancelToken>,
}

#[derive(Debug)]
struct Lifecycle {
    state: DispatchState,
    last_outcome: Option<DispatchOutcome>,
}

/// Dispatches submissions to an analyzer backend.
pub struct Dispatcher {
    registry: Arc<DomainRegistry>,
    backend: Arc<dyn AnalyzerBackend>,
    default_timeout: Option<Duration>,
    lifecycle: Mutex<Lifecycle>,
}

/// Marks a request as in flight; returns the dispatcher to `Idle` when dropped.
struct InFlight<'a> {
    dispatcher: &'a Dispatcher,
    request_id: Uuid,
    outcome: Option<DispatchOutcome>,
}

impl InFlight<'_> {
    fn complete(&mut self) {
        self.outcome = Some(DispatchOutcome::Completed {
            request_id: self.request_id,
        });
    }

    fn fail(&mut self, cause: &str) {
        self.outcome = Some(DispatchOutcome::Failed {
            request_id: self.request_id,
            cause: cause.to_string(),
        });
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or(DispatchOutcome::Failed {
            request_id: self.request_id,
            cause: "request abandoned".to_string(),
        });
        let mut lifecycle = self.dispatcher.lock();
        lifecycle.state = DispatchState::Idle;
        lifecycle.last_outcome = Some(outcome);
    }
}

impl Dispatcher {
    /// Create a dispatcher. `default_timeout` bounds every backend call unless overridden.
    pub fn new(
        registry: Arc<DomainRegistry>,
        backend: Arc<dyn AnalyzerBackend>,
        default_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            backend,
            default_timeout,
            lifecycle: Mutex::new(Lifecycle {
                state: DispatchState::Idle,
                last_outcome: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DispatchState {
        self.lock().state.clone()
    }

    pub fn is_idle(&self) -> bool {
        self.lock().state == DispatchState::Idle
    }

    /// Outcome of the most recently finished request.
    pub fn last_outcome(&self) -> Option<DispatchOutcome> {
        self.lock().last_outcome.clone()
    }

    /// Dispatch with the default timeout and no cancellation.
    pub async fn dispatch(&self, submission: &ProductSubmission) -> Result<AnalysisResult> {
        self.dispatch_with(submission, &DispatchOptions::default())
            .await
    }

    /// Dispatch a submission and wait for its normalized result.
    pub async fn dispatch_with(
        &self,
        submission: &ProductSubmission,
        options: &DispatchOptions,
    ) -> Result<AnalysisResult> {
        if let Some(reason) = submission.readiness_problem() {
            return Err(OrchestratorError::NotReady { reason });
        }

        let domain = self.registry.get_domain(&submission.domain)?;
        let request = AnalysisRequest::from_submission(submission);
        let mut in_flight = self.begin(&request)?;

        info!(
            "Dispatching request {} to {} backend (domain: {}, images: {})",
            request.id,
            self.backend.name(),
            domain.id,
            request.images.len()
        );

        let result = match self.invoke(domain, &request, options).await {
            Ok(raw) => normalize(domain, &request, raw),
            Err(e) => Err(e),
        };

        match &result {
            Ok(analysis) => {
                info!(
                    "Request {} completed: {} findings, score {}",
                    request.id,
                    analysis.findings.len(),
                    analysis.score
                );
                in_flight.complete();
            }
            Err(e) => {
                warn!("Request {} failed: {}", request.id, e);
                in_flight.fail(&e.to_string());
            }
        }

        result
    }

    /// Transition `Idle -> Dispatched`.
    fn begin(&self, request: &AnalysisRequest) -> Result<InFlight<'_>> {
        let mut lifecycle = self.lock();
        if let DispatchState::Dispatched { request_id, .. } = &lifecycle.state {
            debug!(
                "Rejecting dispatch while request {} is in flight",
                request_id
            );
            return Err(OrchestratorError::RequestInProgress);
        }

        lifecycle.state = DispatchState::Dispatched {
            request_id: request.id,
            domain: request.domain.clone(),
        };

        Ok(InFlight {
            dispatcher: self,
            request_id: request.id,
            outcome: None,
        })
    }

    /// Call the backend, racing it against the timeout and cancellation.
    async fn invoke(
        &self,
        domain: &Domain,
        request: &AnalysisRequest,
        options: &DispatchOptions,
    ) -> Result<RawAnalysis> {
        let limit = options.timeout.or(self.default_timeout);

        let call = async {
            let analysis = self.backend.analyze(domain, request);
            match limit {
                Some(limit) => match tokio::time::timeout(limit, analysis).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow::anyhow!(
                        "Backend did not respond within {:.1}s",
                        limit.as_secs_f64()
                    )),
                },
                None => analysis.await,
            }
        };

        let outcome = match &options.cancel {
            Some(token) => {
                if token.is_cancelled() {
                    return Err(OrchestratorError::Cancelled);
                }
                tokio::select! {
                    result = call => result,
                    _ = token.cancelled() => return Err(OrchestratorError::Cancelled),
                }
            }
            None => call.await,
        };

        outcome.map_err(|e| OrchestratorError::AnalysisBackend(format!("{:#}", e)))
    }
}

/// Map a raw backend payload onto the common result shape.
///
/// The aggregate score is always recomputed from the findings; the
/// backend's own number is only checked and logged.
pub fn normalize(
    domain: &Domain,
    request: &AnalysisRequest,
    raw: RawAnalysis,
) -> Result<AnalysisResult> {
    let (expected, fallback, reported) = match domain.schema {
        SchemaVariant::Ingredients => (
            raw.ingredients,
            raw.characteristics,
            raw.overall_safety_score
                .or(raw.overall_sustainability_score),
        ),
        SchemaVariant::Characteristics => (
            raw.characteristics,
            raw.ingredients,
            raw.overall_sustainability_score
                .or(raw.overall_safety_score),
        ),
    };

    let raw_findings = expected.or(fallback).unwrap_or_default();
    let mut findings = Vec::with_capacity(raw_findings.len());
    let mut seen = HashSet::new();

    for rf in raw_findings {
        let status = domain.resolve_status(&rf.status).ok_or_else(|| {
            OrchestratorError::AnalysisBackend(format!(
                "unrecognized status '{}' for '{}' in domain {}",
                rf.status, rf.name, domain.id
            ))
        })?;

        if !seen.insert((rf.name.clone(), status)) {
            return Err(OrchestratorError::AnalysisBackend(format!(
                "duplicate finding '{}' with status {}",
                rf.name, status
            )));
        }

        findings.push(ItemFinding {
            name: rf.name,
            status,
            description: rf.description,
            tags: rf.tags,
            concerns: rf.concerns,
            regulatory_status: rf.regulatory_status,
        });
    }

    let score = compute_score(&findings, &domain.scoring);

    if let Some(reported) = reported {
        match check_reported_score(reported) {
            Ok(value) if value != score => debug!(
                "Backend reported score {} for request {}, recomputed {}",
                value, request.id, score
            ),
            Ok(_) => {}
            Err(e) => warn!(
                "{} for request {} (clamped to {}), using recomputed score {}",
                e,
                request.id,
                clamp_score(reported),
                score
            ),
        }
    }

    let product_name = raw
        .product_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| request.title.clone());
    let methodology = raw
        .methodology
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| domain.methodology.clone());
    let sources = raw
        .sources
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| domain.sources.clone());

    Ok(AnalysisResult {
        product_name,
        domain: domain.id.clone(),
        product_type: raw.product_type,
        findings,
        score,
        methodology,
        sources,
        recommendations: raw.recommendations,
        plastic_type: raw.plastic_type,
        environmental_impact: raw.environmental_impact,
        regional_notes: raw.regional_analysis,
        completed_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::backend::SimulatedBackend;
    use crate::analyzer::testing::{
        ingredients, raw_finding, FailingBackend, GatedBackend, HangingBackend, StaticBackend,
    };
    use crate::models::{ImageRef, RiskStatus};
    use tokio_test::{assert_err, assert_ok};

    fn ready(domain: &str, title: &str) -> ProductSubmission {
        let mut submission = ProductSubmission::empty(domain);
        submission.title = title.to_string();
        submission.images.push(ImageRef::from("img1"));
        submission
    }

    fn dispatcher(backend: Arc<dyn AnalyzerBackend>) -> Dispatcher {
        Dispatcher::new(Arc::new(DomainRegistry::builtin()), backend, None)
    }

    fn normalize_in(domain_id: &str, raw: RawAnalysis) -> Result<AnalysisResult> {
        let registry = DomainRegistry::builtin();
        let domain = registry.get_domain(domain_id)?;
        let request = AnalysisRequest::from_submission(&ready(domain_id, "Product"));
        normalize(domain, &request, raw)
    }

    #[tokio::test]
    async fn test_end_to_end_chemical_scores_55() {
        let mut raw = ingredients(&[("Oxybenzone", "high_risk"), ("Octinoxate", "moderate_risk")]);
        raw.overall_safety_score = Some(91);
        let dispatcher = dispatcher(Arc::new(StaticBackend::new(raw)));

        let result = dispatcher
            .dispatch(&ready("chemical", "Sunscreen A"))
            .await
            .unwrap();

        assert_eq!(result.score, 55);
        assert_eq!(result.product_name, "Sunscreen A");
        assert_eq!(result.domain, "chemical");
        assert_eq!(result.findings[0].status, RiskStatus::HighRisk);
        assert_eq!(result.findings[1].status, RiskStatus::Caution);
        assert!(!result.sources.is_empty());
        assert!(dispatcher.is_idle());
        assert!(matches!(
            dispatcher.last_outcome(),
            Some(DispatchOutcome::Completed { .. })
        ));
    }

    #[tokio::test]
    async fn test_not_ready_never_calls_backend() {
        let backend = Arc::new(StaticBackend::new(RawAnalysis::default()));
        let dispatcher = dispatcher(backend.clone());

        let mut no_title = ready("chemical", "");
        no_title.title = "  ".to_string();
        let mut no_images = ready("chemical", "Lotion");
        no_images.images.clear();

        for submission in [no_title, no_images, ProductSubmission::empty("chemical")] {
            let err = dispatcher.dispatch(&submission).await.unwrap_err();
            assert!(matches!(err, OrchestratorError::NotReady { .. }));
        }

        assert_eq!(backend.calls(), 0);
        assert!(dispatcher.is_idle());
        assert_eq!(dispatcher.last_outcome(), None);
    }

    #[tokio::test]
    async fn test_unknown_domain() {
        let dispatcher = dispatcher(Arc::new(StaticBackend::new(RawAnalysis::default())));
        let err = dispatcher.dispatch(&ready("cars", "Tire")).await.unwrap_err();
        assert_eq!(err, OrchestratorError::DomainNotFound("cars".to_string()));
    }

    #[tokio::test]
    async fn test_second_dispatch_while_in_flight_is_rejected() {
        let backend = Arc::new(GatedBackend::new(ingredients(&[("Oats", "safe")])));
        let dispatcher = Arc::new(dispatcher(backend.clone()));

        let first = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.dispatch(&ready("food", "Cereal")).await })
        };

        backend.started.notified().await;
        assert!(matches!(
            dispatcher.state(),
            DispatchState::Dispatched { ref domain, .. } if domain == "food"
        ));

        let second = dispatcher.dispatch(&ready("food", "Cereal")).await;
        assert_eq!(second.unwrap_err(), OrchestratorError::RequestInProgress);

        backend.release();
        assert_ok!(first.await.unwrap());
        assert!(dispatcher.is_idle());

        backend.release();
        assert_ok!(dispatcher.dispatch(&ready("food", "Cereal")).await);
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces_cause_and_resets() {
        let dispatcher = dispatcher(Arc::new(FailingBackend));

        let err = dispatcher
            .dispatch(&ready("pregnancy", "Serum"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            OrchestratorError::AnalysisBackend("service unavailable".to_string())
        );
        assert!(dispatcher.is_idle());
        assert!(matches!(
            dispatcher.last_outcome(),
            Some(DispatchOutcome::Failed { ref cause, .. }) if cause.contains("service unavailable")
        ));
    }

    #[tokio::test]
    async fn test_timeout_fails_request() {
        let dispatcher = dispatcher(Arc::new(HangingBackend));
        let options = DispatchOptions {
            timeout: Some(Duration::from_millis(20)),
            cancel: None,
        };

        let err = dispatcher
            .dispatch_with(&ready("plastic", "Bottle"), &options)
            .await
            .unwrap_err();
        match err {
            OrchestratorError::AnalysisBackend(cause) => assert!(cause.contains("did not respond")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(dispatcher.is_idle());
    }

    #[tokio::test]
    async fn test_default_timeout_applies() {
        let dispatcher = Dispatcher::new(
            Arc::new(DomainRegistry::builtin()),
            Arc::new(HangingBackend),
            Some(Duration::from_millis(20)),
        );
        let result = dispatcher.dispatch(&ready("food", "Soup")).await;
        assert!(matches!(result, Err(OrchestratorError::AnalysisBackend(_))));
    }

    #[tokio::test]
    async fn test_cancellation_abandons_request() {
        let dispatcher = Arc::new(dispatcher(Arc::new(HangingBackend)));
        let token = CancelToken::new();
        let options = DispatchOptions {
            timeout: None,
            cancel: Some(token.clone()),
        };

        let pending = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .dispatch_with(&ready("plastic", "Bottle"), &options)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        let result = pending.await.unwrap();
        assert_eq!(result.unwrap_err(), OrchestratorError::Cancelled);
        assert!(dispatcher.is_idle());
    }

    #[tokio::test]
    async fn test_already_cancelled_token() {
        let dispatcher = dispatcher(Arc::new(SimulatedBackend::new(Duration::ZERO)));
        let token = CancelToken::new();
        token.cancel();

        let options = DispatchOptions {
            timeout: None,
            cancel: Some(token),
        };
        assert_err!(
            dispatcher
                .dispatch_with(&ready("food", "Soup"), &options)
                .await
        );
        assert!(dispatcher.is_idle());
    }

    #[tokio::test]
    async fn test_dropped_dispatch_returns_to_idle() {
        let dispatcher = dispatcher(Arc::new(HangingBackend));
        let submission = ready("food", "Soup");

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            dispatcher.dispatch(&submission),
        )
        .await;

        assert!(abandoned.is_err());
        assert!(dispatcher.is_idle());
        assert!(matches!(
            dispatcher.last_outcome(),
            Some(DispatchOutcome::Failed { ref cause, .. }) if cause == "request abandoned"
        ));
    }

    #[test]
    fn test_normalize_plastic_sustainability_score() {
        let raw = crate::analyzer::catalog::sample_for("plastic").unwrap();
        let result = normalize_in("plastic", raw).unwrap();

        // good, medium, low, caution -> 0 + 10 + 0 + 10
        assert_eq!(result.score, 80);
        assert_eq!(result.product_name, "Product");
        assert_eq!(result.findings.len(), 4);
        assert_eq!(result.plastic_type.as_ref().map(|p| p.recycling_code), Some(1));
        assert_eq!(result.regional_notes.len(), 3);
        assert!(result.methodology.contains("characteristic"));
    }

    #[test]
    fn test_normalize_accepts_other_schema_list() {
        let raw = ingredients(&[("Durability", "poor")]);
        assert_eq!(normalize_in("plastic", raw).unwrap().score, 80);
    }

    #[test]
    fn test_normalize_empty_findings_use_neutral_default() {
        let raw = RawAnalysis {
            overall_safety_score: Some(100),
            ..RawAnalysis::default()
        };
        assert_eq!(normalize_in("food", raw).unwrap().score, 50);
    }

    #[test]
    fn test_normalize_out_of_range_reported_score() {
        let mut raw = ingredients(&[("Glycerin", "safe")]);
        raw.overall_safety_score = Some(250);
        assert_eq!(normalize_in("chemical", raw).unwrap().score, 100);
    }

    #[test]
    fn test_normalize_keeps_backend_text() {
        let mut raw = ingredients(&[("Glycerin", "safe")]);
        raw.product_name = Some("Brand Lotion".to_string());
        raw.methodology = Some("Lab panel".to_string());
        raw.sources = Some(vec!["In-house".to_string()]);

        let result = normalize_in("chemical", raw).unwrap();
        assert_eq!(result.product_name, "Brand Lotion");
        assert_eq!(result.methodology, "Lab panel");
        assert_eq!(result.sources, vec!["In-house".to_string()]);
    }

    #[test]
    fn test_normalize_rejects_unknown_status() {
        let raw = ingredients(&[("Mystery", "sparkly")]);
        let err = normalize_in("chemical", raw).unwrap_err();
        assert!(matches!(err, OrchestratorError::AnalysisBackend(ref c) if c.contains("sparkly")));
    }

    #[test]
    fn test_normalize_rejects_duplicate_findings() {
        let raw = ingredients(&[("Red 40", "avoid"), ("Red 40", "high_risk")]);
        let err = normalize_in("food", raw).unwrap_err();
        assert!(matches!(err, OrchestratorError::AnalysisBackend(ref c) if c.contains("duplicate")));

        let raw = RawAnalysis {
            ingredients: Some(vec![raw_finding("Red 40", "avoid"), raw_finding("Red 40", "limit")]),
            ..RawAnalysis::default()
        };
        assert_ok!(normalize_in("food", raw));
    }

    #[tokio::test]
    async fn test_cancel_token_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        let waiter = tokio::spawn(async move { clone.cancelled().await });
        token.cancel();
        waiter.await.unwrap();
        assert!(token.is_cancelled());
    }
}

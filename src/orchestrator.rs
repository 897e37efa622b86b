//! Session orchestration.
//!
//! `OrchestratorState` is the one value a front end holds: the domain
//! registry, the active domain and its draft submission, the dispatcher and
//! the history store. All mutation goes through its methods.

use crate::analyzer::{backend_from_config, AnalyzerBackend, CancelToken, DispatchOptions, DispatchOutcome, DispatchState, Dispatcher};
use crate::config::{Config, HistoryConfig};
use crate::error::{OrchestratorError, Result};
use crate::history::HistoryStore;
use crate::models::{AnalysisRecord, ImageRef, ProductSubmission};
use crate::registry::{Domain, DomainRegistry};
use crate::submission::SubmissionBuilder;
use anyhow::Context;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

/// Draft state of the active domain.
struct Session {
    builder: SubmissionBuilder,
    /// Bumped whenever in-flight work must no longer be recorded.
    generation: u64,
    cancel: CancelToken,
    /// Set while an `analyze` call owns the draft.
    analyzing: bool,
}

impl Session {
    /// Abandon in-flight work and start a new generation.
    fn supersede(&mut self) {
        self.cancel.cancel();
        self.cancel = CancelToken::new();
        self.generation += 1;
    }
}

/// Marks the session busy for the lifetime of one `analyze` call.
struct AnalyzeClaim<'a> {
    session: &'a Mutex<Session>,
}

impl Drop for AnalyzeClaim<'_> {
    fn drop(&mut self) {
        let mut session = self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        session.analyzing = false;
    }
}

/// Read-only view of the session for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub active_domain: String,
    pub submission: ProductSubmission,
    pub ready: bool,
    pub dispatch: DispatchState,
    pub history_len: usize,
}

pub struct OrchestratorState {
    registry: Arc<DomainRegistry>,
    dispatcher: Dispatcher,
    history: HistoryStore,
    session: Mutex<Session>,
}

impl OrchestratorState {
    /// Assemble an orchestrator with `initial_domain` active.
    pub fn new(
        registry: Arc<DomainRegistry>,
        backend: Arc<dyn AnalyzerBackend>,
        timeout: Option<Duration>,
        history: &HistoryConfig,
        initial_domain: &str,
    ) -> Result<Self> {
        registry.get_domain(initial_domain)?;

        Ok(Self {
            dispatcher: Dispatcher::new(registry.clone(), backend, timeout),
            history: HistoryStore::new(registry.clone(), history),
            registry,
            session: Mutex::new(Session {
                builder: SubmissionBuilder::new(initial_domain),
                generation: 0,
                cancel: CancelToken::new(),
                analyzing: false,
            }),
        })
    }

    /// Build registry, backend and history from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let registry = Arc::new(
            DomainRegistry::from_configs(&config.domains).context("Invalid domain table")?,
        );
        let backend = backend_from_config(&config.backend)?;
        let timeout = (config.backend.timeout_seconds > 0)
            .then(|| Duration::from_secs(config.backend.timeout_seconds));

        let state = Self::new(
            registry,
            backend,
            timeout,
            &config.history,
            &config.general.default_domain,
        )
        .context("Invalid default domain")?;
        Ok(state)
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    pub fn list_domains(&self) -> &[Domain] {
        self.registry.list_domains()
    }

    pub fn active_domain(&self) -> String {
        self.lock().builder.domain().to_string()
    }

    /// Switch the active domain.
    ///
    /// Switching to a different domain clears the draft and abandons any
    /// in-flight analysis so its result is never recorded.
    pub fn select_domain(&self, domain_id: &str) -> Result<()> {
        self.registry.get_domain(domain_id)?;

        let mut session = self.lock();
        if session.builder.domain() != domain_id {
            info!("Switching domain {} -> {}", session.builder.domain(), domain_id);
            session.supersede();
            session.builder.reset_for_domain(domain_id);
        }
        Ok(())
    }

    pub fn set_title(&self, text: &str) {
        self.lock().builder.set_title(text);
    }

    pub fn add_images<I>(&self, refs: I)
    where
        I: IntoIterator<Item = ImageRef>,
    {
        self.lock().builder.add_images(refs);
    }

    pub fn remove_image_at(&self, index: usize) -> Result<ImageRef> {
        self.lock().builder.remove_image_at(index)
    }

    /// Copy of the current draft.
    pub fn submission(&self) -> ProductSubmission {
        self.lock().builder.submission().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.lock().builder.is_ready()
    }

    pub fn dispatch_state(&self) -> DispatchState {
        self.dispatcher.state()
    }

    pub fn last_outcome(&self) -> Option<DispatchOutcome> {
        self.dispatcher.last_outcome()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// History of one domain in the configured order.
    pub fn history_for(&self, domain_id: &str) -> Result<Vec<AnalysisRecord>> {
        self.history.list(domain_id)
    }

    pub fn view(&self) -> SessionView {
        let session = self.lock();
        let submission = session.builder.submission().clone();
        SessionView {
            history_len: self.history.len(&submission.domain),
            active_domain: submission.domain.clone(),
            ready: submission.is_ready(),
            dispatch: self.dispatcher.state(),
            submission,
        }
    }

    /// Abandon any in-flight analysis without touching the draft.
    pub fn cancel_pending(&self) {
        self.lock().supersede();
    }

    /// Analyze the current draft and record the result.
    ///
    /// On success the record is stored under the draft's domain and the
    /// draft is cleared. A result that arrives after the session moved on
    /// is discarded with `Cancelled`. A second call while one is still
    /// running, including its recording step, fails with `RequestInProgress`.
    pub async fn analyze(&self) -> Result<AnalysisRecord> {
        let (_claim, submission, generation, cancel) = {
            let mut session = self.lock();
            if session.analyzing {
                return Err(OrchestratorError::RequestInProgress);
            }
            session.analyzing = true;
            (
                AnalyzeClaim {
                    session: &self.session,
                },
                session.builder.submission().clone(),
                session.generation,
                session.cancel.clone(),
            )
        };

        let options = DispatchOptions {
            timeout: None,
            cancel: Some(cancel),
        };
        let result = self.dispatcher.dispatch_with(&submission, &options).await?;

        let mut session = self.lock();
        if session.generation != generation {
            warn!(
                "Discarding stale result for '{}' ({}); session moved on",
                submission.title, submission.domain
            );
            return Err(OrchestratorError::Cancelled);
        }

        let record = self.history.record(&submission.domain, result, &submission)?;
        session.builder.reset();

        info!(
            "Recorded '{}' in {} history with score {}",
            record.title,
            record.domain,
            record.score()
        );
        Ok(record)
    }
}

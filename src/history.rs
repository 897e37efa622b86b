//! Per-domain analysis history.
//!
//! Records are kept per domain in insertion order and evicted FIFO once a
//! domain exceeds its cap. Mutations take the write lock for their whole
//! duration, so readers see a sequence either before or after a change.

use crate::config::{HistoryConfig, HistoryOrder};
use crate::error::Result;
use crate::models::{AnalysisRecord, AnalysisResult, ProductSubmission};
use crate::registry::DomainRegistry;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

type Records = HashMap<String, VecDeque<AnalysisRecord>>;

/// In-memory store of finalized analyses, partitioned by domain.
pub struct HistoryStore {
    registry: Arc<DomainRegistry>,
    cap: Option<usize>,
    order: HistoryOrder,
    records: RwLock<Records>,
}

impl HistoryStore {
    pub fn new(registry: Arc<DomainRegistry>, config: &HistoryConfig) -> Self {
        Self {
            registry,
            cap: config.cap(),
            order: config.order,
            records: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Records> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Records> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Maximum records per domain, `None` when unbounded.
    pub fn cap(&self) -> Option<usize> {
        self.cap
    }

    /// Store a finished analysis under `domain_id`.
    pub fn record(
        &self,
        domain_id: &str,
        result: AnalysisResult,
        submission: &ProductSubmission,
    ) -> Result<AnalysisRecord> {
        self.registry.get_domain(domain_id)?;

        let record = AnalysisRecord {
            id: Uuid::new_v4(),
            domain: domain_id.to_string(),
            title: submission.title.clone(),
            thumbnail: submission.images.first().cloned(),
            image_count: submission.images.len(),
            recorded_at: Utc::now(),
            result,
        };

        let mut records = self.write();
        let entries = records.entry(domain_id.to_string()).or_default();
        entries.push_back(record.clone());

        if let Some(cap) = self.cap {
            while entries.len() > cap {
                if let Some(evicted) = entries.pop_front() {
                    debug!(
                        "Evicted record {} ('{}') from {} history (cap {})",
                        evicted.id, evicted.title, domain_id, cap
                    );
                }
            }
        }

        debug!(
            "Recorded {} in {} history ({} entries)",
            record.id,
            domain_id,
            entries.len()
        );

        Ok(record)
    }

    /// Snapshot of one domain's history in the configured order.
    pub fn list(&self, domain_id: &str) -> Result<Vec<AnalysisRecord>> {
        self.registry.get_domain(domain_id)?;

        let records = self.read();
        let Some(entries) = records.get(domain_id) else {
            return Ok(Vec::new());
        };

        Ok(match self.order {
            HistoryOrder::OldestFirst => entries.iter().cloned().collect(),
            HistoryOrder::NewestFirst => entries.iter().rev().cloned().collect(),
        })
    }

    /// Look up a single record by id.
    pub fn get(&self, domain_id: &str, id: Uuid) -> Result<Option<AnalysisRecord>> {
        self.registry.get_domain(domain_id)?;

        Ok(self
            .read()
            .get(domain_id)
            .and_then(|entries| entries.iter().find(|r| r.id == id).cloned()))
    }

    /// Empty one domain's history, leaving the others alone.
    pub fn clear(&self, domain_id: &str) -> Result<()> {
        self.registry.get_domain(domain_id)?;

        if let Some(removed) = self.write().remove(domain_id) {
            debug!("Cleared {} records from {} history", removed.len(), domain_id);
        }
        Ok(())
    }

    pub fn len(&self, domain_id: &str) -> usize {
        self.read().get(domain_id).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, domain_id: &str) -> bool {
        self.len(domain_id) == 0
    }

    pub fn total_records(&self) -> usize {
        self.read().values().map(VecDeque::len).sum()
    }

    /// Registered domains that currently hold at least one record, in registry order.
    pub fn domains_with_history(&self) -> Vec<String> {
        let records = self.read();
        self.registry
            .list_domains()
            .iter()
            .filter(|d| records.get(&d.id).is_some_and(|e| !e.is_empty()))
            .map(|d| d.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestratorError;
    use crate::models::ImageRef;

    fn store(cap: usize, order: HistoryOrder) -> HistoryStore {
        HistoryStore::new(
            Arc::new(DomainRegistry::builtin()),
            &HistoryConfig {
                max_per_domain: cap,
                order,
            },
        )
    }

    fn result(domain: &str, name: &str, score: u8) -> AnalysisResult {
        AnalysisResult {
            product_name: name.to_string(),
            domain: domain.to_string(),
            product_type: None,
            findings: Vec::new(),
            score,
            methodology: String::new(),
            sources: Vec::new(),
            recommendations: Vec::new(),
            plastic_type: None,
            environmental_impact: None,
            regional_notes: Default::default(),
            completed_at: Utc::now(),
        }
    }

    fn submission(domain: &str, title: &str, images: &[&str]) -> ProductSubmission {
        ProductSubmission {
            domain: domain.to_string(),
            title: title.to_string(),
            images: images.iter().map(|i| ImageRef::from(*i)).collect(),
        }
    }

    fn titles(records: &[AnalysisRecord]) -> Vec<&str> {
        records.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn test_record_builds_metadata() {
        let store = store(10, HistoryOrder::NewestFirst);
        let record = store
            .record(
                "food",
                result("food", "Cereal", 70),
                &submission("food", "Cereal", &["front.png", "back.png"]),
            )
            .unwrap();

        assert_eq!(record.domain, "food");
        assert_eq!(record.thumbnail, Some(ImageRef::from("front.png")));
        assert_eq!(record.image_count, 2);
        assert_eq!(record.score(), 70);
        assert_eq!(store.get("food", record.id).unwrap(), Some(record));
        assert_eq!(store.get("food", Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn test_fifo_eviction() {
        let cap = 3;
        let store = store(cap, HistoryOrder::OldestFirst);

        for i in 0..=cap {
            let title = format!("P{}", i);
            store
                .record("chemical", result("chemical", &title, 50), &submission("chemical", &title, &["x"]))
                .unwrap();
        }

        let records = store.list("chemical").unwrap();
        assert_eq!(titles(&records), vec!["P1", "P2", "P3"]);
    }

    #[test]
    fn test_newest_first_order() {
        let store = store(0, HistoryOrder::NewestFirst);
        for title in ["A", "B", "C"] {
            store
                .record("plastic", result("plastic", title, 80), &submission("plastic", title, &["x"]))
                .unwrap();
        }

        assert_eq!(store.cap(), None);
        assert_eq!(titles(&store.list("plastic").unwrap()), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_unknown_domain() {
        let store = store(5, HistoryOrder::NewestFirst);
        let not_found = OrchestratorError::DomainNotFound("cars".to_string());

        let err = store
            .record("cars", result("cars", "Tire", 10), &submission("cars", "Tire", &["x"]))
            .unwrap_err();
        assert_eq!(err, not_found);
        assert_eq!(store.list("cars").unwrap_err(), not_found);
        assert_eq!(store.clear("cars").unwrap_err(), not_found);
        assert_eq!(store.total_records(), 0);
    }

    #[test]
    fn test_clear_is_per_domain() {
        let store = store(5, HistoryOrder::NewestFirst);
        store
            .record("food", result("food", "Soup", 60), &submission("food", "Soup", &["x"]))
            .unwrap();
        store
            .record("pregnancy", result("pregnancy", "Serum", 40), &submission("pregnancy", "Serum", &["x"]))
            .unwrap();
        assert_eq!(store.domains_with_history(), vec!["food", "pregnancy"]);

        store.clear("food").unwrap();
        assert!(store.is_empty("food"));
        assert!(store.list("food").unwrap().is_empty());
        assert_eq!(store.len("pregnancy"), 1);
        assert_eq!(store.total_records(), 1);
        assert_eq!(store.domains_with_history(), vec!["pregnancy"]);
    }

    #[test]
    fn test_list_is_a_snapshot() {
        let store = store(5, HistoryOrder::OldestFirst);
        store
            .record("food", result("food", "Soup", 60), &submission("food", "Soup", &["x"]))
            .unwrap();

        let before = store.list("food").unwrap();
        store
            .record("food", result("food", "Bread", 75), &submission("food", "Bread", &["x"]))
            .unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(store.list("food").unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_readers_see_whole_records() {
        let store = Arc::new(store(0, HistoryOrder::OldestFirst));

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    let title = format!("P{}", i);
                    store
                        .record("food", result("food", &title, 50), &submission("food", &title, &["x"]))
                        .unwrap();
                }
            })
        };

        let mut last_len = 0;
        while !writer.is_finished() {
            let snapshot = store.list("food").unwrap();
            assert!(snapshot.len() >= last_len);
            for (i, record) in snapshot.iter().enumerate() {
                assert_eq!(record.title, format!("P{}", i));
            }
            last_len = snapshot.len();
        }
        writer.join().unwrap();
        assert_eq!(store.len("food"), 200);
    }
}

//! Data models for the analysis engine.
//!
//! This module contains the core data structures shared by every
//! component: findings, submissions, requests, results and stored records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Risk status of a single finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    /// No known concern.
    Safe,
    /// Moderate risk; use with care.
    #[serde(alias = "moderate_risk")]
    Caution,
    /// High risk; avoid.
    HighRisk,
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskStatus::Safe => write!(f, "Safe"),
            RiskStatus::Caution => write!(f, "Caution"),
            RiskStatus::HighRisk => write!(f, "High Risk"),
        }
    }
}

impl RiskStatus {
    /// Parse one of the canonical status words shared by all domains.
    pub fn parse_canonical(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "safe" => Some(RiskStatus::Safe),
            "caution" | "moderate_risk" | "moderate" => Some(RiskStatus::Caution),
            "high_risk" | "high" => Some(RiskStatus::HighRisk),
            _ => None,
        }
    }

    /// Returns an emoji representation of the status.
    pub fn emoji(&self) -> &'static str {
        match self {
            RiskStatus::Safe => "🟢",
            RiskStatus::Caution => "🟡",
            RiskStatus::HighRisk => "🔴",
        }
    }
}

/// Opaque reference to an uploaded image.
///
/// The engine never looks inside; it only keeps order and compares for removal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One evaluated ingredient, additive or material characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFinding {
    /// Ingredient or characteristic name.
    pub name: String,
    /// Canonical risk status.
    pub status: RiskStatus,
    /// Free-text explanation.
    #[serde(default)]
    pub description: String,
    /// Classification tags (e.g. "UV Filter").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Specific health or environmental concerns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concerns: Vec<String>,
    /// Regulatory status text keyed by region code.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub regulatory_status: BTreeMap<String, String>,
}

impl ItemFinding {
    /// Creates a finding with no description, tags or regulatory data.
    pub fn new(name: impl Into<String>, status: RiskStatus) -> Self {
        Self {
            name: name.into(),
            status,
            description: String::new(),
            tags: Vec::new(),
            concerns: Vec::new(),
            regulatory_status: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Mutable draft of a product submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSubmission {
    /// Domain the submission will be analyzed under.
    pub domain: String,
    /// Product title, already trimmed.
    pub title: String,
    /// Image references in upload order.
    pub images: Vec<ImageRef>,
}

impl ProductSubmission {
    /// Creates an empty draft for a domain.
    pub fn empty(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            title: String::new(),
            images: Vec::new(),
        }
    }

    /// A submission is ready when it has a non-blank title and at least one image.
    pub fn is_ready(&self) -> bool {
        self.readiness_problem().is_none()
    }

    /// Describes why the submission is not ready, if it isn't.
    pub fn readiness_problem(&self) -> Option<String> {
        match (self.title.trim().is_empty(), self.images.is_empty()) {
            (true, true) => Some("title is empty and no images were added".to_string()),
            (true, false) => Some("title is empty".to_string()),
            (false, true) => Some("no images were added".to_string()),
            (false, false) => None,
        }
    }
}

/// Immutable snapshot of a submission taken at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub domain: String,
    pub title: String,
    pub images: Vec<ImageRef>,
}

impl AnalysisRequest {
    /// Snapshot a submission under a fresh request id.
    pub fn from_submission(submission: &ProductSubmission) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            domain: submission.domain.clone(),
            title: submission.title.clone(),
            images: submission.images.clone(),
        }
    }
}

/// Resin identification for plastic products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlasticType {
    pub name: String,
    #[serde(alias = "recyclingCode")]
    pub recycling_code: u8,
    #[serde(default)]
    pub description: String,
}

/// Lifecycle impact notes for plastic products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentalImpact {
    #[serde(default, alias = "productionEnergy")]
    pub production_energy: String,
    #[serde(default, alias = "degradationTime")]
    pub degradation_time: String,
    #[serde(default, alias = "oceanImpact")]
    pub ocean_impact: String,
}

/// Output of one completed analysis, in the shape shared by all domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub product_name: String,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    pub findings: Vec<ItemFinding>,
    /// Aggregate safety or sustainability score in [0, 100].
    pub score: u8,
    pub methodology: String,
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plastic_type: Option<PlasticType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environmental_impact: Option<EnvironmentalImpact>,
    /// Product-level notes keyed by region code.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub regional_notes: BTreeMap<String, String>,
    pub completed_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn score_band(&self) -> ScoreBand {
        ScoreBand::from_score(self.score)
    }

    pub fn summary(&self) -> FindingSummary {
        FindingSummary::from_findings(&self.findings)
    }
}

/// A finalized analysis stored in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub domain: String,
    /// Title of the originating submission.
    pub title: String,
    /// First image of the submission, used as a thumbnail.
    pub thumbnail: Option<ImageRef>,
    pub image_count: usize,
    pub recorded_at: DateTime<Utc>,
    pub result: AnalysisResult,
}

impl AnalysisRecord {
    pub fn score(&self) -> u8 {
        self.result.score
    }
}

/// Display band of an aggregate score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Good,
    Moderate,
    Concerning,
}

impl ScoreBand {
    pub fn from_score(score: u8) -> Self {
        if score > 80 {
            ScoreBand::Good
        } else if score > 60 {
            ScoreBand::Moderate
        } else {
            ScoreBand::Concerning
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            ScoreBand::Good => "🟢",
            ScoreBand::Moderate => "🟡",
            ScoreBand::Concerning => "🔴",
        }
    }

    /// One-line verdict shown next to the score.
    pub fn message(&self) -> &'static str {
        match self {
            ScoreBand::Good => "Low concern overall.",
            ScoreBand::Moderate => "Some moderate concerns; review the flagged items.",
            ScoreBand::Concerning => "Significant concerns; use with caution.",
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreBand::Good => write!(f, "Good"),
            ScoreBand::Moderate => write!(f, "Moderate"),
            ScoreBand::Concerning => write!(f, "Concerning"),
        }
    }
}

/// Counts of findings per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingSummary {
    pub total: usize,
    pub safe: usize,
    pub caution: usize,
    pub high_risk: usize,
    /// Total number of concern strings across all findings.
    pub concerns: usize,
}

impl FindingSummary {
    /// Creates a summary from a list of findings.
    pub fn from_findings(findings: &[ItemFinding]) -> Self {
        let mut summary = Self {
            total: findings.len(),
            ..Self::default()
        };

        for finding in findings {
            match finding.status {
                RiskStatus::Safe => summary.safe += 1,
                RiskStatus::Caution => summary.caution += 1,
                RiskStatus::HighRisk => summary.high_risk += 1,
            }
            summary.concerns += finding.concerns.len();
        }

        summary
    }
}

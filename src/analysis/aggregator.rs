//! Score aggregation and finding statistics.
//!
//! The aggregate score is a pure function of the findings and the domain's
//! scoring policy: start at 100, subtract one penalty per finding, clamp.

use crate::error::{OrchestratorError, Result};
use crate::models::{FindingSummary, ItemFinding, RiskStatus};
use crate::registry::{DomainRegistry, ScoringPolicy};
use std::collections::HashMap;

/// Highest possible aggregate score.
pub const MAX_SCORE: u8 = 100;

/// Compute the aggregate score for a list of findings.
///
/// An empty list yields the policy's neutral default rather than 100.
pub fn compute_score(findings: &[ItemFinding], policy: &ScoringPolicy) -> u8 {
    if findings.is_empty() {
        return policy.neutral_default.min(MAX_SCORE);
    }

    let total_penalty: i64 = findings
        .iter()
        .map(|f| i64::from(policy.penalty(f.status)))
        .sum();

    (i64::from(MAX_SCORE) - total_penalty).clamp(0, i64::from(MAX_SCORE)) as u8
}

/// Compute the aggregate score for a registered domain.
pub fn compute_score_for(
    registry: &DomainRegistry,
    findings: &[ItemFinding],
    domain_id: &str,
) -> Result<u8> {
    let domain = registry.get_domain(domain_id)?;
    Ok(compute_score(findings, &domain.scoring))
}

/// Validate a score reported by a backend.
///
/// Out-of-range values are reported as `InvalidScore`; callers log and clamp.
pub fn check_reported_score(score: i64) -> Result<u8> {
    if (0..=i64::from(MAX_SCORE)).contains(&score) {
        Ok(score as u8)
    } else {
        Err(OrchestratorError::InvalidScore(score))
    }
}

/// Clamp an arbitrary score into [0, 100].
pub fn clamp_score(score: i64) -> u8 {
    score.clamp(0, i64::from(MAX_SCORE)) as u8
}

/// Sort findings by status (highest risk first), keeping input order within a status.
pub fn sort_findings_by_risk(findings: &mut [ItemFinding]) {
    findings.sort_by(|a, b| b.status.cmp(&a.status));
}

/// Group findings by status.
pub fn group_by_status(findings: &[ItemFinding]) -> HashMap<RiskStatus, Vec<ItemFinding>> {
    let mut grouped: HashMap<RiskStatus, Vec<ItemFinding>> = HashMap::new();

    for finding in findings {
        grouped
            .entry(finding.status)
            .or_default()
            .push(finding.clone());
    }

    grouped
}

/// The highest risk status present, if any findings exist.
pub fn highest_risk(findings: &[ItemFinding]) -> Option<RiskStatus> {
    findings.iter().map(|f| f.status).max()
}

/// Findings that carry at least one concern string.
pub fn findings_with_concerns(findings: &[ItemFinding]) -> Vec<&ItemFinding> {
    findings.iter().filter(|f| !f.concerns.is_empty()).collect()
}

/// Count how often each tag appears, most frequent first.
pub fn tag_frequency(findings: &[ItemFinding]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    for finding in findings {
        for tag in &finding.tags {
            *counts.entry(tag.clone()).or_default() += 1;
        }
    }

    let mut tags: Vec<_> = counts.into_iter().collect();
    tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    tags
}

/// Generate a text summary of finding statistics.
pub fn generate_summary_text(summary: &FindingSummary) -> String {
    let lines = [
        format!("Total Items: {}", summary.total),
        format!("- {} High Risk: {}", RiskStatus::HighRisk.emoji(), summary.high_risk),
        format!("- {} Caution: {}", RiskStatus::Caution.emoji(), summary.caution),
        format!("- {} Safe: {}", RiskStatus::Safe.emoji(), summary.safe),
    ];

    lines.join("\n")
}

//! Markdown and JSON report generation.
//!
//! Renders a single analysis record, or a domain's history, for the CLI.

use crate::analysis::{findings_with_concerns, highest_risk, sort_findings_by_risk, tag_frequency};
use crate::models::{AnalysisRecord, AnalysisResult, FindingSummary, ItemFinding, RiskStatus};
use crate::registry::Domain;
use anyhow::{Context, Result};
use std::path::Path;

/// Generate a complete Markdown report for one record.
pub fn generate_markdown_report(record: &AnalysisRecord, domain: &Domain) -> String {
    let result = &record.result;
    let mut output = String::new();

    output.push_str(&format!("# {} Report: {}\n\n", domain.name, result.product_name));

    output.push_str(&generate_metadata_section(record, domain));
    output.push_str(&generate_score_section(result));
    output.push_str(&generate_summary_section(result));
    output.push_str(&generate_findings_section(&result.findings));
    output.push_str(&generate_concerns_section(&result.findings));
    output.push_str(&generate_plastic_section(result));
    output.push_str(&generate_regional_section(result));
    output.push_str(&generate_recommendations_section(&result.recommendations));
    output.push_str(&generate_methodology_section(result));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(record: &AnalysisRecord, domain: &Domain) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Domain:** {} (`{}`)\n", domain.name, domain.id));
    if let Some(ref product_type) = record.result.product_type {
        section.push_str(&format!("- **Product Type:** {}\n", product_type));
    }
    section.push_str(&format!("- **Submitted Title:** {}\n", record.title));
    section.push_str(&format!("- **Images:** {}\n", record.image_count));
    section.push_str(&format!(
        "- **Analyzed:** {}\n",
        record.result.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Record:** `{}`\n\n", record.id));

    section
}

fn generate_score_section(result: &AnalysisResult) -> String {
    let band = result.score_band();
    format!(
        "## Score\n\n{} **{}/100** ({})\n\n{}\n\n",
        band.emoji(),
        result.score,
        band,
        band.message()
    )
}

fn generate_summary_section(result: &AnalysisResult) -> String {
    let summary = FindingSummary::from_findings(&result.findings);
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str(&format!(
        "| {} High Risk | {} Caution | {} Safe | **Total** |\n",
        RiskStatus::HighRisk.emoji(),
        RiskStatus::Caution.emoji(),
        RiskStatus::Safe.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        summary.high_risk, summary.caution, summary.safe, summary.total
    ));

    let tags = tag_frequency(&result.findings);
    if !tags.is_empty() {
        section.push_str("### Tags\n\n");
        section.push_str("| Tag | Items |\n");
        section.push_str("|:---|:---:|\n");
        for (tag, count) in tags {
            section.push_str(&format!("| {} | {} |\n", tag, count));
        }
        section.push('\n');
    }

    section
}

fn generate_findings_section(findings: &[ItemFinding]) -> String {
    let mut section = String::new();

    section.push_str("## Findings\n\n");

    if findings.is_empty() {
        section.push_str("No items were identified for this product.\n\n");
        return section;
    }

    let mut sorted = findings.to_vec();
    sort_findings_by_risk(&mut sorted);

    for finding in &sorted {
        section.push_str(&generate_finding_block(finding));
    }

    section
}

fn generate_finding_block(finding: &ItemFinding) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "### {} {} ({})\n\n",
        finding.status.emoji(),
        finding.name,
        finding.status
    ));

    if !finding.tags.is_empty() {
        block.push_str(&format!("*{}*\n\n", finding.tags.join(", ")));
    }

    if !finding.description.is_empty() {
        block.push_str(&format!("{}\n\n", finding.description));
    }

    if !finding.regulatory_status.is_empty() {
        block.push_str("| Region | Status |\n");
        block.push_str("|:---|:---|\n");
        for (region, status) in &finding.regulatory_status {
            block.push_str(&format!("| {} | {} |\n", region, status));
        }
        block.push('\n');
    }

    block
}

fn generate_concerns_section(findings: &[ItemFinding]) -> String {
    let flagged = findings_with_concerns(findings);
    if flagged.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Key Concerns\n\n");
    for finding in flagged {
        section.push_str(&format!(
            "- **{}:** {}\n",
            finding.name,
            finding.concerns.join("; ")
        ));
    }
    section.push('\n');

    section
}

fn generate_plastic_section(result: &AnalysisResult) -> String {
    if result.plastic_type.is_none() && result.environmental_impact.is_none() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Material\n\n");

    if let Some(ref plastic) = result.plastic_type {
        section.push_str(&format!(
            "- **Plastic Type:** {} (resin code {})\n",
            plastic.name, plastic.recycling_code
        ));
        if !plastic.description.is_empty() {
            section.push_str(&format!("  {}\n", plastic.description));
        }
    }

    if let Some(ref impact) = result.environmental_impact {
        for (label, text) in [
            ("Production Energy", &impact.production_energy),
            ("Degradation Time", &impact.degradation_time),
            ("Ocean Impact", &impact.ocean_impact),
        ] {
            if !text.is_empty() {
                section.push_str(&format!("- **{}:** {}\n", label, text));
            }
        }
    }
    section.push('\n');

    section
}

fn generate_regional_section(result: &AnalysisResult) -> String {
    if result.regional_notes.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Regional Notes\n\n");
    for (region, note) in &result.regional_notes {
        section.push_str(&format!("- **{}:** {}\n", region, note));
    }
    section.push('\n');

    section
}

fn generate_recommendations_section(recommendations: &[String]) -> String {
    if recommendations.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Recommendations\n\n");
    for (i, rec) in recommendations.iter().enumerate() {
        section.push_str(&format!("{}. {}\n", i + 1, rec));
    }
    section.push('\n');

    section
}

fn generate_methodology_section(result: &AnalysisResult) -> String {
    let mut section = String::new();

    section.push_str("## Methodology\n\n");
    section.push_str(&result.methodology);
    section.push_str("\n\n");

    if !result.sources.is_empty() {
        section.push_str("### Sources\n\n");
        for source in &result.sources {
            section.push_str(&format!("- {}\n", source));
        }
        section.push('\n');
    }

    section
}

fn generate_footer() -> String {
    "---\n\n*Report generated by ProductLens*\n".to_string()
}

/// Generate a Markdown table of a domain's history.
pub fn generate_history_markdown(domain: &Domain, records: &[AnalysisRecord]) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {} History\n\n", domain.name));

    if records.is_empty() {
        output.push_str("No analyses recorded yet.\n");
        return output;
    }

    output.push_str("| Product | Score | Worst Item | Images | Analyzed |\n");
    output.push_str("|:---|:---:|:---:|:---:|:---|\n");

    for record in records {
        let band = record.result.score_band();
        let worst = highest_risk(&record.result.findings)
            .map(|status| format!("{} {}", status.emoji(), status))
            .unwrap_or_else(|| "-".to_string());

        output.push_str(&format!(
            "| {} | {} {} | {} | {} | {} |\n",
            record.result.product_name,
            band.emoji(),
            record.score(),
            worst,
            record.image_count,
            record.recorded_at.format("%Y-%m-%d %H:%M")
        ));
    }
    output.push('\n');

    output
}

/// Generate a JSON report.
pub fn generate_json_report(record: &AnalysisRecord) -> Result<String> {
    serde_json::to_string_pretty(record).map_err(Into::into)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{catalog, normalize};
    use crate::models::{AnalysisRequest, ImageRef, ProductSubmission};
    use crate::registry::DomainRegistry;
    use chrono::Utc;
    use uuid::Uuid;

    fn record_for(domain: &Domain, title: &str) -> AnalysisRecord {
        let submission = ProductSubmission {
            domain: domain.id.clone(),
            title: title.to_string(),
            images: vec![ImageRef::from("front.png"), ImageRef::from("back.png")],
        };
        let request = AnalysisRequest::from_submission(&submission);
        let raw = catalog::sample_for(&domain.id).unwrap_or_default();
        let result = normalize(domain, &request, raw).unwrap();

        AnalysisRecord {
            id: Uuid::new_v4(),
            domain: domain.id.clone(),
            title: title.to_string(),
            thumbnail: submission.images.first().cloned(),
            image_count: submission.images.len(),
            recorded_at: Utc::now(),
            result,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let registry = DomainRegistry::builtin();
        let domain = registry.get_domain("chemical").unwrap();
        let markdown = generate_markdown_report(&record_for(domain, "Sunscreen A"), domain);

        assert!(markdown.contains("Report: Sunscreen A"));
        assert!(markdown.contains("**55/100**"));
        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("## Key Concerns"));
        assert!(markdown.contains("Coral reef toxicity"));
        assert!(markdown.contains("| HI | Banned in sunscreens |"));
        assert!(markdown.contains("### Sources"));
        assert!(!markdown.contains("## Material"));

        // Highest risk first.
        let oxy = markdown.find("Oxybenzone").unwrap();
        let glycerin = markdown.find("Glycerin").unwrap();
        assert!(oxy < glycerin);
    }

    #[test]
    fn test_plastic_report_sections() {
        let registry = DomainRegistry::builtin();
        let domain = registry.get_domain("plastic").unwrap();
        let markdown = generate_markdown_report(&record_for(domain, "Water Bottle"), domain);

        assert!(markdown.contains("## Material"));
        assert!(markdown.contains("resin code 1"));
        assert!(markdown.contains("## Regional Notes"));
        assert!(markdown.contains("- **EU:**"));
    }

    #[test]
    fn test_generate_history_markdown() {
        let registry = DomainRegistry::builtin();
        let domain = registry.get_domain("food").unwrap();

        let empty = generate_history_markdown(domain, &[]);
        assert!(empty.contains("No analyses recorded yet."));

        let records = vec![record_for(domain, "Cereal"), record_for(domain, "Soda")];
        let table = generate_history_markdown(domain, &records);
        assert!(table.starts_with("# Food & Additives History"));
        assert!(table.contains("| Cereal |"));
        assert!(table.contains("| Soda |"));
        assert!(table.contains("High Risk"));
    }

    #[test]
    fn test_generate_json_report() {
        let registry = DomainRegistry::builtin();
        let domain = registry.get_domain("pregnancy").unwrap();
        let json = generate_json_report(&record_for(domain, "Serum")).unwrap();

        assert!(json.contains("\"image_count\": 2"));
        assert!(json.contains("\"findings\""));
        assert!(json.contains("\"high_risk\""));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.md");
        write_report("# Report\n", &path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# Report\n");
    }
}

//! Domain registry.
//!
//! The registry is the static catalog of analysis domains. It is built once
//! at startup from the `[[domains]]` configuration table (or the built-in
//! table below) and never mutated afterwards.

use crate::config::{DomainConfig, ScoringConfig};
use crate::error::{OrchestratorError, Result};
use crate::models::RiskStatus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error};

/// Shape of the finding list a backend reports for a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVariant {
    /// Ingredient list with a safety score.
    #[default]
    Ingredients,
    /// Material characteristics with a sustainability score.
    Characteristics,
}

/// Per-status penalties and the empty-product default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPolicy {
    pub safe_penalty: u32,
    pub caution_penalty: u32,
    pub high_risk_penalty: u32,
    pub neutral_default: u8,
}

impl ScoringPolicy {
    pub fn penalty(&self, status: RiskStatus) -> u32 {
        match status {
            RiskStatus::Safe => self.safe_penalty,
            RiskStatus::Caution => self.caution_penalty,
            RiskStatus::HighRisk => self.high_risk_penalty,
        }
    }

    fn from_config(id: &str, config: &ScoringConfig) -> anyhow::Result<Self> {
        if config.safe_penalty != 0 {
            anyhow::bail!("Domain '{}': safe_penalty must be 0", id);
        }
        if config.caution_penalty == 0 {
            anyhow::bail!("Domain '{}': caution_penalty must be greater than 0", id);
        }
        if config.high_risk_penalty <= config.caution_penalty {
            anyhow::bail!(
                "Domain '{}': high_risk_penalty ({}) must exceed caution_penalty ({})",
                id,
                config.high_risk_penalty,
                config.caution_penalty
            );
        }
        if config.neutral_default > 100 {
            anyhow::bail!("Domain '{}': neutral_default must be within 0-100", id);
        }

        Ok(Self {
            safe_penalty: config.safe_penalty,
            caution_penalty: config.caution_penalty,
            high_risk_penalty: config.high_risk_penalty,
            neutral_default: config.neutral_default,
        })
    }
}

/// A registered analysis domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    pub id: String,
    pub name: String,
    pub methodology: String,
    pub sources: Vec<String>,
    pub schema: SchemaVariant,
    pub scoring: ScoringPolicy,
    aliases: HashMap<String, RiskStatus>,
}

impl Domain {
    /// Build and validate a domain from its configuration entry.
    pub fn from_config(config: &DomainConfig) -> anyhow::Result<Self> {
        let id = config.id.trim();
        if id.is_empty() {
            anyhow::bail!("Domain id must not be empty");
        }

        let scoring = ScoringPolicy::from_config(id, &config.scoring)?;

        let mut aliases = HashMap::new();
        for (word, target) in &config.aliases {
            let status = RiskStatus::parse_canonical(target).ok_or_else(|| {
                anyhow::anyhow!(
                    "Domain '{}': alias '{}' maps to unknown status '{}'",
                    id,
                    word,
                    target
                )
            })?;
            aliases.insert(normalize_word(word), status);
        }

        Ok(Self {
            id: id.to_string(),
            name: config.name.clone(),
            methodology: config.methodology.clone(),
            sources: config.sources.clone(),
            schema: config.schema,
            scoring,
            aliases,
        })
    }

    /// Resolve a status word through this domain's aliases, then the canonical set.
    pub fn resolve_status(&self, word: &str) -> Option<RiskStatus> {
        self.aliases
            .get(&normalize_word(word))
            .copied()
            .or_else(|| RiskStatus::parse_canonical(word))
    }
}

fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Ordered, immutable catalog of domains.
#[derive(Debug, Clone)]
pub struct DomainRegistry {
    domains: Vec<Domain>,
}

impl DomainRegistry {
    /// Build the registry from configuration, rejecting invalid or duplicate entries.
    pub fn from_configs(configs: &[DomainConfig]) -> anyhow::Result<Self> {
        if configs.is_empty() {
            anyhow::bail!("At least one domain must be configured");
        }

        let mut domains: Vec<Domain> = Vec::with_capacity(configs.len());
        for config in configs {
            let domain = Domain::from_config(config)?;
            if domains.iter().any(|d| d.id == domain.id) {
                anyhow::bail!("Duplicate domain id: {}", domain.id);
            }
            debug!("Registered domain {} ({})", domain.id, domain.name);
            domains.push(domain);
        }

        Ok(Self { domains })
    }

    /// Registry holding the built-in domains.
    pub fn builtin() -> Self {
        let domains = builtin_domain_configs()
            .iter()
            .filter_map(|config| match Domain::from_config(config) {
                Ok(domain) => Some(domain),
                Err(e) => {
                    error!("Skipping invalid built-in domain {}: {}", config.id, e);
                    None
                }
            })
            .collect();

        Self { domains }
    }

    /// All domains in registration order.
    pub fn list_domains(&self) -> &[Domain] {
        &self.domains
    }

    /// Look up a domain by id.
    ///
    /// An unknown id is a bug in the caller, so it is logged at error level
    /// in addition to being returned.
    pub fn get_domain(&self, id: &str) -> Result<&Domain> {
        self.domains.iter().find(|d| d.id == id).ok_or_else(|| {
            error!("Unknown domain requested: {}", id);
            OrchestratorError::DomainNotFound(id.to_string())
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.domains.iter().any(|d| d.id == id)
    }
}

fn aliases(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(word, status)| (word.to_string(), status.to_string()))
        .collect()
}

fn sources(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// The built-in domain table.
pub fn builtin_domain_configs() -> Vec<DomainConfig> {
    vec![
        DomainConfig {
            id: "chemical".to_string(),
            name: "Cosmetics & Chemicals".to_string(),
            methodology: "Starts at 100 and subtracts 30 points per high-risk ingredient and \
                          15 per ingredient of moderate concern, based on published hazard \
                          assessments for skin, endocrine and environmental effects."
                .to_string(),
            sources: sources(&[
                "EU CosIng Cosmetic Ingredient Database",
                "US FDA Cosmetics Ingredient Regulations",
                "EWG Skin Deep Cosmetics Database",
                "Health Canada Cosmetic Ingredient Hotlist",
            ]),
            schema: SchemaVariant::Ingredients,
            scoring: ScoringConfig {
                safe_penalty: 0,
                caution_penalty: 15,
                high_risk_penalty: 30,
                neutral_default: 50,
            },
            aliases: aliases(&[("low_risk", "safe"), ("avoid", "high_risk")]),
        },
        DomainConfig {
            id: "food".to_string(),
            name: "Food & Additives".to_string(),
            methodology: "Starts at 100 and subtracts 25 points per additive to avoid and 10 \
                          per additive to limit, following food additive safety evaluations."
                .to_string(),
            sources: sources(&[
                "US FDA Food Additive Status List",
                "EFSA Food Additive Re-evaluations",
                "WHO/FAO JECFA Evaluations",
            ]),
            schema: SchemaVariant::Ingredients,
            scoring: ScoringConfig {
                safe_penalty: 0,
                caution_penalty: 10,
                high_risk_penalty: 25,
                neutral_default: 50,
            },
            aliases: aliases(&[("avoid", "high_risk"), ("limit", "caution")]),
        },
        DomainConfig {
            id: "pregnancy".to_string(),
            name: "Pregnancy Safety".to_string(),
            methodology: "Starts at 100 and subtracts 40 points per ingredient to avoid during \
                          pregnancy and 20 per ingredient that warrants consulting a clinician."
                .to_string(),
            sources: sources(&[
                "ACOG Clinical Guidance",
                "US FDA Pregnancy and Lactation Labeling Rule",
                "NHS Medicines in Pregnancy",
                "MotherToBaby Fact Sheets",
            ]),
            schema: SchemaVariant::Ingredients,
            scoring: ScoringConfig {
                safe_penalty: 0,
                caution_penalty: 20,
                high_risk_penalty: 40,
                neutral_default: 50,
            },
            aliases: aliases(&[
                ("unsafe", "high_risk"),
                ("avoid", "high_risk"),
                ("consult", "caution"),
            ]),
        },
        DomainConfig {
            id: "plastic".to_string(),
            name: "Plastic Sustainability".to_string(),
            methodology: "Starts at 100 and subtracts 20 points per poor material \
                          characteristic and 10 per characteristic of moderate concern \
                          (recyclability, durability, leaching, microplastic shedding)."
                .to_string(),
            sources: sources(&[
                "US EPA Plastics Material-Specific Data",
                "ASTM D7611 Resin Identification Codes",
                "EU Single-Use Plastics Directive",
            ]),
            schema: SchemaVariant::Characteristics,
            scoring: ScoringConfig {
                safe_penalty: 0,
                caution_penalty: 10,
                high_risk_penalty: 20,
                neutral_default: 50,
            },
            aliases: aliases(&[
                ("good", "safe"),
                ("low", "safe"),
                ("medium", "caution"),
                ("poor", "high_risk"),
            ]),
        },
    ]
}

//! Literal per-domain product data served by the simulated backend.
//!
//! Status words are deliberately the ones each domain's reviewers use
//! ("avoid", "limit", "good", ...); dispatch resolves them through the
//! registry aliases like it would for a remote backend.

use super::backend::{RawAnalysis, RawFinding};
use crate::models::{EnvironmentalImpact, PlasticType};
use std::collections::BTreeMap;

fn regions(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(region, status)| (region.to_string(), status.to_string()))
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn item(name: &str, status: &str, description: &str) -> RawFinding {
    RawFinding {
        name: name.to_string(),
        status: status.to_string(),
        description: description.to_string(),
        ..RawFinding::default()
    }
}

/// Canned analysis for a built-in domain, or `None` for domains without catalog data.
pub fn sample_for(domain_id: &str) -> Option<RawAnalysis> {
    match domain_id {
        "chemical" => Some(chemical()),
        "food" => Some(food()),
        "pregnancy" => Some(pregnancy()),
        "plastic" => Some(plastic()),
        _ => None,
    }
}

fn chemical() -> RawAnalysis {
    let oxybenzone = RawFinding {
        tags: strings(&["UV Filter"]),
        concerns: strings(&["Hormone disruption", "Coral reef toxicity"]),
        regulatory_status: regions(&[
            ("US", "Permitted up to 6%"),
            ("EU", "Restricted to 2.2% in body products"),
            ("HI", "Banned in sunscreens"),
        ]),
        ..item(
            "Oxybenzone",
            "high_risk",
            "Chemical UV filter absorbed through skin and detected in blood plasma.",
        )
    };

    let octinoxate = RawFinding {
        tags: strings(&["UV Filter"]),
        concerns: strings(&["Possible endocrine activity"]),
        regulatory_status: regions(&[("US", "Permitted up to 7.5%"), ("EU", "Permitted up to 10%")]),
        ..item(
            "Octinoxate",
            "moderate_risk",
            "UV-B filter with limited evidence of hormonal effects.",
        )
    };

    let zinc_oxide = RawFinding {
        tags: strings(&["Mineral UV Filter"]),
        regulatory_status: regions(&[("US", "GRASE"), ("EU", "Permitted up to 25%")]),
        ..item(
            "Zinc Oxide",
            "safe",
            "Mineral filter that sits on the skin surface.",
        )
    };

    let glycerin = RawFinding {
        tags: strings(&["Humectant"]),
        ..item("Glycerin", "safe", "Moisturizing agent with a long safety record.")
    };

    RawAnalysis {
        product_type: Some("Personal Care".to_string()),
        ingredients: Some(vec![oxybenzone, octinoxate, zinc_oxide, glycerin]),
        overall_safety_score: Some(72),
        recommendations: strings(&[
            "Prefer mineral-only sunscreens with zinc oxide or titanium dioxide.",
            "Avoid oxybenzone when swimming near coral reefs.",
        ]),
        ..RawAnalysis::default()
    }
}

fn food() -> RawAnalysis {
    let red_40 = RawFinding {
        tags: strings(&["Colorant", "Additive"]),
        concerns: strings(&["Hyperactivity in sensitive children"]),
        regulatory_status: regions(&[
            ("US", "Approved"),
            ("EU", "Approved with warning label"),
        ]),
        ..item("Red 40 (Allura Red)", "avoid", "Synthetic azo dye.")
    };

    let hfcs = RawFinding {
        tags: strings(&["Sweetener"]),
        concerns: strings(&["Excess added sugar"]),
        ..item(
            "High Fructose Corn Syrup",
            "limit",
            "Added sugar linked to metabolic issues in high amounts.",
        )
    };

    let sodium_benzoate = RawFinding {
        tags: strings(&["Preservative", "Additive"]),
        regulatory_status: regions(&[("US", "GRAS"), ("EU", "E211, approved")]),
        ..item(
            "Sodium Benzoate",
            "caution",
            "Preservative that can form benzene in the presence of vitamin C.",
        )
    };

    let oats = RawFinding {
        tags: strings(&["Whole Grain"]),
        ..item("Whole Grain Oats", "safe", "Source of fiber.")
    };

    RawAnalysis {
        product_type: Some("Packaged Food".to_string()),
        ingredients: Some(vec![red_40, hfcs, sodium_benzoate, oats]),
        overall_safety_score: Some(64),
        recommendations: strings(&["Choose products colored with plant-based dyes."]),
        ..RawAnalysis::default()
    }
}

fn pregnancy() -> RawAnalysis {
    let retinyl = RawFinding {
        tags: strings(&["Retinoid"]),
        concerns: strings(&["Birth defects at high doses"]),
        regulatory_status: regions(&[("US", "Not recommended during pregnancy")]),
        ..item(
            "Retinyl Palmitate",
            "avoid",
            "Vitamin A derivative; topical retinoids are generally avoided in pregnancy.",
        )
    };

    let salicylic = RawFinding {
        tags: strings(&["Exfoliant"]),
        concerns: strings(&["High-concentration peels not advised"]),
        ..item(
            "Salicylic Acid",
            "consult",
            "Low concentrations are usually acceptable; ask a clinician.",
        )
    };

    RawAnalysis {
        product_type: Some("Skincare".to_string()),
        ingredients: Some(vec![
            retinyl,
            salicylic,
            item("Hyaluronic Acid", "safe", "Hydrating ingredient, not systemically absorbed."),
            item("Niacinamide", "safe", "Vitamin B3; considered pregnancy safe."),
        ]),
        overall_safety_score: Some(58),
        recommendations: strings(&[
            "Replace retinoid products with bakuchiol or azelaic acid during pregnancy.",
            "Discuss exfoliating products with your healthcare provider.",
        ]),
        ..RawAnalysis::default()
    }
}

fn plastic() -> RawAnalysis {
    RawAnalysis {
        product_type: Some("Food Packaging".to_string()),
        characteristics: Some(vec![
            item("Recyclability", "good", "Widely accepted in recycling programs"),
            item("Durability", "medium", "Single-use, but can be repurposed"),
            item(
                "Chemical Leaching",
                "low",
                "Low risk of chemical leaching under normal conditions",
            ),
            RawFinding {
                concerns: strings(&["Microplastics in marine environments"]),
                ..item(
                    "Microplastic Shedding",
                    "caution",
                    "Can shed microplastics when exposed to heat or wear",
                )
            },
        ]),
        overall_sustainability_score: Some(78),
        plastic_type: Some(PlasticType {
            name: "Polyethylene Terephthalate (PET)".to_string(),
            recycling_code: 1,
            description: "Commonly used for beverage bottles and food containers.".to_string(),
        }),
        environmental_impact: Some(EnvironmentalImpact {
            production_energy: "Moderate energy required for production".to_string(),
            degradation_time: "450 years to decompose in nature".to_string(),
            ocean_impact: "Can break down into microplastics in marine environments".to_string(),
        }),
        regional_analysis: regions(&[
            ("US", "Recyclable in most curbside programs"),
            ("EU", "Subject to single-use plastic regulations in some countries"),
            ("CA", "Included in most municipal recycling programs"),
        ]),
        ..RawAnalysis::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_domains_have_samples() {
        for id in ["chemical", "food", "pregnancy", "plastic"] {
            assert!(sample_for(id).is_some(), "missing sample for {}", id);
        }
        assert!(sample_for("toys").is_none());
    }

    #[test]
    fn test_plastic_sample_uses_characteristics() {
        let sample = sample_for("plastic").unwrap();
        assert!(sample.ingredients.is_none());
        assert_eq!(sample.characteristics.map(|c| c.len()), Some(4));
        assert!(sample.overall_safety_score.is_none());
        assert_eq!(sample.overall_sustainability_score, Some(78));
    }
}

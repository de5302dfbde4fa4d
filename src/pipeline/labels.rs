//! Human-readable labels for model terms
//!
//! A pure lookup applied to result rows after estimates are extracted.

use super::covariates::INTERCEPT;
use super::schema::{self, Site};

const CATEGORICAL_PREFIXES: [(&str, &str); 5] = [
    (schema::TUMOR_TYPE_COLLAPSED, "Tumor type"),
    (schema::RACE_CAT, "Race"),
    (schema::SMOKE_CAT, "Smoking"),
    (schema::GENDER, "Sex"),
    (schema::MODALITY_CAT, "Modality"),
];

/// Label for a design-matrix term. Unknown terms are returned unchanged.
pub fn term_label(term: &str) -> String {
    if let Some(site) = Site::ALL.iter().find(|s| s.scaled_dose_column() == term) {
        return site.label().to_string();
    }

    let fixed = match term {
        INTERCEPT => Some("Intercept"),
        schema::TOTAL_DOSE => Some("Total dose"),
        schema::XRT => Some("Radiotherapy"),
        schema::AGE_SCALED => Some("Age (scaled)"),
        "alkylating_agent" => Some("Alkylating agent"),
        "platinum_agent" => Some("Platinum agent"),
        "topoisomerase_ii_inhibitor" => Some("Topoisomerase II inhibitor"),
        "antimetabolite" => Some("Antimetabolite"),
        "microtubule_damaging" => Some("Microtubule damaging agent"),
        schema::ANY_CHEMO => Some("Any chemotherapy"),
        schema::ANY_CH => Some("Any CH"),
        schema::DDR => Some("DDR CH"),
        schema::DTA => Some("DTA CH"),
        schema::NON_DDR_CH => Some("Non-DDR CH"),
        schema::MUTNUM => Some("Mutation count"),
        schema::MAX_VAF => Some("Maximum VAF"),
        _ => None,
    };
    if let Some(label) = fixed {
        return label.to_string();
    }

    // Treatment-coded dummies are named <field><level>
    for (prefix, label) in CATEGORICAL_PREFIXES {
        if let Some(level) = term.strip_prefix(prefix) {
            if !level.is_empty() {
                let level = match (prefix, level) {
                    (schema::SMOKE_CAT, "1") => "Ever",
                    (schema::SMOKE_CAT, "0") => "Never",
                    _ => level,
                };
                return format!("{}: {}", label, level);
            }
        }
    }

    term.to_string()
}

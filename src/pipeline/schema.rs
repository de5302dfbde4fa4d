//! Fixed input contract: column names, the anatomic sites and the gene panel.
//!
//! These are contract constants rather than configuration. Every column listed
//! in [`REQUIRED_COLUMNS`] must be present in the input table.

use polars::prelude::*;
use serde::Serialize;

use crate::error::{AnalysisError, Result};

pub const STUDY_ID: &str = "STUDY_ID";
pub const AGE: &str = "age";
pub const GENDER_RAW: &str = "Gender";
pub const RACE: &str = "race";
pub const SMOKING: &str = "smoking_status";
pub const PACKYEARS: &str = "packyears";
pub const XRT: &str = "XRT";
pub const MODALITY: &str = "modality";
pub const DAYS_TO_BLOOD_DRAW: &str = "days_to_blood_draw";
pub const TUMOR_TYPE: &str = "tumor_type";
pub const MUTNUM: &str = "mutnum";
pub const MAX_VAF: &str = "max_vaf";

pub const CHEMO_CLASSES: [&str; 5] = [
    "alkylating_agent",
    "platinum_agent",
    "topoisomerase_ii_inhibitor",
    "antimetabolite",
    "microtubule_damaging",
];

// Derived columns
pub const AGE_SCALED: &str = "age_scaled";
pub const GENDER: &str = "gender";
pub const RACE_CAT: &str = "race_cat";
pub const SMOKE_CAT: &str = "smoke_cat";
pub const PACKYEARS_BIN: &str = "packyears_bin";
pub const MUTNUM_BIN: &str = "mutnum_bin";
pub const VAF_BIN: &str = "vaf_bin";
pub const MODALITY_CAT: &str = "modality_cat";
pub const TOTAL_DOSE: &str = "total_dose_100";
pub const DDR: &str = "ddr";
pub const DTA: &str = "dta";
pub const ANY_CH: &str = "any_ch";
pub const NON_DDR_CH: &str = "non_ddr_ch";
pub const ANY_CHEMO: &str = "any_chemo";
pub const TUMOR_TYPE_COLLAPSED: &str = "tumor_type_collapsed";

/// Category label used when a recoded value is blank or unknown.
pub const MISSING_LEVEL: &str = "Missing";
/// Category label for collapsed or explicitly "other" values.
pub const OTHER_LEVEL: &str = "Other";

/// Irradiated anatomic sites, in the order they appear on sweep axis 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Site {
    Abdomen,
    Brain,
    Breast,
    Chest,
    Extremity,
    HeadNeck,
    Pelvis,
    Spine,
    Other,
}

impl Site {
    pub const ALL: [Site; 9] = [
        Site::Abdomen,
        Site::Brain,
        Site::Breast,
        Site::Chest,
        Site::Extremity,
        Site::HeadNeck,
        Site::Pelvis,
        Site::Spine,
        Site::Other,
    ];

    /// Raw EQD3 dose column in the input table.
    pub fn dose_column(self) -> &'static str {
        match self {
            Site::Abdomen => "eqd_3abdomen",
            Site::Brain => "eqd_3brain",
            Site::Breast => "eqd_3breast",
            Site::Chest => "eqd_3chest",
            Site::Extremity => "eqd_3extremity",
            Site::HeadNeck => "eqd_3headneck",
            Site::Pelvis => "eqd_3pelvis",
            Site::Spine => "eqd_3spine",
            Site::Other => "eqd_3other",
        }
    }

    /// Derived dose column divided by 100.
    pub fn scaled_dose_column(self) -> &'static str {
        match self {
            Site::Abdomen => "eqd_3abdomen_100",
            Site::Brain => "eqd_3brain_100",
            Site::Breast => "eqd_3breast_100",
            Site::Chest => "eqd_3chest_100",
            Site::Extremity => "eqd_3extremity_100",
            Site::HeadNeck => "eqd_3headneck_100",
            Site::Pelvis => "eqd_3pelvis_100",
            Site::Spine => "eqd_3spine_100",
            Site::Other => "eqd_3other_100",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Site::Abdomen => "Abdomen",
            Site::Brain => "Brain",
            Site::Breast => "Breast",
            Site::Chest => "Chest",
            Site::Extremity => "Extremity",
            Site::HeadNeck => "Head & Neck",
            Site::Pelvis => "Pelvis",
            Site::Spine => "Spine",
            Site::Other => "Other site",
        }
    }
}

/// CH gene panel, in the order they appear on sweep axis 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Gene {
    Dnmt3a,
    Tet2,
    Asxl1,
    Ppm1d,
    Tp53,
    Atm,
    Chek2,
    Srsf2,
    Sf3b1,
    Jak2,
}

impl Gene {
    pub const PANEL: [Gene; 10] = [
        Gene::Dnmt3a,
        Gene::Tet2,
        Gene::Asxl1,
        Gene::Ppm1d,
        Gene::Tp53,
        Gene::Atm,
        Gene::Chek2,
        Gene::Srsf2,
        Gene::Sf3b1,
        Gene::Jak2,
    ];

    /// DNA damage response genes.
    pub const DDR: [Gene; 4] = [Gene::Ppm1d, Gene::Tp53, Gene::Atm, Gene::Chek2];

    /// Epigenetic regulators (DNMT3A, TET2, ASXL1).
    pub const DTA: [Gene; 3] = [Gene::Dnmt3a, Gene::Tet2, Gene::Asxl1];

    pub fn symbol(self) -> &'static str {
        match self {
            Gene::Dnmt3a => "DNMT3A",
            Gene::Tet2 => "TET2",
            Gene::Asxl1 => "ASXL1",
            Gene::Ppm1d => "PPM1D",
            Gene::Tp53 => "TP53",
            Gene::Atm => "ATM",
            Gene::Chek2 => "CHEK2",
            Gene::Srsf2 => "SRSF2",
            Gene::Sf3b1 => "SF3B1",
            Gene::Jak2 => "JAK2",
        }
    }
}

/// Every column the deriver reads.
pub fn required_columns() -> Vec<&'static str> {
    let mut columns = vec![
        STUDY_ID,
        AGE,
        GENDER_RAW,
        RACE,
        SMOKING,
        PACKYEARS,
        XRT,
        MODALITY,
        DAYS_TO_BLOOD_DRAW,
        TUMOR_TYPE,
        MUTNUM,
        MAX_VAF,
    ];
    columns.extend(CHEMO_CLASSES);
    columns.extend(Site::ALL.iter().map(|s| s.dose_column()));
    columns.extend(Gene::PANEL.iter().map(|g| g.symbol()));
    columns
}

/// Check that every required column is present, naming the first one that is not.
pub fn validate_input_schema(df: &DataFrame) -> Result<()> {
    let schema = df.schema();
    for column in required_columns() {
        if !schema.contains(column) {
            return Err(AnalysisError::missing_field(column));
        }
    }
    Ok(())
}

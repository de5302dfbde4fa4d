//! Tests for feature derivation over the raw input table

use chsweep::error::AnalysisError;
use chsweep::pipeline::columns::{flag_values, string_values};
use chsweep::pipeline::schema::{self, Gene, Site};
use chsweep::pipeline::*;
use polars::prelude::*;

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_derive_adds_every_documented_column() {
    let df = SyntheticCohort::default().with_subjects(60).enriched();

    let mut expected = vec![
        schema::AGE_SCALED,
        schema::GENDER,
        schema::RACE_CAT,
        schema::SMOKE_CAT,
        schema::PACKYEARS_BIN,
        schema::MODALITY_CAT,
        schema::TOTAL_DOSE,
        schema::DDR,
        schema::DTA,
        schema::ANY_CH,
        schema::NON_DDR_CH,
        schema::ANY_CHEMO,
        schema::MUTNUM_BIN,
        schema::VAF_BIN,
    ];
    expected.extend(Site::ALL.iter().map(|s| s.scaled_dose_column()));
    assert_has_columns(&df, &expected);
    assert_eq!(df.height(), 60, "derivation must keep one row per subject");
}

#[test]
fn test_missing_field_is_schema_error() {
    let raw = SyntheticCohort::default().with_subjects(20).generate();
    let raw = raw.drop("TP53").unwrap();

    match derive_features(&raw) {
        Err(AnalysisError::Schema { field, .. }) => assert_eq!(field, "TP53"),
        other => panic!("expected schema error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_ddr_is_or_over_ddr_genes_with_unmeasured_as_absent() {
    let mut raw = SyntheticCohort::default().with_subjects(40).generate();
    // TP53 unmeasured for everyone
    raw.with_column(Column::new("TP53".into(), vec![None::<i32>; 40]))
        .unwrap();

    let (df, _) = derive_features(&raw).unwrap();
    let ddr = flag_values(&df, schema::DDR).unwrap();
    let genes: Vec<Vec<bool>> = Gene::DDR
        .iter()
        .map(|g| flag_values(&df, g.symbol()).unwrap())
        .collect();

    for row in 0..df.height() {
        let expected = genes.iter().any(|g| g[row]);
        assert_eq!(ddr[row], expected, "row {}", row);
    }
    assert!(flag_values(&df, "TP53").unwrap().iter().all(|f| !f));
}

#[test]
fn test_race_recoding_in_table() {
    let df = SyntheticCohort::default().with_subjects(80).enriched();
    let raw = string_values(&df, schema::RACE).unwrap();
    let derived = string_values(&df, schema::RACE_CAT).unwrap();

    for (r, d) in raw.iter().zip(&derived) {
        let d = d.as_deref().unwrap();
        match r.as_deref() {
            None | Some("") | Some("UNKNOWN") => assert_eq!(d, "Missing"),
            Some("WHITE") => assert_eq!(d, "White"),
            Some("ASIAN") => assert_eq!(d, "Asian"),
            Some(other) => assert_eq!(d, recode_race(Some(other))),
        }
    }
}

#[test]
fn test_pack_years_boundary_and_idempotency() {
    let col = Column::new("packyears".into(), [Some(1.0f64), Some(0.0), None, Some(100.0)]);
    let binned = bin_pack_years(&col).unwrap();
    let labels: Vec<Option<&str>> = binned.str().unwrap().into_iter().collect();
    assert_eq!(
        labels,
        vec![Some("[1,2)"), Some("[0,0.001)"), Some("Missing"), Some("[100,Inf]")]
    );

    // Binning the labels again is a type error, not a silent re-bin
    assert!(matches!(
        bin_pack_years(&binned),
        Err(AnalysisError::Schema { .. })
    ));
}

#[test]
fn test_binned_pack_years_input_is_rejected_by_deriver() {
    let mut raw = SyntheticCohort::default().with_subjects(10).generate();
    raw.with_column(Column::new("packyears".into(), vec!["[1,2)"; 10]))
        .unwrap();
    assert!(matches!(
        derive_features(&raw),
        Err(AnalysisError::Schema { field, .. }) if field == "packyears"
    ));
}

#[test]
fn test_total_dose_sums_sites_in_hundreds() {
    let (df, _) = derive_features(&SyntheticCohort::default().with_subjects(30).generate()).unwrap();
    let total = columns::f64_values(&df, schema::TOTAL_DOSE).unwrap();
    let sites: Vec<Vec<Option<f64>>> = Site::ALL
        .iter()
        .map(|s| columns::f64_values(&df, s.dose_column()).unwrap())
        .collect();

    for row in 0..df.height() {
        let expected: f64 = sites.iter().map(|s| s[row].unwrap_or(0.0)).sum::<f64>() / 100.0;
        assert!((total[row].unwrap() - expected).abs() < 1e-9);
    }
}

#[test]
fn test_age_scaled_has_zero_mean() {
    let (df, summary) = derive_features(&SyntheticCohort::default().generate()).unwrap();
    let scaled: Vec<f64> = columns::f64_values(&df, schema::AGE_SCALED)
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    let mean = scaled.iter().sum::<f64>() / scaled.len() as f64;
    assert!(mean.abs() < 1e-9);
    assert!(summary.age_scaling.sd > 0.0);
}

#[test]
fn test_unrecognised_gender_is_schema_error() {
    let mut raw = SyntheticCohort::default().with_subjects(5).generate();
    raw.with_column(Column::new(
        "Gender".into(),
        ["Male", "Female", "X", "Male", "Female"],
    ))
    .unwrap();
    assert!(matches!(
        derive_features(&raw),
        Err(AnalysisError::Schema { field, .. }) if field == "Gender"
    ));
}

#[test]
fn test_vaf_bins() {
    assert_eq!(vaf_label(None), Some("None"));
    assert_eq!(vaf_label(Some(0.0)), Some("None"));
    assert_eq!(vaf_label(Some(0.05)), Some("0.05-0.10"));
    assert_eq!(vaf_label(Some(0.2)), Some(">=0.20"));
    assert_eq!(vaf_label(Some(1.5)), None);
}

#[test]
fn test_ch_composites_on_hand_built_rows() {
    let mut raw = SyntheticCohort::default().with_subjects(6).generate();
    // rows: none, DNMT3A, TP53, SRSF2, count only, TET2 + CHEK2
    let genes: [(&str, [Option<i32>; 6]); 10] = [
        ("DNMT3A", [Some(0), Some(1), Some(0), Some(0), Some(0), Some(0)]),
        ("TET2", [Some(0), Some(0), Some(0), Some(0), Some(0), Some(1)]),
        ("ASXL1", [Some(0); 6]),
        ("PPM1D", [Some(0); 6]),
        ("TP53", [Some(0), Some(0), Some(1), Some(0), None, Some(0)]),
        ("ATM", [Some(0); 6]),
        ("CHEK2", [Some(0), Some(0), Some(0), Some(0), Some(0), Some(1)]),
        ("SRSF2", [Some(0), Some(0), Some(0), Some(1), Some(0), Some(0)]),
        ("SF3B1", [Some(0); 6]),
        ("JAK2", [Some(0), None, Some(0), Some(0), Some(0), None]),
    ];
    for (name, values) in genes {
        raw.with_column(Column::new(name.into(), values)).unwrap();
    }
    raw.with_column(Column::new("mutnum".into(), [0i64, 1, 1, 1, 2, 2]))
        .unwrap();

    let chemo: [(&str, [Option<i32>; 6]); 5] = [
        ("alkylating_agent", [Some(0), Some(1), Some(0), Some(0), Some(1), Some(0)]),
        ("platinum_agent", [Some(0), Some(0), Some(0), None, Some(0), Some(0)]),
        ("topoisomerase_ii_inhibitor", [Some(0); 6]),
        ("antimetabolite", [Some(0); 6]),
        ("microtubule_damaging", [Some(0), Some(0), Some(1), Some(0), Some(1), Some(0)]),
    ];
    for (name, values) in chemo {
        raw.with_column(Column::new(name.into(), values)).unwrap();
    }

    let (df, _) = derive_features(&raw).unwrap();

    assert_eq!(
        flag_values(&df, "ddr").unwrap(),
        vec![false, false, true, false, false, true]
    );
    assert_eq!(
        flag_values(&df, "dta").unwrap(),
        vec![false, true, false, false, false, true]
    );
    // Row 4 has no flagged gene but a positive mutation count
    assert_eq!(
        flag_values(&df, "any_ch").unwrap(),
        vec![false, true, true, true, true, true]
    );
    assert_eq!(
        flag_values(&df, "non_ddr_ch").unwrap(),
        vec![false, true, false, true, true, false]
    );
    assert_eq!(
        flag_values(&df, "any_chemo").unwrap(),
        vec![false, true, true, false, true, false]
    );
}

//! Shared test utilities and fixture generators

#![allow(dead_code)]

use chsweep::pipeline::schema::{self, Gene, Site};
use chsweep::pipeline::{derive_features, Cohort, CohortFilter};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tempfile::TempDir;

/// A dose → mutation association planted in a synthetic cohort.
#[derive(Debug, Clone, Copy)]
pub struct Injection {
    pub site: Site,
    pub gene: Gene,
    /// Change in log-odds per 100 cGy.
    pub log_odds_per_unit: f64,
}

/// Generator for raw input tables with the full input schema.
#[derive(Debug, Clone)]
pub struct SyntheticCohort {
    pub subjects: usize,
    pub seed: u64,
    pub xrt_rate: f64,
    /// Probability a treated subject received dose at a given site.
    pub site_rate: f64,
    /// Baseline probability of each panel gene being mutated.
    pub gene_rate: f64,
    pub injection: Option<Injection>,
    /// Sites that never receive dose.
    pub silent_sites: Vec<Site>,
    /// (site, gene) pairs where the gene is only ever mutated without dose at the site.
    pub unsupported_pairs: Vec<(Site, Gene)>,
}

impl Default for SyntheticCohort {
    fn default() -> Self {
        Self {
            subjects: 400,
            seed: 7,
            xrt_rate: 0.7,
            site_rate: 0.4,
            gene_rate: 0.12,
            injection: None,
            silent_sites: Vec::new(),
            unsupported_pairs: Vec::new(),
        }
    }
}

const RACES: [Option<&str>; 6] = [
    Some("WHITE"),
    Some("WHITE"),
    Some("BLACK OR AFRICAN AMERICAN"),
    Some("ASIAN"),
    Some("UNKNOWN"),
    None,
];
const SMOKING: [Option<&str>; 5] = [Some("0"), Some("1"), Some("never"), Some("former"), None];
const TUMORS: [&str; 6] = ["Breast", "Breast", "Lung", "Lung", "Prostate", "Sarcoma"];
const MODALITIES: [Option<&str>; 3] = [Some("IMRT"), Some("3D"), None];

impl SyntheticCohort {
    pub fn with_subjects(mut self, subjects: usize) -> Self {
        self.subjects = subjects;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_injection(mut self, site: Site, gene: Gene, log_odds_per_unit: f64) -> Self {
        self.injection = Some(Injection {
            site,
            gene,
            log_odds_per_unit,
        });
        self
    }

    pub fn with_silent_site(mut self, site: Site) -> Self {
        self.silent_sites.push(site);
        self
    }

    pub fn with_unsupported_pair(mut self, site: Site, gene: Gene) -> Self {
        self.unsupported_pairs.push((site, gene));
        self
    }

    /// Generate the raw table.
    pub fn generate(&self) -> DataFrame {
        let n = self.subjects;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let ids: Vec<String> = (0..n).map(|i| format!("S{:05}", i)).collect();
        let ages: Vec<f64> = (0..n).map(|_| rng.gen_range(30.0..80.0)).collect();
        let genders: Vec<&str> = (0..n)
            .map(|_| if rng.gen_bool(0.5) { "Male" } else { "Female" })
            .collect();
        let races: Vec<Option<&str>> = (0..n)
            .map(|_| RACES[rng.gen_range(0..RACES.len())])
            .collect();
        let smoking: Vec<Option<&str>> = (0..n)
            .map(|_| SMOKING[rng.gen_range(0..SMOKING.len())])
            .collect();
        let packyears: Vec<Option<f64>> = (0..n)
            .map(|_| {
                if rng.gen_bool(0.1) {
                    None
                } else if rng.gen_bool(0.4) {
                    Some(0.0)
                } else {
                    Some(rng.gen_range(0.5..60.0))
                }
            })
            .collect();
        let xrt: Vec<bool> = (0..n).map(|_| rng.gen_bool(self.xrt_rate)).collect();
        let modality: Vec<Option<&str>> = (0..n)
            .map(|_| MODALITIES[rng.gen_range(0..MODALITIES.len())])
            .collect();
        let days: Vec<Option<f64>> = (0..n)
            .map(|_| {
                if rng.gen_bool(0.05) {
                    None
                } else {
                    Some(rng.gen_range(-100.0..2000.0f64).round())
                }
            })
            .collect();
        let tumors: Vec<&str> = (0..n)
            .map(|_| TUMORS[rng.gen_range(0..TUMORS.len())])
            .collect();

        let chemo: Vec<Vec<i32>> = schema::CHEMO_CLASSES
            .iter()
            .map(|_| (0..n).map(|_| rng.gen_bool(0.3) as i32).collect())
            .collect();

        let doses: Vec<Vec<f64>> = Site::ALL
            .iter()
            .map(|site| {
                (0..n)
                    .map(|i| {
                        if xrt[i] && !self.silent_sites.contains(site) && rng.gen_bool(self.site_rate)
                        {
                            rng.gen_range(500.0..6000.0f64).round()
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();
        let dose_at = |site: Site, i: usize| -> f64 {
            let idx = Site::ALL.iter().position(|s| *s == site).unwrap_or(0);
            doses[idx][i]
        };

        let genes: Vec<Vec<i32>> = Gene::PANEL
            .iter()
            .map(|gene| {
                (0..n)
                    .map(|i| {
                        let mut p = self.gene_rate;
                        if let Some(inj) = self.injection.filter(|inj| inj.gene == *gene) {
                            let base = (self.gene_rate / (1.0 - self.gene_rate)).ln();
                            let eta = base + inj.log_odds_per_unit * dose_at(inj.site, i) / 100.0;
                            p = 1.0 / (1.0 + (-eta).exp());
                        }
                        let mut mutated = rng.gen_bool(p.clamp(0.0, 1.0));
                        for (site, g) in &self.unsupported_pairs {
                            if g == gene && dose_at(*site, i) > 0.0 {
                                mutated = false;
                            }
                        }
                        mutated as i32
                    })
                    .collect()
            })
            .collect();

        let mutnum: Vec<i64> = (0..n)
            .map(|i| genes.iter().map(|g| g[i] as i64).sum())
            .collect();
        let max_vaf: Vec<Option<f64>> = mutnum
            .iter()
            .map(|m| {
                if *m == 0 {
                    if rng.gen_bool(0.5) {
                        None
                    } else {
                        Some(0.0)
                    }
                } else {
                    Some(rng.gen_range(0.02..0.4))
                }
            })
            .collect();

        let mut columns = vec![
            Column::new(schema::STUDY_ID.into(), ids),
            Column::new(schema::AGE.into(), ages),
            Column::new(schema::GENDER_RAW.into(), genders),
            Column::new(schema::RACE.into(), races),
            Column::new(schema::SMOKING.into(), smoking),
            Column::new(schema::PACKYEARS.into(), packyears),
            Column::new(schema::XRT.into(), xrt.iter().map(|x| *x as i32).collect::<Vec<_>>()),
            Column::new(schema::MODALITY.into(), modality),
            Column::new(schema::DAYS_TO_BLOOD_DRAW.into(), days),
            Column::new(schema::TUMOR_TYPE.into(), tumors),
            Column::new(schema::MUTNUM.into(), mutnum),
            Column::new(schema::MAX_VAF.into(), max_vaf),
        ];
        for (name, values) in schema::CHEMO_CLASSES.iter().zip(chemo) {
            columns.push(Column::new((*name).into(), values));
        }
        for (site, values) in Site::ALL.iter().zip(doses) {
            columns.push(Column::new(site.dose_column().into(), values));
        }
        for (gene, values) in Gene::PANEL.iter().zip(genes) {
            columns.push(Column::new(gene.symbol().into(), values));
        }
        DataFrame::new(columns).unwrap()
    }

    /// Generate and derive.
    pub fn enriched(&self) -> DataFrame {
        derive_features(&self.generate()).unwrap().0
    }

    /// Enriched radiotherapy cohort with a known blood-draw date.
    pub fn xrt_cohort(&self) -> Cohort {
        Cohort::build(
            "XRT",
            &self.enriched(),
            CohortFilter::ReceivedRadiotherapy.and(CohortFilter::BloodDrawKnown),
            50,
        )
        .unwrap()
    }
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("test_data.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Assert that a DataFrame has specific columns
pub fn assert_has_columns(df: &DataFrame, expected: &[&str]) {
    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for col in expected {
        assert!(
            columns.contains(&col.to_string()),
            "Expected column '{}' not found in {:?}",
            col,
            columns
        );
    }
}

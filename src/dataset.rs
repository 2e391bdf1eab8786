//! Load, join, and fall back to sample data.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::DashboardConfig;
use crate::data::load_tables;
use crate::join::{join, JoinReport, JoinedTables};
use crate::logging::{self, obj, v_str, Domain};
use crate::sample;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DataSource {
    Files { dir: PathBuf },
    Sample { seed: u64, reason: String },
}

impl DataSource {
    pub fn is_sample(&self) -> bool {
        matches!(self, DataSource::Sample { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub source: DataSource,
    pub tables: JoinedTables,
    pub report: JoinReport,
}

/// Load and join the CSV files in `dir`, surfacing the first error.
pub fn load_dir(dir: &Path, cfg: &DashboardConfig) -> Result<Dataset> {
    let raw = load_tables(dir).with_context(|| format!("loading tables from {}", dir.display()))?;
    let (tables, report) = join(&raw, cfg.join_policy).context("joining facts to dimensions")?;
    Ok(Dataset {
        source: DataSource::Files { dir: dir.to_path_buf() },
        tables,
        report,
    })
}

/// Generate the synthetic constellation and join it.
pub fn sample_dataset(cfg: &DashboardConfig, reason: &str) -> Result<Dataset> {
    let raw = sample::generate(&cfg.sample, cfg.sample_seed);
    // Generated keys always resolve, so the policy cannot reject them.
    let (tables, report) = join(&raw, cfg.join_policy).context("joining sample data")?;
    Ok(Dataset {
        source: DataSource::Sample {
            seed: cfg.sample_seed,
            reason: reason.to_string(),
        },
        tables,
        report,
    })
}

/// Load from `cfg.data_dir`; on any load or join error, warn with the root
/// cause and substitute sample data.
pub fn load_or_sample(cfg: &DashboardConfig) -> Result<Dataset> {
    match load_dir(&cfg.data_dir, cfg) {
        Ok(ds) => {
            logging::info(
                Domain::System,
                "data_loaded",
                obj(&[("dir", v_str(&cfg.data_dir.display().to_string()))]),
            );
            Ok(ds)
        }
        Err(err) => {
            let reason = format!("{:#}", err);
            logging::warn(
                Domain::System,
                "fallback_to_sample",
                obj(&[
                    ("msg", v_str(&format!("could not use {}: {}; showing sample data", cfg.data_dir.display(), reason))),
                    ("dir", v_str(&cfg.data_dir.display().to_string())),
                ]),
            );
            sample_dataset(cfg, &reason)
        }
    }
}

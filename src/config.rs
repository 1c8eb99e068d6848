//! Report configuration, read from an optional JSON file.
//!
//! Every field has a default, so an empty object (or no file at all) gives
//! the standard September report over `data/`.

use crate::error::{KpiError, Result};
use crate::highlight::{september_rules, ThresholdRule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "kpi-dashboard.json";

/// CSV file names, relative to `data_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataFiles {
    pub region_battle: String,
    pub store_kpis: String,
    pub store_retention: String,
    pub store_acb: String,
    pub app_adoption: String,
    pub store_audit: String,
    pub store_reviews: String,
}

impl Default for DataFiles {
    fn default() -> Self {
        Self {
            region_battle: "region_battle.csv".into(),
            store_kpis: "store_kpis.csv".into(),
            store_retention: "store_retention.csv".into(),
            store_acb: "store_acb.csv".into(),
            app_adoption: "app_adoption.csv".into(),
            store_audit: "store_audit.csv".into(),
            store_reviews: "store_reviews.csv".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub files: DataFiles,
    /// Name of the region row that holds the area total.
    pub rollup_region: String,
    pub periods: Vec<String>,
    pub highlight_limit: usize,
    pub highlight_rules: Vec<ThresholdRule>,
    pub trade_in_leaders: usize,
    /// Alternative store spellings used by other datasets.
    pub store_aliases: BTreeMap<String, String>,
    pub preview_rows: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("."),
            files: DataFiles::default(),
            rollup_region: "South".into(),
            periods: vec!["July".into(), "August".into(), "September".into()],
            highlight_limit: 5,
            highlight_rules: september_rules(),
            trade_in_leaders: 2,
            store_aliases: BTreeMap::from([("Merthyr Tydfil".to_string(), "Merthyr".to_string())]),
            preview_rows: 3,
        }
    }
}

impl DashboardConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Use `path` if given, else the default file if present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    info!("no configuration file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.periods.is_empty() {
            return Err(KpiError::InvalidConfig("periods must not be empty".into()));
        }
        if let Some(dup) = self
            .periods
            .iter()
            .enumerate()
            .find_map(|(i, p)| self.periods[..i].contains(p).then_some(p))
        {
            return Err(KpiError::InvalidConfig(format!("period '{dup}' is listed twice")));
        }
        for rule in &self.highlight_rules {
            if !rule.threshold.is_finite() || !rule.weight.is_finite() || rule.weight <= 0.0 {
                return Err(KpiError::InvalidConfig(format!(
                    "highlight rule on '{}' needs a finite threshold and a positive weight",
                    rule.field
                )));
            }
        }
        Ok(())
    }

    pub fn data_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    pub fn output_path(&self, file: &str) -> PathBuf {
        self.output_dir.join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config: DashboardConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.highlight_rules.len(), 6);
        config.validate().unwrap();
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config: DashboardConfig = serde_json::from_str(
            r#"{"highlight_limit": 3, "files": {"store_kpis": "october.csv"}}"#,
        )
        .unwrap();
        assert_eq!(config.highlight_limit, 3);
        assert_eq!(config.files.store_kpis, "october.csv");
        assert_eq!(config.files.store_acb, "store_acb.csv");
        assert_eq!(config.rollup_region, "South");
    }

    #[test]
    fn duplicate_period_is_rejected() {
        let config = DashboardConfig {
            periods: vec!["July".into(), "July".into()],
            ..DashboardConfig::default()
        };
        assert!(matches!(config.validate(), Err(KpiError::InvalidConfig(_))));
    }

    #[test]
    fn non_positive_weight_is_rejected() {
        let mut config = DashboardConfig::default();
        config.highlight_rules[0].weight = 0.0;
        assert!(config.validate().is_err());
    }
}

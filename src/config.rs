//! TOML run configuration.
//!
//! Every field has a default, so an empty file (or no file at all) describes
//! the standard ERCOT 60-day disclosure layout. Command-line flags override
//! file values after loading.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RevenueConfig {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

/// Input locations. Directories left unset are not read.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    /// Resource registry CSV (`Resource_Name`, `Settlement_Point`, ...).
    pub registry: PathBuf,
    /// 60-day DAM Gen Resource Data CSVs.
    pub dam_dir: Option<PathBuf>,
    /// 60-day SCED Gen Resource Data CSVs.
    pub sced_dir: Option<PathBuf>,
    /// 60-day SASM Generation Resource AS Offer Awards CSVs.
    pub sasm_dir: Option<PathBuf>,
    /// Real-time settlement point price tables (`*_{year}.parquet|csv`).
    pub price_dir: Option<PathBuf>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            registry: PathBuf::from("bess_analysis/bess_resources_master_list.csv"),
            dam_dir: None,
            sced_dir: None,
            sasm_dir: None,
            price_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PricingConfig {
    /// $/MWh applied to a dispatch interval with no real-time price.
    pub fallback_energy_price: f64,
    /// SCED dispatch granule.
    pub dispatch_interval_minutes: u32,
    /// Granule of the real-time price tables.
    pub rt_price_interval_minutes: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            fallback_energy_price: 50.0,
            dispatch_interval_minutes: 5,
            rt_price_interval_minutes: 15,
        }
    }
}

impl PricingConfig {
    pub fn dispatch_interval_hours(&self) -> f64 {
        f64::from(self.dispatch_interval_minutes) / 60.0
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Resource type tags that identify energy storage.
    pub storage_resource_types: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            storage_resource_types: vec!["PWRSTR".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Dispatch rows buffered before each accumulation pass.
    pub batch_size: usize,
    /// Worker threads; all cores when unset.
    pub threads: Option<usize>,
    pub show_progress: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: 50_000,
            threads: None,
            show_progress: true,
        }
    }
}

impl RevenueConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pricing = &self.pricing;
        if !pricing.fallback_energy_price.is_finite() {
            return Err(ConfigError::Invalid(
                "pricing.fallback_energy_price must be a finite number".to_string(),
            ));
        }
        for (field, minutes) in [
            ("pricing.dispatch_interval_minutes", pricing.dispatch_interval_minutes),
            ("pricing.rt_price_interval_minutes", pricing.rt_price_interval_minutes),
        ] {
            if minutes == 0 || 60 % minutes != 0 {
                return Err(ConfigError::Invalid(format!(
                    "{field} must divide an hour evenly, got {minutes}"
                )));
            }
        }
        if self.filters.storage_resource_types.is_empty() {
            return Err(ConfigError::Invalid(
                "filters.storage_resource_types must not be empty".to_string(),
            ));
        }
        if self.processing.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "processing.batch_size must be > 0".to_string(),
            ));
        }
        if self.processing.threads == Some(0) {
            return Err(ConfigError::Invalid(
                "processing.threads must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RevenueConfig::from_toml_str("").unwrap();
        assert_eq!(config.pricing.fallback_energy_price, 50.0);
        assert_eq!(config.pricing.dispatch_interval_minutes, 5);
        assert_eq!(config.processing.batch_size, 50_000);
        assert_eq!(config.filters.storage_resource_types, vec!["PWRSTR"]);
        assert!((config.pricing.dispatch_interval_hours() - 5.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_sections() {
        let config = RevenueConfig::from_toml_str(
            r#"
            [sources]
            registry = "data/registry.csv"
            dam_dir = "data/dam"

            [pricing]
            fallback_energy_price = 35.5
            "#,
        )
        .unwrap();
        assert_eq!(config.sources.registry, PathBuf::from("data/registry.csv"));
        assert_eq!(config.sources.dam_dir, Some(PathBuf::from("data/dam")));
        assert!(config.sources.sced_dir.is_none());
        assert_eq!(config.pricing.fallback_energy_price, 35.5);
        assert_eq!(config.pricing.rt_price_interval_minutes, 15);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = RevenueConfig::from_toml_str("[pricing]\nfallback = 10.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation() {
        let err =
            RevenueConfig::from_toml_str("[pricing]\nrt_price_interval_minutes = 7\n").unwrap_err();
        assert!(err.to_string().contains("rt_price_interval_minutes"));

        let err = RevenueConfig::from_toml_str("[processing]\nbatch_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}

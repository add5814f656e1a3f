//! Analysis configuration
//!
//! Loaded from TOML with two layers, like the rest of the workspace's
//! file-based settings:
//! 1. An explicit path, or the user override at
//!    `~/.local/share/survey-analysis/config/analysis.toml`
//! 2. The defaults embedded from `config/analysis.toml`
//!
//! ```toml
//! [benchmarks]
//! scope = "town"
//! area = "城关镇"
//!
//! [keywords]
//! pet = ["宠物", "猫粮"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::analysis::keywords::{
    KeywordRules, DEFAULT_CAR, DEFAULT_DIGITAL, DEFAULT_ENTERTAINMENT, DEFAULT_PET,
    DEFAULT_RENOVATION,
};
use crate::error::{Error, Result};
use crate::models::BenchmarkScope;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/analysis.toml");

/// Tunable profile thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileThresholds {
    /// Distinct prefix-31 item names needed for the foodie tag
    pub foodie_min_items: usize,
    /// Pet-keyword spend above which the pet-owner tag applies
    pub pet_spend_threshold: f64,
}

impl Default for ProfileThresholds {
    fn default() -> Self {
        Self {
            foodie_min_items: 10,
            pet_spend_threshold: 500.0,
        }
    }
}

/// Resolved analysis configuration
#[derive(Debug, Clone, Default)]
pub struct AnalysisConfig {
    pub benchmark_scope: BenchmarkScope,
    pub profile: ProfileThresholds,
    pub keywords: KeywordRules,
    /// Where the config was read from (None = embedded defaults)
    pub source: Option<PathBuf>,
}

impl AnalysisConfig {
    /// Load from an explicit path, the user override, or the embedded defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let override_path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };

        match override_path {
            Some(p) => {
                let content = fs::read_to_string(&p).map_err(|e| {
                    Error::Config(format!("Failed to read config {}: {}", p.display(), e))
                })?;
                let mut config = parse_config(&content)?;
                debug!(path = %p.display(), "Loaded analysis config");
                config.source = Some(p);
                Ok(config)
            }
            None => Self::embedded(),
        }
    }

    /// The defaults compiled into the binary
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| {
        d.join("survey-analysis")
            .join("config")
            .join("analysis.toml")
    })
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    benchmarks: Option<RawBenchmarks>,
    profile: Option<RawProfile>,
    keywords: Option<RawKeywords>,
}

#[derive(Debug, Deserialize)]
struct RawBenchmarks {
    scope: Option<String>,
    area: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    foodie_min_items: Option<usize>,
    pet_spend_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawKeywords {
    digital: Option<Vec<String>>,
    pet: Option<Vec<String>>,
    car: Option<Vec<String>>,
    renovation: Option<Vec<String>>,
    entertainment: Option<Vec<String>>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<AnalysisConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = AnalysisConfig::default();

    if let Some(benchmarks) = raw.benchmarks {
        let area = benchmarks.area.filter(|a| !a.trim().is_empty());
        config.benchmark_scope = match (benchmarks.scope.as_deref(), area) {
            (None, _) | (Some("all"), _) => BenchmarkScope::All,
            (Some("town"), Some(area)) => BenchmarkScope::Town(area),
            (Some("village"), Some(area)) => BenchmarkScope::Village(area),
            (Some(scope @ ("town" | "village")), None) => {
                return Err(Error::Config(format!(
                    "benchmarks.scope = \"{}\" requires benchmarks.area",
                    scope
                )))
            }
            (Some(other), _) => {
                return Err(Error::Config(format!(
                    "Unknown benchmarks.scope: {}",
                    other
                )))
            }
        };
    }

    if let Some(profile) = raw.profile {
        if let Some(items) = profile.foodie_min_items {
            config.profile.foodie_min_items = items;
        }
        if let Some(threshold) = profile.pet_spend_threshold {
            config.profile.pet_spend_threshold = threshold;
        }
    }

    if let Some(keywords) = raw.keywords {
        let list = |value: Option<Vec<String>>, fallback: &[&str]| {
            value.unwrap_or_else(|| fallback.iter().map(|s| s.to_string()).collect())
        };
        config.keywords = KeywordRules::from_lists(
            &list(keywords.digital, DEFAULT_DIGITAL),
            &list(keywords.pet, DEFAULT_PET),
            &list(keywords.car, DEFAULT_CAR),
            &list(keywords.renovation, DEFAULT_RENOVATION),
            &list(keywords.entertainment, DEFAULT_ENTERTAINMENT),
        )?;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_config_parses() {
        let config = AnalysisConfig::embedded().unwrap();
        assert_eq!(config.benchmark_scope, BenchmarkScope::All);
        assert_eq!(config.profile, ProfileThresholds::default());
        assert!(config.keywords.digital.matches("话费"));
        assert!(config.source.is_none());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = parse_config(
            r#"
            [benchmarks]
            scope = "town"
            area = "城关镇"

            [keywords]
            pet = ["猫砂"]
            "#,
        )
        .unwrap();

        assert_eq!(config.benchmark_scope, BenchmarkScope::Town("城关镇".into()));
        assert_eq!(config.profile.foodie_min_items, 10);
        assert!(config.keywords.pet.matches("猫砂盆"));
        assert!(!config.keywords.pet.matches("狗粮"));
        assert!(config.keywords.car.matches("停车费"));
    }

    #[test]
    fn test_scope_requires_area() {
        let err = parse_config("[benchmarks]\nscope = \"village\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(parse_config("[benchmarks]\nscope = \"county\"\n").is_err());
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[profile]\nfoodie_min_items = 4").unwrap();

        let config = AnalysisConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.profile.foodie_min_items, 4);
        assert_eq!(config.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            parse_config("[profile\n"),
            Err(Error::Config(_))
        ));
    }
}

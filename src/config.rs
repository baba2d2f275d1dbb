//! Configuration module.
//!
//! Handles loading, validating, and merging `metaname.toml`. Stock defaults are
//! serialized to a TOML table, the user's file is merged on top, and the result
//! is deserialized and validated. Command-line flags override the merged values.
//!
//! ## Config File Location
//!
//! Place `metaname.toml` in the source directory (the one being scanned):
//!
//! ```text
//! images/
//! ├── metaname.toml
//! ├── 00001-1234567.png
//! └── 00002-1234568.png
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [partial_match]
//! enabled = false           # Token-partial matching for every rule
//! min_match_ratio = 0.7     # Minimum fraction of tokens (0.10 - 0.99)
//! token_separator = ","     # Splits keywords into tokens
//!
//! [limits]
//! max_images = 3000
//! max_file_bytes = 10485760      # 10 MB
//! max_total_bytes = 6442450944   # 6 GB
//!
//! [export]
//! batch_size = 100          # Files per output batch
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::matching::{MIN_MATCH_RATIO_RANGE, PartialMatchSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up in the source directory.
pub const CONFIG_FILENAME: &str = "metaname.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from `metaname.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenameConfig {
    /// Partial (token) matching settings.
    pub partial_match: PartialMatchSettings,
    /// Ingestion limits applied by the scanner.
    pub limits: LimitsConfig,
    /// Export batching.
    pub export: ExportConfig,
    /// Parallel extraction settings.
    pub processing: ProcessingConfig,
}

impl RenameConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = MIN_MATCH_RATIO_RANGE;
        let ratio = self.partial_match.min_match_ratio;
        if !(min..=max).contains(&ratio) {
            return Err(ConfigError::Validation(format!(
                "partial_match.min_match_ratio must be {min:.2}-{max:.2}, got {ratio}"
            )));
        }
        if self.partial_match.token_separator.is_empty() {
            return Err(ConfigError::Validation(
                "partial_match.token_separator must not be empty".into(),
            ));
        }
        if self.limits.max_images == 0 {
            return Err(ConfigError::Validation(
                "limits.max_images must be non-zero".into(),
            ));
        }
        if self.export.batch_size == 0 {
            return Err(ConfigError::Validation(
                "export.batch_size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Ingestion limits. Files over the limits are rejected before matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum number of images accepted in one scan.
    pub max_images: usize,
    /// Maximum size of a single file, in bytes.
    pub max_file_bytes: u64,
    /// Maximum combined size of all accepted files, in bytes.
    pub max_total_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_images: 3000,
            max_file_bytes: 10 * 1024 * 1024,
            max_total_bytes: 6 * 1024 * 1024 * 1024,
        }
    }
}

/// Export batching settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Files per batch. Filename collisions are resolved within a batch.
    pub batch_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel extraction workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(RenameConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `metaname.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<RenameConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RenameConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `metaname.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<RenameConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    if overlay.is_some() {
        log::info!("using {}", dir.join(CONFIG_FILENAME).display());
    }
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `metaname.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# metaname configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file in the directory you scan, named metaname.toml.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Partial (token) matching
# ---------------------------------------------------------------------------
[partial_match]
# Run token matching for every rule. When false, only rules that opt in
# (partial_match_enabled) are token-matched.
enabled = false

# Minimum fraction of a keyword's tokens that must appear in one metadata
# field. Inclusive, between 0.10 and 0.99.
min_match_ratio = 0.7

# Separator that splits a keyword into tokens.
token_separator = ","

# ---------------------------------------------------------------------------
# Ingestion limits
# ---------------------------------------------------------------------------
[limits]
max_images = 3000
# 10 MB per file
max_file_bytes = 10485760
# 6 GB for the whole scan
max_total_bytes = 6442450944

# ---------------------------------------------------------------------------
# Export
# ---------------------------------------------------------------------------
[export]
# Files per output batch. Name collisions get a _1, _2, ... suffix within a batch.
batch_size = 100

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel metadata-extraction workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = RenameConfig::default();
        assert!(!config.partial_match.enabled);
        assert_eq!(config.partial_match.min_match_ratio, 0.7);
        assert_eq!(config.partial_match.token_separator, ",");
        assert_eq!(config.limits.max_images, 3000);
        assert_eq!(config.limits.max_file_bytes, 10_485_760);
        assert_eq!(config.limits.max_total_bytes, 6_442_450_944);
        assert_eq!(config.export.batch_size, 100);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn default_config_validates() {
        assert!(RenameConfig::default().validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
[partial_match]
enabled = true
"##;
        let config: RenameConfig = toml::from_str(toml).unwrap();
        assert!(config.partial_match.enabled);
        // Default values preserved
        assert_eq!(config.partial_match.min_match_ratio, 0.7);
        assert_eq!(config.export.batch_size, 100);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = r##"
[partial_match]
min_ratio = 0.5
"##;
        assert!(toml::from_str::<RenameConfig>(toml).is_err());
    }

    #[test]
    fn ratio_out_of_range_is_invalid() {
        let mut config = RenameConfig::default();
        config.partial_match.min_match_ratio = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.partial_match.min_match_ratio = 0.05;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.partial_match.min_match_ratio = 0.10;
        assert!(config.validate().is_ok());
        config.partial_match.min_match_ratio = 0.99;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_separator_is_invalid() {
        let mut config = RenameConfig::default();
        config.partial_match.token_separator = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn zero_batch_size_is_invalid() {
        let mut config = RenameConfig::default();
        config.export.batch_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: RenameConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, RenameConfig::default());
    }

    #[test]
    fn merge_toml_overlays_nested_keys() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(10_000),
        };
        assert_eq!(effective_threads(&config), cores);
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, RenameConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r##"
[partial_match]
min_match_ratio = 0.5
token_separator = "|"

[export]
batch_size = 10
"##,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.partial_match.min_match_ratio, 0.5);
        assert_eq!(config.partial_match.token_separator, "|");
        assert_eq!(config.export.batch_size, 10);
        // Unspecified values should be defaults
        assert_eq!(config.limits.max_images, 3000);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "this is not valid toml [[[").unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_out_of_range_is_validation_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[partial_match]\nmin_match_ratio = 2.0\n",
        )
        .unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}

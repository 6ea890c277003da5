//! Batch configuration module.
//!
//! Handles loading and sanitizing `config.toml`. Stock defaults are the base
//! layer; a `config.toml` in the source directory overrides any subset of
//! keys. Command-line flags override both (see `main.rs`).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [detection]
//! white_threshold = 245     # Luminance threshold for margin pixels (200-254)
//!
//! [batch]
//! match_first_crop = false  # Propagate the first image's crop to the others
//!
//! [export]
//! max_dimension = 500       # Longest side of exported JPEGs, in pixels
//! base_name = "card"        # Output files are named {base_name}{index}.jpg
//! start_index = 1           # Index of the first exported file
//! quality = 92              # JPEG quality (1-100)
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Graceful Values
//!
//! Numbers that are out of range are never an error. They are replaced with
//! the documented default (or clamped, for the threshold and quality) by
//! [`CropConfig::sanitized`]. Malformed TOML and unknown keys are still
//! rejected, to catch typos early.

use crate::detection::WhiteThreshold;
use crate::imaging::Quality;
use crate::naming;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Default longest side of exported images.
pub const DEFAULT_MAX_DIMENSION: u32 = 500;
/// Default index of the first exported file.
pub const DEFAULT_START_INDEX: i64 = 1;

/// Configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    /// Border detection settings.
    pub detection: DetectionConfig,
    /// Batch-wide crop behaviour.
    pub batch: BatchConfig,
    /// Output naming and sizing.
    pub export: ExportConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

/// Border detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionConfig {
    /// Luminance threshold for a margin pixel; clamped to 200-254.
    pub white_threshold: i64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            white_threshold: WhiteThreshold::DEFAULT as i64,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Propagate the first image's crop to every non-manual image.
    pub match_first_crop: bool,
}

/// Export settings as written by the user. See [`ExportSettings`] for the
/// sanitized form the pipeline consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Longest side in pixels. Non-finite or non-positive → 500; otherwise rounded.
    pub max_dimension: f64,
    /// Output file prefix. Whitespace runs and path characters become `_`; empty → `card`.
    pub base_name: String,
    /// Index of the first exported file.
    pub start_index: i64,
    /// JPEG quality, clamped to 1-100.
    pub quality: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION as f64,
            base_name: naming::DEFAULT_BASE_NAME.to_string(),
            start_index: DEFAULT_START_INDEX,
            quality: Quality::default().value(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up), at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Export settings after sanitizing: every value is usable as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub max_dimension: u32,
    pub base_name: String,
    pub start_index: i64,
    pub quality: Quality,
}

impl Default for ExportSettings {
    fn default() -> Self {
        ExportConfig::default().settings()
    }
}

/// Sanitize a user-supplied max dimension.
pub fn sanitize_max_dimension(raw: f64) -> u32 {
    if raw.is_finite() && raw > 0.0 {
        (raw.round() as u32).max(1)
    } else {
        DEFAULT_MAX_DIMENSION
    }
}

impl ExportConfig {
    pub fn settings(&self) -> ExportSettings {
        ExportSettings {
            max_dimension: sanitize_max_dimension(self.max_dimension),
            base_name: naming::sanitize_base_name(&self.base_name),
            start_index: self.start_index,
            quality: Quality::new(self.quality),
        }
    }
}

impl CropConfig {
    pub fn white_threshold(&self) -> WhiteThreshold {
        WhiteThreshold::new(self.detection.white_threshold)
    }

    /// A copy with every out-of-range value replaced by its default or clamp.
    pub fn sanitized(&self) -> Self {
        let export = self.export.settings();
        Self {
            detection: DetectionConfig {
                white_threshold: self.white_threshold().value() as i64,
            },
            batch: self.batch.clone(),
            export: ExportConfig {
                max_dimension: export.max_dimension as f64,
                base_name: export.base_name,
                start_index: export.start_index,
                quality: export.quality.value(),
            },
            processing: self.processing.clone(),
        }
    }
}

// =============================================================================
// Config loading and merging
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(CropConfig::default()).expect("default config must serialize")
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

/// Load a `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, deserialize, sanitize.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<CropConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CropConfig = merged.try_into()?;
    Ok(config.sanitized())
}

/// Load config from `config.toml` in the given directory.
pub fn load_config(root: &Path) -> Result<CropConfig, ConfigError> {
    resolve_config(load_raw_config(root)?)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# cardcrop configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as config.toml in the directory holding your scans.
# Unknown keys will cause an error; out-of-range numbers fall back to defaults.

# ---------------------------------------------------------------------------
# Border detection
# ---------------------------------------------------------------------------
[detection]
# Luminance a pixel must reach to count as part of the white margin.
# Raise it for very clean white backgrounds, lower it for greyish scans.
# Clamped to 200-254.
white_threshold = 245

# ---------------------------------------------------------------------------
# Batch behaviour
# ---------------------------------------------------------------------------
[batch]
# Apply the first image's crop to every other image that has not been
# adjusted by hand, adapted to each image's own size.
match_first_crop = false

# ---------------------------------------------------------------------------
# Export
# ---------------------------------------------------------------------------
[export]
# Longest side of exported images in pixels. Smaller crops are not upscaled.
max_dimension = 500

# Files are written as {base_name}{index}.jpg. Whitespace and path characters become "_".
base_name = "card"

# Index of the first exported file. Later exports continue from where the
# previous one stopped unless --start-index is given.
start_index = 1

# JPEG quality (1 = worst, 100 = best).
quality = 92

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
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
        let config = CropConfig::default();
        assert_eq!(config.detection.white_threshold, 245);
        assert!(!config.batch.match_first_crop);
        assert_eq!(config.export.max_dimension, 500.0);
        assert_eq!(config.export.base_name, "card");
        assert_eq!(config.export.start_index, 1);
        assert_eq!(config.export.quality, 92);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[export]
base_name = "tarot"
"#;
        let config: CropConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.export.base_name, "tarot");
        // Default values preserved
        assert_eq!(config.export.max_dimension, 500.0);
        assert_eq!(config.detection.white_threshold, 245);
    }

    #[test]
    fn integer_max_dimension_parses_as_float() {
        let config: CropConfig = toml::from_str("[export]\nmax_dimension = 800\n").unwrap();
        assert_eq!(config.export.settings().max_dimension, 800);
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<CropConfig, _> = toml::from_str("[export]\ncolour = 1\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Sanitizing
    // =========================================================================

    #[test]
    fn threshold_out_of_range_is_clamped() {
        let mut config = CropConfig::default();
        config.detection.white_threshold = 999;
        assert_eq!(config.sanitized().detection.white_threshold, 254);
        config.detection.white_threshold = 12;
        assert_eq!(config.white_threshold().value(), 200);
    }

    #[test]
    fn max_dimension_falls_back_to_default() {
        assert_eq!(sanitize_max_dimension(0.0), 500);
        assert_eq!(sanitize_max_dimension(-3.0), 500);
        assert_eq!(sanitize_max_dimension(f64::NAN), 500);
        assert_eq!(sanitize_max_dimension(f64::INFINITY), 500);
        assert_eq!(sanitize_max_dimension(799.6), 800);
        assert_eq!(sanitize_max_dimension(0.2), 1);
    }

    #[test]
    fn export_settings_sanitize_name_and_quality() {
        let export = ExportConfig {
            base_name: "  my  deck ".to_string(),
            quality: 0,
            ..Default::default()
        };
        let settings = export.settings();
        assert_eq!(settings.base_name, "my_deck");
        assert_eq!(settings.quality.value(), 1);
    }

    #[test]
    fn effective_threads_capped_at_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(99_999),
        };
        assert_eq!(effective_threads(&config), cores);
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.detection.white_threshold, 245);
        assert_eq!(config.export.base_name, "card");
    }

    #[test]
    fn load_config_reads_and_sanitizes_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[detection]
white_threshold = 260

[batch]
match_first_crop = true

[export]
max_dimension = -1
base_name = ""
start_index = 7
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.detection.white_threshold, 254);
        assert!(config.batch.match_first_crop);
        assert_eq!(config.export.max_dimension, 500.0);
        assert_eq!(config.export.base_name, "card");
        assert_eq!(config.export.start_index, 7);
        // untouched key keeps stock default
        assert_eq!(config.export.quality, 92);
    }

    #[test]
    fn load_config_invalid_toml_errors() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "[export\nbase_name = 1").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn merge_toml_overlay_wins() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: CropConfig = toml::from_str(stock_config_toml()).unwrap();
        let default = CropConfig::default();
        assert_eq!(
            config.detection.white_threshold,
            default.detection.white_threshold
        );
        assert_eq!(config.export.max_dimension, default.export.max_dimension);
        assert_eq!(config.export.base_name, default.export.base_name);
        assert_eq!(config.export.start_index, default.export.start_index);
        assert_eq!(config.export.quality, default.export.quality);
        assert_eq!(config.batch.match_first_crop, default.batch.match_first_crop);
    }
}

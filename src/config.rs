//! Configuration management for the prediction pipeline

use crate::models::inference::DEFAULT_DECISION_THRESHOLD;
use crate::validation::ColumnPolicy;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "PIPELINE_CONFIG";

/// Model artifact format
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// Pick from the file extension (`.onnx` or `.json`)
    #[default]
    Auto,
    /// Exported gradient-boosted model run through ONNX Runtime
    Onnx,
    /// Logistic-regression coefficients stored as JSON
    Logistic,
}

/// Concrete backend a model file is loaded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Onnx,
    Logistic,
}

impl ModelFormat {
    /// Settle `Auto` against the model path.
    pub fn resolve(self, path: &Path) -> Result<ArtifactKind> {
        match self {
            ModelFormat::Onnx => Ok(ArtifactKind::Onnx),
            ModelFormat::Logistic => Ok(ArtifactKind::Logistic),
            ModelFormat::Auto => {
                let extension = path
                    .extension()
                    .map(|e| e.to_string_lossy().to_ascii_lowercase());
                match extension.as_deref() {
                    Some("onnx") => Ok(ArtifactKind::Onnx),
                    Some("json") => Ok(ArtifactKind::Logistic),
                    _ => anyhow::bail!(
                        "cannot infer model format from {}; set model.format to \"onnx\" or \"logistic\"",
                        path.display()
                    ),
                }
            }
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub io: IoConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Path to the model artifact
    pub path: String,
    /// Artifact format
    #[serde(default)]
    pub format: ModelFormat,
    /// Training-time feature metadata (default: `feature_info.json` beside the model)
    #[serde(default)]
    pub metadata_path: Option<String>,
    /// Display name (default: file stem)
    #[serde(default)]
    pub name: Option<String>,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "models/dropout_xgboost.onnx".to_string(),
            format: ModelFormat::Auto,
            metadata_path: None,
            name: None,
            onnx_threads: default_onnx_threads(),
        }
    }
}

/// Upload validation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationConfig {
    /// Treatment of columns outside the schema, for every request
    #[serde(default)]
    pub column_policy: ColumnPolicy,
    /// Graduate when P(Graduate) is above this
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,
}

fn default_decision_threshold() -> f64 {
    DEFAULT_DECISION_THRESHOLD
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            column_policy: ColumnPolicy::default(),
            decision_threshold: default_decision_threshold(),
        }
    }
}

/// Input/output file configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IoConfig {
    /// Field delimiter: "auto", ",", ";", "tab"
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Directory for result files
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Append P(Dropout) after P(Graduate)
    #[serde(default = "default_true")]
    pub include_dropout_probability: bool,
    /// Write a JSON run report beside each result file
    #[serde(default = "default_true")]
    pub write_report: bool,
}

fn default_delimiter() -> String {
    "auto".to_string()
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            output_dir: default_output_dir(),
            include_dropout_probability: true,
            write_report: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `$PIPELINE_CONFIG` or the default file
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path, with `PIPELINE__SECTION__KEY`
    /// environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("PIPELINE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.validation.decision_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            anyhow::bail!("validation.decision_threshold must be in (0, 1), got {}", threshold);
        }
        if self.model.onnx_threads == 0 {
            anyhow::bail!("model.onnx_threads must be at least 1");
        }
        crate::io::Delimiter::parse(&self.io.delimiter)
            .with_context(|| format!("invalid io.delimiter {:?}", self.io.delimiter))?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            validation: ValidationConfig::default(),
            io: IoConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.model.path, "models/dropout_xgboost.onnx");
        assert_eq!(config.validation.column_policy, ColumnPolicy::DropExtras);
        assert_eq!(config.validation.decision_threshold, 0.5);
        assert_eq!(config.io.delimiter, "auto");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_format_resolution() {
        assert_eq!(
            ModelFormat::Auto.resolve(Path::new("m/model.ONNX")).unwrap(),
            ArtifactKind::Onnx
        );
        assert_eq!(
            ModelFormat::Auto.resolve(Path::new("m/model.json")).unwrap(),
            ArtifactKind::Logistic
        );
        assert!(ModelFormat::Auto.resolve(Path::new("m/model.sav")).is_err());
        assert_eq!(
            ModelFormat::Onnx.resolve(Path::new("m/model.bin")).unwrap(),
            ArtifactKind::Onnx
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[model]
path = "models/dropout_logistic.json"

[validation]
column_policy = "strict_columns"
decision_threshold = 0.6

[io]
delimiter = ";"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.model.format, ModelFormat::Auto);
        assert_eq!(config.validation.column_policy, ColumnPolicy::StrictColumns);
        assert_eq!(config.validation.decision_threshold, 0.6);
        assert_eq!(config.io.delimiter, ";");
        assert!(config.io.write_report);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_threshold_is_rejected() {
        let mut config = AppConfig::default();
        config.validation.decision_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}

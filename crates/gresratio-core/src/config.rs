//! Host settings for the admission facade

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Policy file name used when none is configured
pub const DEFAULT_POLICY_FILE: &str = "job_submit_ratio_config.toml";

/// Settings for running admission checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Policy file location
    pub policy_path: PathBuf,
    /// When to re-read the policy file
    pub reload: ReloadMode,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            policy_path: PathBuf::from(DEFAULT_POLICY_FILE),
            reload: ReloadMode::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AdmissionConfig {
    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }
}

/// Policy reload strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReloadMode {
    /// Read and parse the file on every call
    #[default]
    Always,
    /// Reuse the last parse while the file's mtime and size are unchanged
    OnChange,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (full or compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "full".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_admission_config() {
        let config = AdmissionConfig::default();
        assert_eq!(config.policy_path, PathBuf::from(DEFAULT_POLICY_FILE));
        assert_eq!(config.reload, ReloadMode::Always);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_admission_config_parse() {
        let toml_str = r#"
policy_path = "/etc/slurm/job_submit_ratio_config.toml"
reload = "on-change"

[logging]
level = "debug"
"#;
        let config: AdmissionConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.policy_path,
            PathBuf::from("/etc/slurm/job_submit_ratio_config.toml")
        );
        assert_eq!(config.reload, ReloadMode::OnChange);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "full");
    }

    #[test]
    fn test_admission_config_rejects_bad_reload() {
        let err = toml::from_str::<AdmissionConfig>("reload = \"sometimes\"").unwrap_err();
        let err: ConfigError = err.into();
        assert!(matches!(err, ConfigError::Settings(_)));
    }
}

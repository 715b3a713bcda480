//! Error types for gresratio

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for gresratio
#[derive(Error, Debug)]
pub enum GresRatioError {
    /// Policy could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for gresratio operations
pub type GresRatioResult<T> = Result<T, GresRatioError>;

/// Fatal policy loading failures. No decision can be made without a policy.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Policy file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A sectioned file never declared the required section
    #[error("'{0}' not found in config file")]
    MissingSection(&'static str),

    /// Host settings file could not be decoded
    #[error("invalid settings: {0}")]
    Settings(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Settings(err.to_string())
    }
}

/// Malformed resource request descriptor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// Descriptor matches neither `gpu:<name>:<count>` nor `gpu:<count>`
    #[error("unrecognized GRES '{0}', expected gpu:<count> or gpu:<name>:<count>")]
    Unrecognized(String),

    /// GPU count parsed but is below one
    #[error("invalid GPU number {count} in '{descriptor}'")]
    NonPositiveCount { descriptor: String, count: i64 },

    /// Card name exceeds the maximum field length
    #[error("card name in '{descriptor}' exceeds {max} bytes")]
    NameTooLong { descriptor: String, max: usize },
}

/// A single malformed policy line. Logged and skipped, never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line_number}: {kind}")]
pub struct ParseWarning {
    /// 1-based line number in the policy file
    pub line_number: usize,
    /// The offending line, trimmed
    pub line: String,
    /// What was wrong with it
    pub kind: ParseWarningKind,
}

/// Reasons a policy line is skipped
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseWarningKind {
    #[error("no value found for '{0}'")]
    MissingValue(&'static str),

    #[error("no card name found")]
    MissingCardName,

    #[error("'{value}' is not a valid number for {field}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("'{value}' is not a valid boolean for {key}")]
    InvalidBoolean { key: String, value: String },

    #[error("{field} exceeds {max} bytes")]
    TooLong { field: &'static str, max: usize },

    #[error("min {min} is greater than max {max}")]
    MinExceedsMax { min: u32, max: u32 },

    #[error("malformed card record: {0}")]
    MalformedCard(String),

    #[error("unknown setting '{0}'")]
    UnknownSetting(String),

    #[error("card definitions must not mix ratio and bounds styles")]
    MixedDialect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GresRatioError::Config(ConfigError::MissingSection("[gresratio]"));
        assert_eq!(
            err.to_string(),
            "Configuration error: '[gresratio]' not found in config file"
        );
    }

    #[test]
    fn test_error_from_config() {
        let read = ConfigError::Read {
            path: PathBuf::from("/etc/slurm/job_submit_ratio_config.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        let err: GresRatioError = read.into();
        assert!(err
            .to_string()
            .contains("failed to read /etc/slurm/job_submit_ratio_config.toml"));
    }

    #[test]
    fn test_parse_warning_display() {
        let warning = ParseWarning {
            line_number: 7,
            line: "card. = 2".to_string(),
            kind: ParseWarningKind::MissingCardName,
        };
        assert_eq!(warning.to_string(), "line 7: no card name found");
    }
}

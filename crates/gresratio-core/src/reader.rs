//! Reading policy files from disk

use std::path::Path;

use crate::error::ConfigError;
use crate::parser::{parse_policy_report, ParsedPolicy};
use crate::policy::PolicySet;

/// Read the raw text of a policy file. Invalid UTF-8 is replaced, so a bad
/// byte only spoils the line it sits on.
pub fn read_policy_text(path: &Path) -> Result<String, ConfigError> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read and parse a policy file, keeping parse warnings
pub fn load_policy(path: &Path) -> Result<ParsedPolicy, ConfigError> {
    let text = read_policy_text(path)?;
    parse_policy_report(&text)
}

impl PolicySet {
    /// Load a policy from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        load_policy(path).map(|parsed| parsed.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "partition = lr6").unwrap();
        writeln!(file, "card.A40 = 16").unwrap();

        let policy = PolicySet::from_file(file.path()).unwrap();
        assert_eq!(policy.monitored_partition, "lr6");
        assert!(policy.find_card("A40").is_some());
    }

    #[test]
    fn test_invalid_utf8_is_not_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"# caf\xe9 GPUs\ncard.V100 = 2\ncard.\xff = 4\n")
            .unwrap();

        let parsed = load_policy(file.path()).unwrap();
        assert_eq!(parsed.policy.cards.len(), 1);
        assert!(parsed.policy.find_card("V100").is_some());
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].line_number, 3);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = PolicySet::from_file(&path).unwrap_err();
        match err {
            ConfigError::Read { path: reported, source } => {
                assert_eq!(reported, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

//! Policy snapshot cache

use arc_swap::ArcSwapOption;
use gresratio_core::{ConfigError, PolicySet, ReloadMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// What identifies one version of the policy file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileFingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileFingerprint {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

struct CachedPolicy {
    fingerprint: FileFingerprint,
    policy: Arc<PolicySet>,
}

/// Loads the policy file, optionally reusing the last parse.
///
/// Snapshots are swapped whole, so a reader holding an `Arc<PolicySet>` is
/// never affected by a concurrent reload.
pub struct PolicyCache {
    /// Policy file location
    path: PathBuf,
    /// When to re-read the file
    mode: ReloadMode,
    /// Last successful parse (on-change mode only)
    current: ArcSwapOption<CachedPolicy>,
}

impl PolicyCache {
    /// Create a new policy cache
    pub fn new(path: impl Into<PathBuf>, mode: ReloadMode) -> Self {
        Self {
            path: path.into(),
            mode,
            current: ArcSwapOption::empty(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a policy at least as fresh as the file on disk
    pub fn load(&self) -> Result<Arc<PolicySet>, ConfigError> {
        match self.mode {
            ReloadMode::Always => Ok(Arc::new(PolicySet::from_file(&self.path)?)),
            ReloadMode::OnChange => self.load_if_changed(),
        }
    }

    /// Drop the cached snapshot so the next load re-reads the file
    pub fn invalidate(&self) {
        self.current.store(None);
    }

    fn load_if_changed(&self) -> Result<Arc<PolicySet>, ConfigError> {
        let fingerprint = FileFingerprint::of(&self.path)?;

        if let Some(cached) = self
            .current
            .load_full()
            .filter(|cached| cached.fingerprint == fingerprint)
        {
            return Ok(Arc::clone(&cached.policy));
        }

        let policy = Arc::new(PolicySet::from_file(&self.path)?);
        debug!(
            path = %self.path.display(),
            cards = policy.cards.len(),
            "Reloaded policy"
        );

        self.current.store(Some(Arc::new(CachedPolicy {
            fingerprint,
            policy: Arc::clone(&policy),
        })));

        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_policy(path: &Path, text: &str) {
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_always_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        write_policy(&path, "card.V100 = 2\n");

        let cache = PolicyCache::new(&path, ReloadMode::Always);
        let first = cache.load().unwrap();
        let second = cache.load().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
    }

    #[test]
    fn test_on_change_reuses_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        write_policy(&path, "card.V100 = 2\n");

        let cache = PolicyCache::new(&path, ReloadMode::OnChange);
        let first = cache.load().unwrap();
        let second = cache.load().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_on_change_picks_up_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        write_policy(&path, "card.V100 = 2\n");

        let cache = PolicyCache::new(&path, ReloadMode::OnChange);
        let first = cache.load().unwrap();
        assert_eq!(first.cards.len(), 1);

        write_policy(&path, "card.V100 = 2\ncard.A40 = 16\n");
        let second = cache.load().unwrap();
        assert_eq!(second.cards.len(), 2);

        // The earlier snapshot is untouched
        assert_eq!(first.cards.len(), 1);
    }

    #[test]
    fn test_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        write_policy(&path, "card.V100 = 2\n");

        let cache = PolicyCache::new(&path, ReloadMode::OnChange);
        let first = cache.load().unwrap();
        cache.invalidate();
        let second = cache.load().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        for mode in [ReloadMode::Always, ReloadMode::OnChange] {
            let cache = PolicyCache::new(&path, mode);
            assert!(matches!(cache.load(), Err(ConfigError::Read { .. })));
        }
    }
}

//! Running one operation over several managers.

use cfgsync_git::Progress;

use crate::error::{Error, Result};
use crate::manager::SyncManager;

/// One failed item of a batch.
#[derive(Debug)]
pub struct BatchFailure {
    /// Which item failed.
    pub label: String,
    /// Why it failed.
    pub error: Error,
}

/// Outcome of a batch: successes are counted, failures collected.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Items that succeeded.
    pub succeeded: usize,
    /// Items that failed, in visiting order.
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    /// Whether every item succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of successes, or all failures as one `Aggregate` error.
    ///
    /// # Errors
    /// Returns `Aggregate` if any item failed.
    pub fn into_result(self) -> Result<usize> {
        if self.failures.is_empty() {
            Ok(self.succeeded)
        } else {
            Err(Error::Aggregate(self.failures))
        }
    }
}

/// Run `op` on every item, even after failures.
pub fn run_batch<T, L, F>(items: impl IntoIterator<Item = (L, T)>, mut op: F) -> BatchReport
where
    L: Into<String>,
    F: FnMut(T) -> Result<()>,
{
    let mut report = BatchReport::default();
    for (label, item) in items {
        match op(item) {
            Ok(()) => report.succeeded += 1,
            Err(error) => {
                let label = label.into();
                log::warn!("{label}: {error}");
                report.failures.push(BatchFailure { label, error });
            }
        }
    }
    report
}

/// Commit pending changes of every manager.
#[must_use]
pub fn commit_all(managers: &[(&str, &SyncManager)], progress: Option<&dyn Progress>) -> BatchReport {
    run_batch(managers.iter().copied(), |manager| {
        manager.commit(progress).map(|_| ())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cfgsync_git::StaticCredentialsStore;
    use tempfile::TempDir;

    use crate::config::Config;

    #[test]
    fn test_run_batch_visits_everything() {
        let report = run_batch([("a", 1), ("b", 2), ("c", 3)], |n| {
            if n == 2 { Err(Error::Cancelled) } else { Ok(()) }
        });

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].label, "b");
        assert!(matches!(report.into_result(), Err(Error::Aggregate(ref f)) if f.len() == 1));
    }

    #[test]
    fn test_clean_report() {
        let report = run_batch(Vec::<(&str, ())>::new(), |()| Ok(()));
        assert!(report.is_clean());
        assert_eq!(report.into_result().unwrap(), 0);
    }

    #[test]
    fn test_commit_all_continues_after_failure() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(StaticCredentialsStore::new());
        let ok = SyncManager::new(temp.path().join("ok"), store.clone(), Config::default(), None);
        ok.create_repository_if_need().unwrap();
        ok.add_to_index("a.xml", b"a").unwrap();
        let missing = SyncManager::new(temp.path().join("missing"), store, Config::default(), None);

        let report = commit_all(&[("missing", &missing), ("ok", &ok)], None);

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failures[0].label, "missing");
        assert_eq!(ok.ahead_commits_count().unwrap(), 1);
    }
}

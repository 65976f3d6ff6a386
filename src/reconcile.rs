// Makes sure every remote directory a batch writes into exists before any
// upload starts. Runs sequentially on the calling thread.

use std::collections::{BTreeSet, HashSet};

use crate::error::ApiError;
use crate::remote::{normalize_dir, Lookup, Remote};

/// Which directories were created and which were already there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

/// Remembers directories it has already confirmed, so repeated batches do
/// not query or create them again.
#[derive(Debug, Default)]
pub struct DirectoryReconciler {
    known: HashSet<String>,
}

impl DirectoryReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures each directory in `paths` exists remotely.
    ///
    /// Paths are deduplicated after trailing-separator normalisation and
    /// handled in sorted order, which puts parents before their children.
    pub fn ensure_directories<R, I, S>(
        &mut self,
        remote: &R,
        paths: I,
    ) -> Result<ReconcileReport, ApiError>
    where
        R: Remote + ?Sized,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: BTreeSet<String> = paths
            .into_iter()
            .map(|p| normalize_dir(p.as_ref()))
            .collect();

        let mut report = ReconcileReport::default();
        for dir in wanted {
            if self.known.contains(&dir) {
                continue;
            }
            match remote.stat(&dir, None)? {
                Lookup::Found(_) => {
                    tracing::debug!(dir = %dir, "remote directory present");
                    report.existing.push(dir.clone());
                }
                Lookup::NotFound => {
                    tracing::info!(dir = %dir, "creating remote directory");
                    remote.create_dir(&dir)?;
                    report.created.push(dir.clone());
                }
            }
            self.known.insert(dir);
        }
        Ok(report)
    }
}

/// One-shot form of [`DirectoryReconciler::ensure_directories`].
pub fn ensure_directories<R, I, S>(remote: &R, paths: I) -> Result<ReconcileReport, ApiError>
where
    R: Remote + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    DirectoryReconciler::new().ensure_directories(remote, paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::FakeRemote;

    #[test]
    fn creates_only_missing_directories_once() {
        let remote = FakeRemote::new();
        remote.add_dir("/raw");

        let report =
            ensure_directories(&remote, ["/raw", "/raw/sub/", "/raw/sub", "/raw/other/"]).unwrap();

        assert_eq!(report.existing, vec!["/raw".to_string()]);
        assert_eq!(
            report.created,
            vec!["/raw/other".to_string(), "/raw/sub".to_string()]
        );
        assert_eq!(remote.created_dirs().len(), 2);
    }

    #[test]
    fn parents_are_created_before_children() {
        let remote = FakeRemote::new();
        ensure_directories(&remote, ["/raw/a/b/", "/raw/a/", "/raw"]).unwrap();
        assert_eq!(
            remote.created_dirs(),
            vec![
                "/raw".to_string(),
                "/raw/a".to_string(),
                "/raw/a/b".to_string()
            ]
        );
    }

    #[test]
    fn second_pass_issues_no_creation() {
        let remote = FakeRemote::new();
        let dirs = ["/raw", "/raw/sub/"];

        let mut reconciler = DirectoryReconciler::new();
        reconciler.ensure_directories(&remote, dirs).unwrap();
        let again = reconciler.ensure_directories(&remote, dirs).unwrap();

        assert_eq!(again, ReconcileReport::default());
        assert_eq!(remote.created_dirs().len(), 2);
    }

    #[test]
    fn fresh_reconciler_sees_existing_directories() {
        let remote = FakeRemote::new();
        ensure_directories(&remote, ["/zip"]).unwrap();
        let again = ensure_directories(&remote, ["/zip/"]).unwrap();

        assert!(again.created.is_empty());
        assert_eq!(again.existing, vec!["/zip".to_string()]);
        assert_eq!(remote.created_dirs(), vec!["/zip".to_string()]);
    }
}

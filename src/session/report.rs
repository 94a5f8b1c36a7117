//! Run report persistence.
//!
//! A finished run is written to `<dir>/<run_id>.json`. Writes go to a
//! temporary file first and are renamed into place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{CatalogError, MigrationError, Result};
use crate::planner::TargetState;

use super::issues::RunIssue;
use super::summary::{MigrationSummary, TransactionLogEntry};

/// Default report directory, relative to the working directory.
pub const DEFAULT_REPORT_DIR: &str = ".catalog-migrate/runs";

/// Everything recorded about one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run id.
    pub run_id: String,
    /// Run state.
    pub state: TargetState,
    /// Whether the run was a dry run.
    pub checkmode: bool,
    /// Fingerprint of the migration scope configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_fingerprint: Option<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-kind counters.
    pub summary: MigrationSummary,
    /// Per-object failures.
    #[serde(default)]
    pub issues: Vec<RunIssue>,
    /// Full transaction log.
    #[serde(default)]
    pub log: Vec<TransactionLogEntry>,
}

impl RunReport {
    /// Builds the report of a finished session.
    #[must_use]
    pub fn from_session(
        session: &super::RunSession,
        state: TargetState,
        checkmode: bool,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: session.run_id().to_string(),
            state,
            checkmode,
            config_fingerprint: None,
            started_at,
            finished_at: Utc::now(),
            summary: session.migration_summary(),
            issues: session.issues().to_vec(),
            log: session.summary().get_summary_log_list().to_vec(),
        }
    }

    /// Sets the configuration fingerprint.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.config_fingerprint = Some(fingerprint.into());
        self
    }

    /// Returns true if the run finished without issues.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.issues.is_empty()
    }
}

/// File-based store for run reports.
#[derive(Debug, Clone)]
pub struct RunReportStore {
    dir: PathBuf,
}

impl RunReportStore {
    /// Creates a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn report_path(&self, run_id: &str) -> Result<PathBuf> {
        if run_id.is_empty()
            || run_id.starts_with('.')
            || run_id.contains(['/', '\\'])
        {
            return Err(CatalogError::validation("invalid run id", run_id));
        }
        Ok(self.dir.join(format!("{run_id}.json")))
    }

    fn report_error(message: String) -> CatalogError {
        CatalogError::Migration(MigrationError::Report { message })
    }

    /// Saves a report and returns its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be serialized or written.
    pub async fn save(&self, report: &RunReport) -> Result<PathBuf> {
        let path = self.report_path(&report.run_id)?;

        fs::create_dir_all(&self.dir).await.map_err(|e| {
            Self::report_error(format!("Failed to create {}: {e}", self.dir.display()))
        })?;

        let content = serde_json::to_string_pretty(report)
            .map_err(|e| Self::report_error(format!("Failed to serialize report: {e}")))?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content)
            .await
            .map_err(|e| Self::report_error(format!("Failed to write report: {e}")))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| Self::report_error(format!("Failed to move report into place: {e}")))?;

        info!("Run report saved: {}", path.display());
        Ok(path)
    }

    /// Loads the report of a run, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the report exists but cannot be read or parsed.
    pub async fn load(&self, run_id: &str) -> Result<Option<RunReport>> {
        let path = self.report_path(run_id)?;
        if !path.exists() {
            debug!("No report at {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| Self::report_error(format!("Failed to read {}: {e}", path.display())))?;
        let report = serde_json::from_str(&content)
            .map_err(|e| Self::report_error(format!("Failed to parse {}: {e}", path.display())))?;
        Ok(Some(report))
    }

    /// Lists stored run ids, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub async fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.dir).await?;
        let mut run_ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    run_ids.push(stem.to_string());
                }
            }
        }

        // run ids are timestamps, so lexical order is chronological
        run_ids.sort_unstable_by(|a, b| b.cmp(a));
        Ok(run_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn report(run_id: &str) -> RunReport {
        RunReport {
            run_id: run_id.to_string(),
            state: TargetState::Present,
            checkmode: false,
            config_fingerprint: Some(String::from("abc")),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            summary: MigrationSummary::default(),
            issues: Vec::new(),
            log: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = RunReportStore::new(dir.path().join("runs"));

        let path = store.save(&report("2026_01_02_03_04_05_006")).await.unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = store.load("2026_01_02_03_04_05_006").await.unwrap().unwrap();
        assert_eq!(loaded.config_fingerprint.as_deref(), Some("abc"));
        assert!(loaded.is_success());
    }

    #[tokio::test]
    async fn test_missing_report() {
        let dir = tempdir().unwrap();
        let store = RunReportStore::new(dir.path());
        assert!(store.load("nope").await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let dir = tempdir().unwrap();
        let store = RunReportStore::new(dir.path());
        store.save(&report("2026_01_01_00_00_00_000")).await.unwrap();
        store.save(&report("2026_03_01_00_00_00_000")).await.unwrap();

        let ids = store.list().await.unwrap();
        assert_eq!(ids, vec!["2026_03_01_00_00_00_000", "2026_01_01_00_00_00_000"]);
    }

    #[tokio::test]
    async fn test_rejects_path_like_run_ids() {
        let dir = tempdir().unwrap();
        let store = RunReportStore::new(dir.path());
        assert!(store.load("../etc/passwd").await.is_err());
    }
}

//! Run session.
//!
//! A [`RunSession`] is created per run and passed by reference to every task.
//! It owns the run id, the context stack, the summary log and the list of
//! per-object issues. Nothing here is global, so each test builds its own.

mod context;
mod issues;
mod report;
mod summary;

pub use context::{ContextRecord, ContextStack};
pub use issues::RunIssue;
pub use report::{RunReport, RunReportStore, DEFAULT_REPORT_DIR};
pub use summary::{
    KindCounters, MigrationSummary, ObjectKeys, RunSummary, TransactionData, TransactionLogEntry,
};

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::catalog::{CatalogObject, ObjectKind};
use crate::error::CatalogError;
use crate::planner::TaskAction;

/// Timestamp layout of generated run ids.
const RUN_ID_FORMAT: &str = "%Y_%m_%d_%H_%M_%S_%3f";

/// Generates a run id from the current UTC time, e.g. `2026_10_17_09_30_12_345`.
#[must_use]
pub fn generate_run_id() -> String {
    Utc::now().format(RUN_ID_FORMAT).to_string()
}

/// State shared by every task of one run.
#[derive(Debug)]
pub struct RunSession {
    run_id: String,
    transaction_id: Uuid,
    contexts: ContextStack,
    summary: RunSummary,
    issues: Vec<RunIssue>,
}

impl RunSession {
    /// Creates a session for the given run id.
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            transaction_id: Uuid::new_v4(),
            contexts: ContextStack::new(),
            summary: RunSummary::new(),
            issues: Vec::new(),
        }
    }

    /// Creates a session with a generated run id.
    #[must_use]
    pub fn generated() -> Self {
        Self::new(generate_run_id())
    }

    /// Run id.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Transaction id of the component driving the run.
    #[must_use]
    pub const fn transaction_id(&self) -> Uuid {
        self.transaction_id
    }

    /// Fresh transaction data for a task started by this session's driver.
    #[must_use]
    pub fn child_transaction(&self) -> TransactionData {
        TransactionData::child_of(self.transaction_id, self.run_id.clone())
    }

    /// Pushes a context record merged over the current one.
    pub fn push_context<K, V>(&mut self, fields: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.contexts.push(fields);
    }

    /// Pops the current context record.
    pub fn pop_context(&mut self) -> Option<ContextRecord> {
        self.contexts.pop()
    }

    /// Current merged context.
    #[must_use]
    pub fn context(&self) -> ContextRecord {
        self.contexts.current()
    }

    /// Appends one log entry for a task execution and returns it.
    pub fn record(
        &mut self,
        action: TaskAction,
        kind: ObjectKind,
        identity: impl Into<String>,
        object: Option<&CatalogObject>,
        transaction: TransactionData,
    ) -> TransactionLogEntry {
        let entry = TransactionLogEntry {
            action,
            kind,
            identity: identity.into(),
            object: object.map_or_else(|| ObjectKeys::unresolved(kind), ObjectKeys::of),
            transaction,
            context: self.contexts.current(),
            timestamp: Utc::now(),
        };
        self.summary.append(entry.clone());
        entry
    }

    /// Records a per-object failure.
    pub fn add_issue(&mut self, kind: ObjectKind, identity: impl Into<String>, error: &CatalogError) {
        let issue = RunIssue::from_error(kind, identity, error, self.contexts.current());
        warn!("Issue recorded: {issue}");
        self.issues.push(issue);
    }

    /// Summary log.
    #[must_use]
    pub const fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Per-object failures, in order.
    #[must_use]
    pub fn issues(&self) -> &[RunIssue] {
        &self.issues
    }

    /// Per-kind counters.
    #[must_use]
    pub fn migration_summary(&self) -> MigrationSummary {
        self.summary.migration_summary(&self.issues)
    }

    /// Clears log, issues and contexts; keeps the run id.
    pub fn reset(&mut self) {
        self.summary.reset();
        self.issues.clear();
        self.contexts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_format() {
        let run_id = generate_run_id();
        let parts: Vec<&str> = run_id.split('_').collect();
        assert_eq!(parts.len(), 7);
        assert_eq!(parts[0].len(), 4);
        assert_eq!(parts[6].len(), 3);
        assert!(run_id.chars().all(|c| c.is_ascii_digit() || c == '_'));
    }

    #[test]
    fn test_record_captures_context_and_transaction() {
        let mut session = RunSession::new("run-42");
        session.push_context([("domain", "Acme Rideshare")]);

        let transaction = session.child_transaction();
        let entry = session.record(
            TaskAction::WouldCreate,
            ObjectKind::Enum,
            "Colors",
            None,
            transaction,
        );

        assert_eq!(entry.context["domain"], "Acme Rideshare");
        assert_eq!(entry.transaction.group_transaction_id.as_deref(), Some("run-42"));
        assert_eq!(entry.transaction.parent_transaction_id, Some(session.transaction_id()));
        assert_eq!(session.summary().len(), 1);

        session.add_issue(ObjectKind::Enum, "Colors", &CatalogError::internal("x"));
        session.reset();
        assert!(session.summary().is_empty());
        assert!(session.issues().is_empty());
        assert_eq!(session.run_id(), "run-42");
    }
}

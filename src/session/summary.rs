//! Run summary log and per-kind counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::catalog::{CatalogObject, ObjectKind};
use crate::planner::TaskAction;

use super::context::ContextRecord;
use super::issues::RunIssue;

/// Transaction identifiers attached to one task execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    /// Id of this task execution.
    pub task_transaction_id: Uuid,
    /// Id of the component that started the task (one per migrator run).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_transaction_id: Option<Uuid>,
    /// Group the task belongs to; the run id for migrations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_transaction_id: Option<String>,
}

impl TransactionData {
    /// Transaction data for a standalone task.
    #[must_use]
    pub fn standalone() -> Self {
        Self {
            task_transaction_id: Uuid::new_v4(),
            parent_transaction_id: None,
            group_transaction_id: None,
        }
    }

    /// Transaction data for a task started by `parent` within `group`.
    #[must_use]
    pub fn child_of(parent: Uuid, group: impl Into<String>) -> Self {
        Self {
            task_transaction_id: Uuid::new_v4(),
            parent_transaction_id: Some(parent),
            group_transaction_id: Some(group.into()),
        }
    }
}

impl Default for TransactionData {
    fn default() -> Self {
        Self::standalone()
    }
}

/// Keys of the object a task touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectKeys {
    /// Object kind.
    pub kind: ObjectKind,
    /// Object id, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Version string, for version kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ObjectKeys {
    /// Keys of an object representation.
    #[must_use]
    pub fn of(object: &CatalogObject) -> Self {
        Self {
            kind: object.kind,
            id: Some(object.id.clone()),
            version: object.version.clone(),
        }
    }

    /// Keys of an object that has no id (yet).
    #[must_use]
    pub const fn unresolved(kind: ObjectKind) -> Self {
        Self {
            kind,
            id: None,
            version: None,
        }
    }
}

/// One immutable record per task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLogEntry {
    /// Decided action.
    pub action: TaskAction,
    /// Resource kind.
    pub kind: ObjectKind,
    /// Name or id the task was asked to handle.
    pub identity: String,
    /// Keys of the affected object.
    pub object: ObjectKeys,
    /// Transaction identifiers.
    pub transaction: TransactionData,
    /// Context at execution time.
    #[serde(default)]
    pub context: ContextRecord,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Append-only run summary log.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    entries: Vec<TransactionLogEntry>,
}

impl RunSummary {
    /// Creates an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends an entry.
    pub fn append(&mut self, entry: TransactionLogEntry) {
        self.entries.push(entry);
    }

    /// Returns a read-only view of every entry, in execution order.
    #[must_use]
    pub fn get_summary_log_list(&self) -> &[TransactionLogEntry] {
        &self.entries
    }

    /// Clears the log.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the actions in execution order.
    #[must_use]
    pub fn actions(&self) -> Vec<TaskAction> {
        self.entries.iter().map(|e| e.action).collect()
    }

    /// Derives per-kind counters from the log and the issue list.
    #[must_use]
    pub fn migration_summary(&self, issues: &[RunIssue]) -> MigrationSummary {
        let mut summary = MigrationSummary::default();

        for entry in &self.entries {
            let counters = summary.per_kind.entry(entry.kind).or_default();
            counters.processed += 1;
            match entry.action {
                TaskAction::Create if entry.kind.is_version() => counters.new_versions += 1,
                TaskAction::Create => counters.created += 1,
                TaskAction::CreateFirstVersion => counters.first_versions += 1,
                TaskAction::Update => counters.updated += 1,
                TaskAction::Delete => counters.deleted += 1,
                TaskAction::NoAction => counters.unchanged += 1,
                TaskAction::WouldCreate
                | TaskAction::WouldUpdate
                | TaskAction::WouldDelete
                | TaskAction::WouldFailToUpdate => counters.planned += 1,
            }
        }

        for issue in issues {
            summary.per_kind.entry(issue.kind).or_default().issues += 1;
        }

        summary
    }
}

/// Counters for one kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCounters {
    /// Task executions recorded.
    pub processed: u32,
    /// Objects created.
    pub created: u32,
    /// First versions created.
    pub first_versions: u32,
    /// Further versions created.
    pub new_versions: u32,
    /// Objects updated in place.
    pub updated: u32,
    /// Objects deleted.
    pub deleted: u32,
    /// Executions that changed nothing.
    pub unchanged: u32,
    /// Checkmode decisions.
    pub planned: u32,
    /// Failures.
    pub issues: u32,
}

impl std::ops::AddAssign for KindCounters {
    fn add_assign(&mut self, other: Self) {
        self.processed += other.processed;
        self.created += other.created;
        self.first_versions += other.first_versions;
        self.new_versions += other.new_versions;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
        self.planned += other.planned;
        self.issues += other.issues;
    }
}

/// Counters per kind for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSummary {
    /// Counters keyed by kind.
    pub per_kind: BTreeMap<ObjectKind, KindCounters>,
}

impl MigrationSummary {
    /// Sum over all kinds.
    #[must_use]
    pub fn totals(&self) -> KindCounters {
        let mut total = KindCounters::default();
        for counters in self.per_kind.values() {
            total += *counters;
        }
        total
    }

    /// Counters for one kind.
    #[must_use]
    pub fn kind(&self, kind: ObjectKind) -> KindCounters {
        self.per_kind.get(&kind).copied().unwrap_or_default()
    }
}

//! ABSENT passes: remove what a run created, or every domain under a prefix.
//!
//! Deletions can fail on ordering (an object is still referenced by one
//! that has not been removed yet). Retryable failures are carried into the
//! next pass; anything else becomes a session issue and the object is
//! skipped from then on. The number of passes is bounded.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogObject, Identity, ObjectKind, ParentScope, RUN_ID_ATTRIBUTE};
use crate::error::{CatalogError, MigrationError, Result};
use crate::planner::TaskAction;
use crate::session::RunSession;
use crate::tasks::{
    ApplicationDomainSettings, ApplicationSettings, EnumSettings, EventApiSettings, EventSettings,
    KindSettings, ObjectTask, SchemaSettings, TopicDomainSettings,
};

use super::Migrator;

/// Kinds removed inside domains, dependents first.
pub const ABSENT_ORDER: [ObjectKind; 6] = [
    ObjectKind::Application,
    ObjectKind::EventApi,
    ObjectKind::Event,
    ObjectKind::Schema,
    ObjectKind::TopicDomain,
    ObjectKind::Enum,
];

/// Shortest accepted domain name prefix for prefix removal.
pub const MIN_PREFIX_LEN: usize = 2;

/// What an ABSENT run removes.
#[derive(Debug, Clone, Copy)]
enum Selection<'s> {
    RunId(&'s str),
    Prefix(&'s str),
}

/// A deletion that failed with a retryable error.
struct Pending {
    kind: ObjectKind,
    label: String,
    error: CatalogError,
}

/// Bookkeeping across passes.
#[derive(Default)]
struct Removal {
    /// Ids that failed permanently.
    skipped: HashSet<String>,
    /// Retryable failures of the current pass.
    pending: Vec<Pending>,
}

impl Removal {
    fn fail(&mut self, session: &mut RunSession, kind: ObjectKind, id: &str, label: String, error: CatalogError) {
        if error.is_retryable() {
            debug!("{kind} '{label}' will be retried: {error}");
            self.pending.push(Pending { kind, label, error });
        } else {
            self.skipped.insert(id.to_string());
            session.add_issue(kind, label, &error);
        }
    }

    fn is_skipped(&self, object: &CatalogObject) -> bool {
        self.skipped.contains(&object.id)
    }
}

fn is_tagged(object: &CatalogObject, run_id: &str) -> bool {
    object.custom_attribute(RUN_ID_ATTRIBUTE) == Some(run_id)
}

fn version_label(object: &CatalogObject) -> String {
    format!("{}@{}", object.name, object.version.as_deref().unwrap_or("?"))
}

impl Migrator<'_> {
    /// Removes everything tagged with `run_id` from the target.
    ///
    /// Versioned objects are removed only when all of their versions carry
    /// the tag, and application domains only when all of their contents do.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::MaxPassesExceeded`] if objects are still
    /// blocked after the last pass.
    pub async fn run_absent_by_run_id(&self, session: &mut RunSession, run_id: &str) -> Result<()> {
        if run_id.trim().is_empty() {
            return Err(CatalogError::validation("ABSENT by run id needs a run id", run_id));
        }
        info!("Removing objects of run {run_id} (checkmode: {})", self.options.checkmode);
        self.remove(session, Selection::RunId(run_id)).await
    }

    /// Removes every target application domain whose name starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the prefix is shorter than
    /// [`MIN_PREFIX_LEN`], or [`MigrationError::MaxPassesExceeded`] if domains
    /// are still blocked after the last pass.
    pub async fn run_absent_by_prefix(&self, session: &mut RunSession, prefix: &str) -> Result<()> {
        if prefix.chars().count() < MIN_PREFIX_LEN {
            return Err(CatalogError::validation(
                format!("application domain prefix must have at least {MIN_PREFIX_LEN} characters"),
                prefix,
            ));
        }
        info!("Removing application domains prefixed '{prefix}' (checkmode: {})", self.options.checkmode);
        self.remove(session, Selection::Prefix(prefix)).await
    }

    async fn remove(&self, session: &mut RunSession, selection: Selection<'_>) -> Result<()> {
        let run_id = session.run_id().to_string();
        let mode = match selection {
            Selection::RunId(id) => format!("run_id:{id}"),
            Selection::Prefix(prefix) => format!("prefix:{prefix}"),
        };
        session.push_context([
            ("run_id", run_id.as_str()),
            ("state", "absent"),
            ("selection", mode.as_str()),
        ]);
        let result = self.remove_in_passes(session, selection).await;
        session.pop_context();
        result
    }

    async fn remove_in_passes(&self, session: &mut RunSession, selection: Selection<'_>) -> Result<()> {
        let passes = if self.options.checkmode {
            1
        } else {
            self.options.max_absent_passes.max(1)
        };
        let mut removal = Removal::default();

        for attempt in 1..=passes {
            removal.pending.clear();
            match selection {
                Selection::RunId(run_id) => self.pass_by_run_id(session, run_id, &mut removal).await,
                Selection::Prefix(prefix) => self.pass_by_prefix(session, prefix, &mut removal).await,
            }

            if removal.pending.is_empty() {
                info!("ABSENT finished after {attempt} pass(es)");
                return Ok(());
            }
            if attempt < passes {
                warn!(
                    "Pass {attempt}/{passes} left {} object(s), retrying in {:?}",
                    removal.pending.len(),
                    self.options.pass_delay
                );
                tokio::time::sleep(self.options.pass_delay).await;
            }
        }

        if self.options.checkmode {
            for pending in std::mem::take(&mut removal.pending) {
                session.add_issue(pending.kind, pending.label, &pending.error);
            }
            return Ok(());
        }

        Err(MigrationError::MaxPassesExceeded {
            attempts: passes,
            remaining: removal.pending.len(),
            last_errors: removal
                .pending
                .iter()
                .map(|p| format!("{} '{}': {}", p.kind, p.label, p.error))
                .collect(),
        }
        .into())
    }

    async fn pass_by_run_id(&self, session: &mut RunSession, run_id: &str, removal: &mut Removal) {
        let observer = self.target_observer();

        for kind in ABSENT_ORDER {
            if let Some(version_kind) = kind.version_kind() {
                match observer.tagged(version_kind, run_id).await {
                    Ok(versions) => {
                        for version in versions.iter().rev() {
                            if removal.is_skipped(version) {
                                continue;
                            }
                            self.remove_version(session, version, removal).await;
                        }
                    }
                    Err(e) => removal.fail(session, version_kind, "", format!("{version_kind}/*"), e),
                }
            }

            let parents = match observer.tagged(kind, run_id).await {
                Ok(parents) => parents,
                Err(e) => {
                    removal.fail(session, kind, "", format!("{kind}/*"), e);
                    continue;
                }
            };
            for parent in &parents {
                if removal.is_skipped(parent) {
                    continue;
                }
                if kind.version_kind().is_some() {
                    match observer.versions_of(parent).await {
                        Ok(versions) if versions.iter().all(|v| is_tagged(v, run_id)) => {}
                        Ok(_) => {
                            debug!("Keeping {kind} '{}': it has versions from other runs", parent.name);
                            continue;
                        }
                        Err(e) => {
                            removal.fail(session, kind, &parent.id, parent.name.clone(), e);
                            continue;
                        }
                    }
                }
                self.remove_object(session, parent, removal).await;
            }
        }

        let domains = match observer.tagged(ObjectKind::ApplicationDomain, run_id).await {
            Ok(domains) => domains,
            Err(e) => {
                removal.fail(session, ObjectKind::ApplicationDomain, "", String::from("applicationDomain/*"), e);
                return;
            }
        };
        for domain in &domains {
            if removal.is_skipped(domain) {
                continue;
            }
            match self.domain_fully_tagged(domain, run_id).await {
                Ok(true) => self.remove_object(session, domain, removal).await,
                Ok(false) => debug!("Keeping application domain '{}': it has foreign contents", domain.name),
                Err(e) => removal.fail(session, domain.kind, &domain.id, domain.name.clone(), e),
            }
        }
    }

    async fn pass_by_prefix(&self, session: &mut RunSession, prefix: &str, removal: &mut Removal) {
        let domains = match self
            .target_observer()
            .list_all(ObjectKind::ApplicationDomain, &ParentScope::default())
            .await
        {
            Ok(domains) => domains,
            Err(e) => {
                removal.fail(session, ObjectKind::ApplicationDomain, "", String::from("applicationDomain/*"), e);
                return;
            }
        };

        for domain in domains.iter().filter(|d| d.name.starts_with(prefix)) {
            if removal.is_skipped(domain) {
                continue;
            }
            self.remove_object(session, domain, removal).await;
        }
    }

    /// Returns true if every object in the domain, versions included, is tagged.
    async fn domain_fully_tagged(&self, domain: &CatalogObject, run_id: &str) -> Result<bool> {
        let observer = self.target_observer();
        for kind in ABSENT_ORDER {
            let objects = observer.list_all(kind, &ParentScope::domain(&domain.id)).await?;
            for object in &objects {
                if !is_tagged(object, run_id) {
                    return Ok(false);
                }
                if kind.version_kind().is_some()
                    && !observer.versions_of(object).await?.iter().all(|v| is_tagged(v, run_id))
                {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Deletes one version. Topic domains built on an enum version go first.
    async fn remove_version(&self, session: &mut RunSession, version: &CatalogObject, removal: &mut Removal) {
        let label = version_label(version);

        if version.kind == ObjectKind::EnumVersion {
            let topic_domains = match self
                .target_observer()
                .list_all(ObjectKind::TopicDomain, &ParentScope::default())
                .await
            {
                Ok(all) => all,
                Err(e) => {
                    removal.fail(session, version.kind, &version.id, label, e);
                    return;
                }
            };
            for topic_domain in topic_domains.iter().filter(|t| t.references().contains(&version.id)) {
                if removal.is_skipped(topic_domain) {
                    continue;
                }
                self.remove_object(session, topic_domain, removal).await;
            }
        }

        let transaction = session.child_transaction();
        if self.options.checkmode {
            session.record(TaskAction::WouldDelete, version.kind, label, Some(version), transaction);
            return;
        }

        match self.target.delete(version.kind, &version.id).await {
            Ok(deleted) => {
                session.record(TaskAction::Delete, version.kind, label.clone(), Some(&deleted), transaction);
                info!("[{}] {} '{label}': {}", session.run_id(), version.kind, TaskAction::Delete);
            }
            Err(e) => {
                let e = e.in_task(version.kind, label.clone(), TaskAction::Delete);
                removal.fail(session, version.kind, &version.id, label, e);
            }
        }
    }

    /// Deletes one object through its kind's task.
    async fn remove_object(&self, session: &mut RunSession, object: &CatalogObject, removal: &mut Removal) {
        let result = match object.kind {
            ObjectKind::ApplicationDomain => self.absent::<ApplicationDomainSettings>(session, object).await,
            ObjectKind::TopicDomain => self.absent::<TopicDomainSettings>(session, object).await,
            ObjectKind::Enum => self.absent::<EnumSettings>(session, object).await,
            ObjectKind::Schema => self.absent::<SchemaSettings>(session, object).await,
            ObjectKind::Event => self.absent::<EventSettings>(session, object).await,
            ObjectKind::Application => self.absent::<ApplicationSettings>(session, object).await,
            ObjectKind::EventApi => self.absent::<EventApiSettings>(session, object).await,
            other => Err(CatalogError::internal(format!("{other} is removed with its owning object"))),
        };
        if let Err(e) = result {
            removal.fail(session, object.kind, &object.id, object.name.clone(), e);
        }
    }

    async fn absent<S: KindSettings>(&self, session: &mut RunSession, object: &CatalogObject) -> Result<()> {
        let identity = Identity {
            id: Some(object.id.clone()),
            name: Some(object.name.clone()),
            scope: object.scope.clone(),
        };
        ObjectTask::<S>::absent(identity)
            .with_checkmode(self.options.checkmode)
            .with_transaction(session.child_transaction())
            .execute(self.target, session)
            .await?;
        Ok(())
    }
}

//! Version tasks: a new version of a versioned object.
//!
//! Published versions are never changed in place. A version task compares
//! the desired settings with the latest version and, when they differ, asks
//! the version policy for the next version string to create.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::catalog::{
    latest_version, CatalogObject, CatalogObserver, Identity, ObjectClient, ObjectDraft, ObjectKind,
    ParentScope,
};
use crate::error::{CatalogError, Result};
use crate::planner::{
    project, DiffEngine, SemVer, TargetState, TaskAction, VersionDecision, VersionPolicy,
    VersionRequest, VersionStrategy,
};
use crate::session::{RunSession, TransactionData};

use super::settings::KindSettings;
use super::TaskOutcome;

/// Field the version string is compared under for `EXACT` requests.
const VERSION_FIELD: &str = "version";

/// Reconciles the latest version of one versioned object.
#[derive(Debug, Clone)]
pub struct VersionTask<S: KindSettings> {
    parent: Identity,
    target: TargetState,
    version: Option<String>,
    strategy: VersionStrategy,
    settings: S,
    checkmode: bool,
    transaction: Option<TransactionData>,
    custom_attributes: BTreeMap<String, String>,
}

impl<S: KindSettings> VersionTask<S> {
    /// Task that makes a version with `settings` the latest one.
    #[must_use]
    pub fn present(parent: Identity, settings: S) -> Self {
        Self {
            parent,
            target: TargetState::Present,
            version: None,
            strategy: VersionStrategy::default(),
            settings,
            checkmode: false,
            transaction: None,
            custom_attributes: BTreeMap::new(),
        }
    }

    /// Sets the requested version string and strategy.
    #[must_use]
    pub fn with_version(mut self, version: Option<String>, strategy: VersionStrategy) -> Self {
        self.version = version;
        self.strategy = strategy;
        self
    }

    /// Sets the target state. Only PRESENT can be executed.
    #[must_use]
    pub const fn with_target(mut self, target: TargetState) -> Self {
        self.target = target;
        self
    }

    /// Enables or disables checkmode.
    #[must_use]
    pub const fn with_checkmode(mut self, checkmode: bool) -> Self {
        self.checkmode = checkmode;
        self
    }

    /// Uses caller-supplied transaction ids instead of standalone ones.
    #[must_use]
    pub fn with_transaction(mut self, transaction: TransactionData) -> Self {
        self.transaction = Some(transaction);
        self
    }

    /// Adds a custom attribute written together with a created version.
    #[must_use]
    pub fn with_custom_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_attributes.insert(name.into(), value.into());
        self
    }

    /// Kind of the owning object.
    fn parent_kind() -> Result<ObjectKind> {
        S::KIND
            .parent_kind()
            .ok_or_else(|| CatalogError::internal(format!("{} is not a version kind", S::KIND)))
    }

    fn label(&self) -> String {
        match &self.version {
            Some(version) => format!("{}@{version}", self.parent),
            None => self.parent.to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.target == TargetState::Absent {
            return Err(CatalogError::validation(
                format!(
                    "{} tasks only support target PRESENT; remove versions by deleting the owning object",
                    S::KIND
                ),
                self.target.to_string(),
            ));
        }
        if self.parent.is_empty() {
            return Err(CatalogError::validation(
                format!("{} task needs the owning object's id or name", S::KIND),
                "",
            ));
        }
        if let Some(version) = &self.version {
            SemVer::parse(version)?;
        }
        if self.strategy == VersionStrategy::Exact && self.version.is_none() {
            return Err(CatalogError::validation(
                "EXACT strategy requires a version string",
                self.label(),
            ));
        }
        Ok(())
    }

    /// Compare object for the diff: the kind's fields, plus the version for `EXACT`.
    fn compare_object(&self, attributes: &serde_json::Value, version: Option<&str>) -> serde_json::Value {
        let mut object = project(attributes, &S::KIND.compare_fields());
        if self.strategy == VersionStrategy::Exact {
            if let (serde_json::Value::Object(map), Some(version)) = (&mut object, version) {
                map.insert(VERSION_FIELD.to_string(), serde_json::Value::String(version.to_string()));
            }
        }
        object
    }

    /// Version the request is compared with: for `EXACT` the version with the
    /// same number when there is one, otherwise the latest.
    fn baseline<'v>(&self, versions: &'v [CatalogObject]) -> Option<&'v CatalogObject> {
        let same_number = match (self.strategy, self.version.as_deref()) {
            (VersionStrategy::Exact, Some(requested)) => {
                let requested = SemVer::parse(requested).ok();
                versions.iter().find(|v| {
                    v.version.as_deref().and_then(|s| SemVer::parse(s).ok()) == requested
                })
            }
            _ => None,
        };
        same_number.or_else(|| latest_version(versions))
    }

    fn draft(&self, parent: &CatalogObject, version: SemVer, attributes: serde_json::Value) -> ObjectDraft {
        ObjectDraft {
            name: parent.name.clone(),
            version: Some(version.to_string()),
            attributes,
            custom_attributes: self.custom_attributes.clone(),
        }
    }

    /// Runs the task.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed versions or an ABSENT target,
    /// a version strategy violation outside checkmode, `NotFound` when the
    /// owning object is missing outside checkmode, or the wrapped client error.
    pub async fn execute(&self, client: &dyn ObjectClient, session: &mut RunSession) -> Result<TaskOutcome> {
        let kind = S::KIND;
        let label = self.label();
        let wrap = |action: TaskAction| {
            let label = label.clone();
            move |e: CatalogError| e.in_task(kind, label, action)
        };

        self.validate().map_err(wrap(TaskAction::NoAction))?;
        let parent_kind = Self::parent_kind().map_err(wrap(TaskAction::NoAction))?;
        let requested = self.settings.to_attributes().map_err(wrap(TaskAction::NoAction))?;

        let Some(parent) = client
            .get(parent_kind, &self.parent)
            .await
            .map_err(wrap(TaskAction::NoAction))?
        else {
            if self.checkmode {
                // owning object would be created earlier in the same run
                return Ok(self.finish(session, TaskAction::WouldCreate, None, label.clone()));
            }
            return Err(wrap(TaskAction::NoAction)(CatalogError::NotFound {
                kind: parent_kind,
                identity: self.parent.to_string(),
            }));
        };

        let versions = CatalogObserver::new(client)
            .versions_of(&parent)
            .await
            .map_err(wrap(TaskAction::NoAction))?;
        let existing: Vec<SemVer> = versions
            .iter()
            .filter_map(|v| v.version.as_deref())
            .filter_map(|v| SemVer::parse(v).ok())
            .collect();

        let request = VersionRequest {
            version_string: self.version.clone(),
            strategy: self.strategy,
        };

        if let Some(baseline) = self.baseline(&versions) {
            let result = DiffEngine::new().compare(
                &self.compare_object(&baseline.attributes, baseline.version.as_deref()),
                &self.compare_object(&requested, self.version.as_deref()),
            );
            if result.is_equal {
                debug!("{kind} '{label}' matches version {:?}", baseline.version);
                return Ok(self.finish(session, TaskAction::NoAction, Some(baseline.clone()), label.clone()));
            }
        }

        let decision = VersionPolicy::new()
            .next_version(&existing, &request)
            .map_err(wrap(TaskAction::NoAction))?;
        debug!("{kind} '{label}' version decision: {decision:?}");

        let (version, first) = match decision {
            VersionDecision::CreateFirst(version) => (version, versions.is_empty()),
            VersionDecision::Create(version) => (version, false),
            VersionDecision::NoAction(version) => {
                let current = versions
                    .iter()
                    .find(|v| v.version.as_deref() == Some(version.to_string().as_str()))
                    .cloned();
                return Ok(self.finish(session, TaskAction::NoAction, current, label.clone()));
            }
            VersionDecision::Reject { requested, existing } => {
                if self.checkmode {
                    let latest = latest_version(&versions).cloned();
                    return Ok(self.finish(session, TaskAction::WouldFailToUpdate, latest, label.clone()));
                }
                return Err(wrap(TaskAction::Create)(CatalogError::VersionStrategyViolation {
                    kind,
                    identity: parent.name.clone(),
                    strategy: self.strategy,
                    requested: requested.to_string(),
                    existing: existing.to_string(),
                }));
            }
        };

        if self.checkmode {
            return Ok(self.finish(session, TaskAction::WouldCreate, None, label.clone()));
        }

        let action = if first {
            TaskAction::CreateFirstVersion
        } else {
            TaskAction::Create
        };
        let created = client
            .create(kind, &ParentScope::parent(&parent.id), &self.draft(&parent, version, requested))
            .await
            .map_err(wrap(action))?;

        Ok(self.finish(session, action, Some(created), label))
    }

    fn finish(
        &self,
        session: &mut RunSession,
        action: TaskAction,
        object: Option<CatalogObject>,
        label: String,
    ) -> TaskOutcome {
        let transaction = self.transaction.clone().unwrap_or_default();
        let entry = session.record(action, S::KIND, label.clone(), object.as_ref(), transaction);
        info!("[{}] {} '{label}': {action}", session.run_id(), S::KIND);

        TaskOutcome {
            action,
            object,
            entry,
            difference: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::error::ErrorKind;
    use crate::tasks::settings::{EnumSettings, EnumVersionSettings};
    use crate::tasks::{EnumTask, EnumVersionTask};

    struct Fixture {
        catalog: InMemoryCatalog,
        session: RunSession,
        enum_id: String,
    }

    async fn fixture() -> Fixture {
        let catalog = InMemoryCatalog::new();
        let mut session = RunSession::new("test");
        let domain = catalog
            .create(
                ObjectKind::ApplicationDomain,
                &ParentScope::default(),
                &ObjectDraft {
                    name: String::from("orders"),
                    version: None,
                    attributes: serde_json::json!({}),
                    custom_attributes: BTreeMap::new(),
                },
            )
            .await
            .unwrap();
        let outcome = EnumTask::present(
            Identity::named("Colors", ParentScope::domain(&domain.id)),
            EnumSettings::default(),
        )
        .execute(&catalog, &mut session)
        .await
        .unwrap();
        let enum_id = outcome.object.unwrap().id;
        Fixture {
            catalog,
            session,
            enum_id,
        }
    }

    fn values(values: &[&str]) -> EnumVersionSettings {
        EnumVersionSettings {
            values: values.iter().map(|v| (*v).to_string()).collect(),
            ..EnumVersionSettings::default()
        }
    }

    #[tokio::test]
    async fn test_enum_values_lifecycle() {
        let Fixture { catalog, mut session, enum_id } = fixture().await;
        let task = |v: &[&str]| EnumVersionTask::present(Identity::by_id(&enum_id), values(v));

        let first = task(&["red", "blue"]).execute(&catalog, &mut session).await.unwrap();
        assert_eq!(first.action, TaskAction::CreateFirstVersion);
        assert_eq!(first.object.as_ref().and_then(|o| o.version.as_deref()), Some("1.0.0"));

        let again = task(&["blue", "red"]).execute(&catalog, &mut session).await.unwrap();
        assert_eq!(again.action, TaskAction::NoAction);

        let next = task(&["red", "blue", "green"]).execute(&catalog, &mut session).await.unwrap();
        assert_eq!(next.action, TaskAction::Create);
        let object = next.object.unwrap();
        assert_eq!(object.version.as_deref(), Some("1.0.1"));
        assert_eq!(object.attributes["values"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_exact_equal_version_is_rejected() {
        let Fixture { catalog, mut session, enum_id } = fixture().await;
        let exact = |v: &[&str]| {
            EnumVersionTask::present(Identity::by_id(&enum_id), values(v))
                .with_version(Some(String::from("1.2.3")), VersionStrategy::Exact)
        };

        exact(&["red"]).execute(&catalog, &mut session).await.unwrap();
        let same = exact(&["red"]).execute(&catalog, &mut session).await.unwrap();
        assert_eq!(same.action, TaskAction::NoAction);

        let before = catalog.objects_of(ObjectKind::EnumVersion).unwrap().len();
        let err = exact(&["red", "green"]).execute(&catalog, &mut session).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(matches!(
            err,
            CatalogError::Task { ref source, .. }
                if matches!(**source, CatalogError::VersionStrategyViolation { .. })
        ));
        assert_eq!(catalog.objects_of(ObjectKind::EnumVersion).unwrap().len(), before);

        let planned = exact(&["red", "green"])
            .with_checkmode(true)
            .execute(&catalog, &mut session)
            .await
            .unwrap();
        assert_eq!(planned.action, TaskAction::WouldFailToUpdate);
    }

    #[tokio::test]
    async fn test_exact_rerun_of_older_version() {
        let Fixture { catalog, mut session, enum_id } = fixture().await;
        let exact = |version: &str, v: &[&str]| {
            EnumVersionTask::present(Identity::by_id(&enum_id), values(v))
                .with_version(Some(version.to_string()), VersionStrategy::Exact)
        };

        exact("1.0.0", &["red"]).execute(&catalog, &mut session).await.unwrap();
        exact("1.1.0", &["red", "blue"]).execute(&catalog, &mut session).await.unwrap();

        let replay = exact("1.0.0", &["red"]).execute(&catalog, &mut session).await.unwrap();
        assert_eq!(replay.action, TaskAction::NoAction);
        assert_eq!(replay.object.and_then(|o| o.version), Some(String::from("1.0.0")));

        let err = exact("1.0.0", &["green"]).execute(&catalog, &mut session).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_absent_target_is_invalid() {
        let Fixture { catalog, mut session, enum_id } = fixture().await;
        let err = EnumVersionTask::present(Identity::by_id(&enum_id), values(&["red"]))
            .with_target(TargetState::Absent)
            .execute(&catalog, &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_checkmode_with_missing_parent() {
        let catalog = InMemoryCatalog::new();
        let mut session = RunSession::new("test");
        let outcome = EnumVersionTask::present(Identity::by_id("enum-unknown"), values(&["red"]))
            .with_checkmode(true)
            .execute(&catalog, &mut session)
            .await
            .unwrap();
        assert_eq!(outcome.action, TaskAction::WouldCreate);
        assert_eq!(catalog.mutation_count().unwrap(), 0);

        let err = EnumVersionTask::present(Identity::by_id("enum-unknown"), values(&["red"]))
            .execute(&catalog, &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_bump_minor_from_exact_history() {
        let Fixture { catalog, mut session, enum_id } = fixture().await;
        EnumVersionTask::present(Identity::by_id(&enum_id), values(&["a"]))
            .with_version(Some(String::from("2.4.0")), VersionStrategy::Exact)
            .execute(&catalog, &mut session)
            .await
            .unwrap();

        let bumped = EnumVersionTask::present(Identity::by_id(&enum_id), values(&["a", "b"]))
            .with_version(Some(String::from("9.9.9")), VersionStrategy::BumpMinor)
            .execute(&catalog, &mut session)
            .await
            .unwrap();
        assert_eq!(bumped.object.and_then(|o| o.version), Some(String::from("2.5.0")));
    }
}

//! Migration orchestrator.
//!
//! The PRESENT pass copies application domains and their contents from a
//! source catalog into a target catalog. Kinds are processed in dependency
//! order, versions oldest first, and everything the migrator creates is
//! tagged with the run id. The ABSENT passes in [`absent`] undo a run by id
//! or remove domains by name prefix.

mod absent;
mod filter;

pub use absent::{ABSENT_ORDER, MIN_PREFIX_LEN};
pub use filter::NameFilter;

use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::catalog::{
    rewrite_references, CatalogObject, CatalogObserver, Identity, ObjectClient, ObjectKind,
    ParentScope, DEFAULT_PAGE_SIZE, RUN_ID_ATTRIBUTE,
};
use crate::error::{CatalogError, MigrationError, Result};
use crate::planner::{TaskAction, VersionStrategy};
use crate::session::RunSession;
use crate::tasks::{
    ApplicationDomainSettings, ApplicationSettings, ApplicationVersionSettings, EnumSettings,
    EnumVersionSettings, EventApiSettings, EventApiVersionSettings, EventSettings,
    EventVersionSettings, KindSettings, ObjectTask, SchemaSettings, SchemaVersionSettings,
    TopicDomainSettings, VersionTask,
};

/// Default number of ABSENT passes.
pub const DEFAULT_MAX_ABSENT_PASSES: u32 = 10;

/// Kinds migrated inside each domain, in dependency order.
pub const PRESENT_ORDER: [ObjectKind; 6] = [
    ObjectKind::Enum,
    ObjectKind::TopicDomain,
    ObjectKind::Schema,
    ObjectKind::Event,
    ObjectKind::Application,
    ObjectKind::EventApi,
];

/// Options of one migration run.
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Prefix joined to every source domain name in the target.
    pub application_domain_prefix: String,
    /// Compute decisions without mutating the target.
    pub checkmode: bool,
    /// Filter over source application domain names.
    pub domains: NameFilter,
    /// Filter over object names inside the domains.
    pub objects: NameFilter,
    /// Page size for listings.
    pub page_size: u32,
    /// Bound on ABSENT passes.
    pub max_absent_passes: u32,
    /// Pause between ABSENT passes.
    pub pass_delay: Duration,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            application_domain_prefix: String::new(),
            checkmode: false,
            domains: NameFilter::default(),
            objects: NameFilter::default(),
            page_size: DEFAULT_PAGE_SIZE,
            max_absent_passes: DEFAULT_MAX_ABSENT_PASSES,
            pass_delay: Duration::from_secs(1),
        }
    }
}

/// A source domain and its counterpart in the target.
#[derive(Debug, Clone)]
struct DomainPair {
    source: CatalogObject,
    target_name: String,
    /// `None` only in checkmode, when the target domain would be created.
    target_id: Option<String>,
}

/// Maps source version ids to target version ids.
type IdMap = HashMap<String, String>;

/// Drives tasks across two catalogs.
pub struct Migrator<'a> {
    source: &'a dyn ObjectClient,
    target: &'a dyn ObjectClient,
    options: MigrateOptions,
}

impl std::fmt::Debug for Migrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> Migrator<'a> {
    /// Creates a migrator.
    #[must_use]
    pub fn new(source: &'a dyn ObjectClient, target: &'a dyn ObjectClient, options: MigrateOptions) -> Self {
        Self {
            source,
            target,
            options,
        }
    }

    /// Options in effect.
    #[must_use]
    pub const fn options(&self) -> &MigrateOptions {
        &self.options
    }

    fn source_observer(&self) -> CatalogObserver<'a> {
        CatalogObserver::new(self.source).with_page_size(self.options.page_size)
    }

    fn target_observer(&self) -> CatalogObserver<'a> {
        CatalogObserver::new(self.target).with_page_size(self.options.page_size)
    }

    /// Runs the PRESENT pass.
    ///
    /// Per-object failures are recorded as session issues; only setup
    /// failures are returned.
    ///
    /// # Errors
    ///
    /// Returns a setup error if the source domains cannot be listed, an
    /// included domain does not exist or the run-id attribute cannot be
    /// defined in the target.
    pub async fn run_present(&self, session: &mut RunSession) -> Result<()> {
        info!(
            "Starting PRESENT migration, run id {} (checkmode: {})",
            session.run_id(),
            self.options.checkmode
        );

        let sources = self.setup().await?;
        let run_id = session.run_id().to_string();
        session.push_context([("run_id", run_id.as_str()), ("state", "present")]);

        let mut domains = Vec::new();
        for source in sources {
            session.push_context([("domain", source.name.as_str())]);
            match self.migrate_domain(session, &source).await {
                Ok(pair) => domains.push(pair),
                Err(e) => session.add_issue(ObjectKind::ApplicationDomain, source.name.clone(), &e),
            }
            session.pop_context();
        }

        let mut ids = IdMap::new();
        for kind in PRESENT_ORDER {
            for domain in &domains {
                session.push_context([
                    ("domain", domain.source.name.as_str()),
                    ("target_domain", domain.target_name.as_str()),
                    ("kind", kind.as_str()),
                ]);
                self.migrate_kind(session, kind, domain, &mut ids).await;
                session.pop_context();
            }
        }

        session.pop_context();
        info!(
            "PRESENT migration finished: {} task(s), {} issue(s)",
            session.summary().len(),
            session.issues().len()
        );
        Ok(())
    }

    /// Fatal setup: resolve the source domains and define the run-id attribute.
    async fn setup(&self) -> Result<Vec<CatalogObject>> {
        let setup_error = |reason: String| CatalogError::from(MigrationError::Setup { reason });

        let all = self
            .source_observer()
            .list_all(ObjectKind::ApplicationDomain, &ParentScope::default())
            .await
            .map_err(|e| setup_error(format!("cannot list source application domains: {e}")))?;

        let names: Vec<&str> = all.iter().map(|d| d.name.as_str()).collect();
        let unresolved = self.options.domains.unresolved(&names);
        if !unresolved.is_empty() {
            return Err(setup_error(format!(
                "application domain(s) not found in source: {}",
                unresolved.join(", ")
            )));
        }

        let selected = self.options.domains.apply(all, |d| d.name.as_str());
        info!("{} source application domain(s) selected", selected.len());

        if self.options.checkmode {
            debug!("Checkmode: not defining custom attribute '{RUN_ID_ATTRIBUTE}'");
        } else {
            let kinds: Vec<ObjectKind> = ObjectKind::ALL.to_vec();
            self.target
                .ensure_custom_attribute_definition(RUN_ID_ATTRIBUTE, &kinds)
                .await
                .map_err(|e| setup_error(format!("cannot define custom attribute '{RUN_ID_ATTRIBUTE}': {e}")))?;
        }

        Ok(selected)
    }

    async fn migrate_domain(&self, session: &mut RunSession, source: &CatalogObject) -> Result<DomainPair> {
        let target_name = format!("{}{}", self.options.application_domain_prefix, source.name);
        let settings = ApplicationDomainSettings::from_attributes(&source.attributes)?;

        let outcome = ObjectTask::present(Identity::named(&target_name, ParentScope::default()), settings)
            .with_checkmode(self.options.checkmode)
            .with_transaction(session.child_transaction())
            .with_custom_attribute(RUN_ID_ATTRIBUTE, session.run_id())
            .execute(self.target, session)
            .await?;

        Ok(DomainPair {
            source: source.clone(),
            target_name,
            target_id: outcome.object.map(|o| o.id),
        })
    }

    /// Migrates every object of `kind` in one domain. Failures become issues.
    async fn migrate_kind(&self, session: &mut RunSession, kind: ObjectKind, domain: &DomainPair, ids: &mut IdMap) {
        let objects = match self
            .source_observer()
            .list_all(kind, &ParentScope::domain(&domain.source.id))
            .await
        {
            Ok(objects) => self.options.objects.apply(objects, |o| o.name.as_str()),
            Err(e) => {
                session.add_issue(kind, format!("{}/*", domain.source.name), &e);
                return;
            }
        };
        debug!("{} {kind} object(s) in '{}'", objects.len(), domain.source.name);

        for object in objects {
            let result = match kind {
                ObjectKind::Enum => {
                    self.migrate_object::<EnumSettings, EnumVersionSettings>(session, &object, domain, ids)
                        .await
                }
                ObjectKind::TopicDomain => self.migrate_topic_domain(session, &object, domain, ids).await,
                ObjectKind::Schema => {
                    self.migrate_object::<SchemaSettings, SchemaVersionSettings>(session, &object, domain, ids)
                        .await
                }
                ObjectKind::Event => {
                    self.migrate_object::<EventSettings, EventVersionSettings>(session, &object, domain, ids)
                        .await
                }
                ObjectKind::Application => {
                    self.migrate_object::<ApplicationSettings, ApplicationVersionSettings>(
                        session, &object, domain, ids,
                    )
                    .await
                }
                ObjectKind::EventApi => {
                    self.migrate_object::<EventApiSettings, EventApiVersionSettings>(
                        session, &object, domain, ids,
                    )
                    .await
                }
                other => Err(CatalogError::internal(format!("{other} is not migrated per domain"))),
            };

            if let Err(e) = result {
                session.add_issue(kind, object.name.clone(), &e);
            }
        }
    }

    /// Maps the references in `attributes` to target ids.
    fn map_references(kind: ObjectKind, attributes: &serde_json::Value, ids: &IdMap) -> Result<serde_json::Value> {
        rewrite_references(attributes, ids).map_err(|id| {
            CatalogError::validation(format!("{kind} references a version that was not migrated"), id)
        })
    }

    fn planned_id(source_id: &str) -> String {
        format!("planned:{source_id}")
    }

    async fn migrate_topic_domain(
        &self,
        session: &mut RunSession,
        source: &CatalogObject,
        domain: &DomainPair,
        ids: &IdMap,
    ) -> Result<()> {
        let attributes = Self::map_references(source.kind, &source.attributes, ids)?;
        let settings = TopicDomainSettings::from_attributes(&attributes)?;

        let Some(target_domain) = &domain.target_id else {
            Self::plan_missing(session, source, &[]);
            return Ok(());
        };

        ObjectTask::present(Identity::named(&source.name, ParentScope::domain(target_domain)), settings)
            .with_checkmode(self.options.checkmode)
            .with_transaction(session.child_transaction())
            .with_custom_attribute(RUN_ID_ATTRIBUTE, session.run_id())
            .execute(self.target, session)
            .await?;
        Ok(())
    }

    /// Migrates one versioned object and all of its versions, oldest first.
    async fn migrate_object<S, V>(
        &self,
        session: &mut RunSession,
        source: &CatalogObject,
        domain: &DomainPair,
        ids: &mut IdMap,
    ) -> Result<()>
    where
        S: KindSettings,
        V: KindSettings,
    {
        let settings = S::from_attributes(&source.attributes)?;
        let versions = self.source_observer().versions_of(source).await?;

        let Some(target_domain) = &domain.target_id else {
            Self::plan_missing(session, source, &versions);
            for version in &versions {
                ids.insert(version.id.clone(), Self::planned_id(&version.id));
            }
            return Ok(());
        };

        let outcome = ObjectTask::present(Identity::named(&source.name, ParentScope::domain(target_domain)), settings)
            .with_checkmode(self.options.checkmode)
            .with_transaction(session.child_transaction())
            .with_custom_attribute(RUN_ID_ATTRIBUTE, session.run_id())
            .execute(self.target, session)
            .await?;

        let parent = Identity {
            id: outcome.object.as_ref().map(|o| o.id.clone()),
            name: Some(source.name.clone()),
            scope: ParentScope::domain(target_domain),
        };

        for version in &versions {
            let attributes = Self::map_references(version.kind, &version.attributes, ids)?;
            let settings = V::from_attributes(&attributes)?;

            let outcome = VersionTask::present(parent.clone(), settings)
                .with_version(version.version.clone(), VersionStrategy::Exact)
                .with_checkmode(self.options.checkmode)
                .with_transaction(session.child_transaction())
                .with_custom_attribute(RUN_ID_ATTRIBUTE, session.run_id())
                .execute(self.target, session)
                .await?;

            let target_id = match (&outcome.action, outcome.object) {
                (TaskAction::WouldCreate, _) | (_, None) => Self::planned_id(&version.id),
                (_, Some(object)) => object.id,
            };
            ids.insert(version.id.clone(), target_id);
        }
        Ok(())
    }

    /// Records what would be created under a target domain that does not exist yet.
    fn plan_missing(session: &mut RunSession, source: &CatalogObject, versions: &[CatalogObject]) {
        let transaction = session.child_transaction();
        session.record(TaskAction::WouldCreate, source.kind, source.name.clone(), None, transaction);
        for version in versions {
            let transaction = session.child_transaction();
            let label = format!("{}@{}", source.name, version.version.as_deref().unwrap_or("?"));
            session.record(TaskAction::WouldCreate, version.kind, label, None, transaction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, ObjectDraft};
    use serde_json::json;
    use std::collections::BTreeMap;

    async fn add(
        catalog: &InMemoryCatalog,
        kind: ObjectKind,
        scope: ParentScope,
        name: &str,
        version: Option<&str>,
        attributes: serde_json::Value,
    ) -> CatalogObject {
        catalog
            .create(
                kind,
                &scope,
                &ObjectDraft {
                    name: name.to_string(),
                    version: version.map(String::from),
                    attributes,
                    custom_attributes: BTreeMap::new(),
                },
            )
            .await
            .unwrap()
    }

    /// A rideshare domain with an enum, a schema, an event and an application.
    async fn rideshare(catalog: &InMemoryCatalog, name: &str) {
        let domain = add(catalog, ObjectKind::ApplicationDomain, ParentScope::default(), name, None, json!({})).await;
        let scope = || ParentScope::domain(&domain.id);

        let colors = add(catalog, ObjectKind::Enum, scope(), "Colors", None, json!({ "shared": false })).await;
        let colors_v1 = add(
            catalog,
            ObjectKind::EnumVersion,
            ParentScope::parent(&colors.id),
            "Colors",
            Some("1.0.0"),
            json!({ "values": ["red", "blue"] }),
        )
        .await;

        let schema = add(
            catalog,
            ObjectKind::Schema,
            scope(),
            "RideRequested",
            None,
            json!({ "shared": false, "contentType": "json", "schemaType": "jsonSchema" }),
        )
        .await;
        let schema_v1 = add(
            catalog,
            ObjectKind::SchemaVersion,
            ParentScope::parent(&schema.id),
            "RideRequested",
            Some("1.0.0"),
            json!({ "content": "{}" }),
        )
        .await;
        add(
            catalog,
            ObjectKind::SchemaVersion,
            ParentScope::parent(&schema.id),
            "RideRequested",
            Some("1.1.0"),
            json!({ "content": "{\"type\":\"object\"}" }),
        )
        .await;

        let event = add(catalog, ObjectKind::Event, scope(), "RideRequested", None, json!({ "shared": true })).await;
        let event_v1 = add(
            catalog,
            ObjectKind::EventVersion,
            ParentScope::parent(&event.id),
            "RideRequested",
            Some("1.0.0"),
            json!({
                "schemaVersionId": schema_v1.id,
                "deliveryDescriptor": {
                    "brokerType": "solace",
                    "address": {
                        "addressLevels": [
                            { "name": "ride", "addressLevelType": "literal" },
                            { "name": "color", "addressLevelType": "variable", "enumVersionId": colors_v1.id }
                        ]
                    }
                }
            }),
        )
        .await;

        let app = add(
            catalog,
            ObjectKind::Application,
            scope(),
            "Dispatcher",
            None,
            json!({ "applicationType": "standard" }),
        )
        .await;
        add(
            catalog,
            ObjectKind::ApplicationVersion,
            ParentScope::parent(&app.id),
            "Dispatcher",
            Some("0.1.0"),
            json!({ "declaredConsumedEventVersionIds": [event_v1.id] }),
        )
        .await;
    }

    pub(super) fn options(include: &[&str]) -> MigrateOptions {
        MigrateOptions {
            domains: NameFilter::new(include.iter().map(|s| (*s).to_string()).collect(), Vec::new()),
            pass_delay: Duration::ZERO,
            ..MigrateOptions::default()
        }
    }

    pub(super) async fn source() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        rideshare(&catalog, "Acme Rideshare").await;
        rideshare(&catalog, "Nils Rideshare").await;
        catalog
    }

    #[tokio::test]
    async fn test_present_then_absent_by_run_id() {
        let source = source().await;
        let target = InMemoryCatalog::new();
        let migrator = Migrator::new(&source, &target, options(&["Acme Rideshare"]));

        let mut session = RunSession::new("run-42");
        migrator.run_present(&mut session).await.unwrap();
        assert!(session.issues().is_empty(), "{:?}", session.issues());

        let domains = target.objects_of(ObjectKind::ApplicationDomain).unwrap();
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].name, "Acme Rideshare");

        let summary = session.migration_summary();
        assert_eq!(summary.kind(ObjectKind::ApplicationDomain).created, 1);
        assert_eq!(summary.kind(ObjectKind::Enum).created, 1);
        assert_eq!(summary.kind(ObjectKind::SchemaVersion).first_versions, 1);
        assert_eq!(summary.kind(ObjectKind::SchemaVersion).new_versions, 1);
        assert_eq!(summary.kind(ObjectKind::ApplicationVersion).first_versions, 1);

        // references point at target ids
        let event_versions = target.objects_of(ObjectKind::EventVersion).unwrap();
        let schema_versions = target.objects_of(ObjectKind::SchemaVersion).unwrap();
        assert_eq!(
            event_versions[0].attributes["schemaVersionId"],
            json!(schema_versions[0].id)
        );

        let tagged = target
            .snapshot()
            .unwrap()
            .objects
            .iter()
            .filter(|o| o.custom_attribute(RUN_ID_ATTRIBUTE) == Some("run-42"))
            .count();
        assert_eq!(tagged, target.snapshot().unwrap().objects.len());

        let mut absent = RunSession::new("cleanup");
        migrator.run_absent_by_run_id(&mut absent, "run-42").await.unwrap();
        assert!(absent.issues().is_empty(), "{:?}", absent.issues());
        assert!(target.snapshot().unwrap().objects.is_empty());
    }

    #[tokio::test]
    async fn test_present_is_idempotent() {
        let source = source().await;
        let target = InMemoryCatalog::new();
        let migrator = Migrator::new(&source, &target, options(&[]));

        let mut first = RunSession::new("run-1");
        migrator.run_present(&mut first).await.unwrap();
        let created = target.snapshot().unwrap().objects.len();

        let before = target.mutation_count().unwrap();
        let mut second = RunSession::new("run-2");
        migrator.run_present(&mut second).await.unwrap();

        assert!(second.issues().is_empty(), "{:?}", second.issues());
        assert!(second.summary().actions().iter().all(|a| *a == TaskAction::NoAction));
        assert_eq!(target.snapshot().unwrap().objects.len(), created);
        assert_eq!(target.mutation_count().unwrap(), before);
    }

    #[tokio::test]
    async fn test_no_action_keeps_existing_tags() {
        let source = source().await;
        let target = InMemoryCatalog::new();
        let domain = add(&target, ObjectKind::ApplicationDomain, ParentScope::default(), "Acme Rideshare", None, json!({})).await;
        let colors = target
            .create(
                ObjectKind::Enum,
                &ParentScope::domain(&domain.id),
                &ObjectDraft {
                    name: String::from("Colors"),
                    version: None,
                    attributes: json!({ "shared": false }),
                    custom_attributes: [(RUN_ID_ATTRIBUTE.to_string(), String::from("run-0"))]
                        .into_iter()
                        .collect(),
                },
            )
            .await
            .unwrap();

        let migrator = Migrator::new(&source, &target, options(&["Acme Rideshare"]));
        let mut session = RunSession::new("run-42");
        migrator.run_present(&mut session).await.unwrap();
        assert!(session.issues().is_empty(), "{:?}", session.issues());

        let log = session.summary().get_summary_log_list();
        let action_of = |kind: ObjectKind| log.iter().find(|e| e.kind == kind).map(|e| e.action);
        assert_eq!(action_of(ObjectKind::ApplicationDomain), Some(TaskAction::NoAction));
        assert_eq!(action_of(ObjectKind::Enum), Some(TaskAction::NoAction));

        let domain = target.objects_of(ObjectKind::ApplicationDomain).unwrap().remove(0);
        assert_eq!(domain.custom_attribute(RUN_ID_ATTRIBUTE), None);
        let after = target.objects_of(ObjectKind::Enum).unwrap().remove(0);
        assert_eq!(after.id, colors.id);
        assert_eq!(after.custom_attribute(RUN_ID_ATTRIBUTE), Some("run-0"));

        // the version created under the existing enum carries this run's tag
        let version = target.objects_of(ObjectKind::EnumVersion).unwrap().remove(0);
        assert_eq!(version.custom_attribute(RUN_ID_ATTRIBUTE), Some("run-42"));
    }

    #[tokio::test]
    async fn test_checkmode_leaves_target_untouched() {
        let source = source().await;
        let target = InMemoryCatalog::new();
        let migrator = Migrator::new(
            &source,
            &target,
            MigrateOptions {
                checkmode: true,
                ..options(&["Nils Rideshare"])
            },
        );

        let mut session = RunSession::new("dry");
        migrator.run_present(&mut session).await.unwrap();

        assert_eq!(target.mutation_count().unwrap(), 0);
        assert!(session.issues().is_empty(), "{:?}", session.issues());
        assert!(session.summary().actions().iter().all(|a| *a == TaskAction::WouldCreate));
        assert_eq!(session.migration_summary().totals().planned, 10);
    }

    #[tokio::test]
    async fn test_unknown_include_is_fatal() {
        let source = source().await;
        let target = InMemoryCatalog::new();
        let migrator = Migrator::new(&source, &target, options(&["Ghost Rideshare"]));

        let err = migrator.run_present(&mut RunSession::new("x")).await.unwrap_err();
        assert!(matches!(err, CatalogError::Migration(MigrationError::Setup { .. })));
        assert_eq!(target.mutation_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_prefix_and_unresolved_reference() {
        let source = source().await;
        let target = InMemoryCatalog::new();
        let migrator = Migrator::new(
            &source,
            &target,
            MigrateOptions {
                application_domain_prefix: String::from("copy/"),
                objects: NameFilter::new(Vec::new(), vec![String::from("RideRequested")]),
                ..options(&["Acme Rideshare"])
            },
        );

        let mut session = RunSession::new("run-7");
        migrator.run_present(&mut session).await.unwrap();

        let domains = target.objects_of(ObjectKind::ApplicationDomain).unwrap();
        assert_eq!(domains[0].name, "copy/Acme Rideshare");

        // the application consumes an event that was filtered out
        assert_eq!(session.issues().len(), 1);
        assert_eq!(session.issues()[0].kind, ObjectKind::Application);
        assert_eq!(session.issues()[0].error_kind, crate::error::ErrorKind::Validation);
        assert_eq!(target.objects_of(ObjectKind::Enum).unwrap().len(), 1);
    }
}

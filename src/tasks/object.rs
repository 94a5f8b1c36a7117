//! Object tasks: one resource instance driven to PRESENT or ABSENT.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::catalog::{CatalogObject, Identity, ObjectClient, ObjectDraft, ObjectKind};
use crate::error::{CatalogError, Result};
use crate::planner::{
    decide, project, Decision, DiffEngine, Difference, Observation, TargetState, TaskAction,
};
use crate::session::{RunSession, TransactionData};

use super::settings::KindSettings;
use super::TaskOutcome;

/// Reconciles one non-versioned object.
#[derive(Debug, Clone)]
pub struct ObjectTask<S: KindSettings> {
    identity: Identity,
    target: TargetState,
    settings: Option<S>,
    checkmode: bool,
    transaction: Option<TransactionData>,
    custom_attributes: BTreeMap<String, String>,
}

impl<S: KindSettings> ObjectTask<S> {
    /// Task that makes the object exist with `settings`.
    #[must_use]
    pub fn present(identity: Identity, settings: S) -> Self {
        Self {
            identity,
            target: TargetState::Present,
            settings: Some(settings),
            checkmode: false,
            transaction: None,
            custom_attributes: BTreeMap::new(),
        }
    }

    /// Task that makes the object not exist.
    #[must_use]
    pub fn absent(identity: Identity) -> Self {
        Self {
            identity,
            target: TargetState::Absent,
            settings: None,
            checkmode: false,
            transaction: None,
            custom_attributes: BTreeMap::new(),
        }
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

    /// Adds a custom attribute written together with a created object.
    #[must_use]
    pub fn with_custom_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_attributes.insert(name.into(), value.into());
        self
    }

    /// Kind handled by this task.
    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        S::KIND
    }

    /// Target state.
    #[must_use]
    pub const fn target(&self) -> TargetState {
        self.target
    }

    fn label(&self) -> String {
        self.identity.to_string()
    }

    fn validate(&self) -> Result<()> {
        if self.identity.is_empty() {
            return Err(CatalogError::validation(
                format!("{} task needs an id or a name", S::KIND),
                "",
            ));
        }
        if self.identity.id.is_none()
            && S::KIND.is_domain_scoped()
            && self.identity.scope.application_domain_id.is_none()
        {
            return Err(CatalogError::validation(
                format!("{} lookup by name needs an application domain id", S::KIND),
                self.label(),
            ));
        }
        if self.target == TargetState::Present && self.settings.is_none() {
            return Err(CatalogError::validation(
                format!("{} task with target PRESENT needs settings", S::KIND),
                self.label(),
            ));
        }
        Ok(())
    }

    /// Compares the existing object with the desired settings.
    fn observe(
        existing: &CatalogObject,
        requested: &serde_json::Value,
    ) -> (Observation, Vec<String>, Option<Difference>) {
        let fields = S::KIND.compare_fields();
        let result = DiffEngine::new().compare(
            &project(&existing.attributes, &fields),
            &project(requested, &fields),
        );
        if result.is_equal {
            return (Observation::Unchanged, Vec::new(), None);
        }

        let immutable = S::KIND.rules().immutable;
        let blocked: Vec<String> = result
            .changed_fields()
            .into_iter()
            .filter(|f| immutable.contains(&f.as_str()))
            .collect();
        if blocked.is_empty() {
            (Observation::Changed, result.changed_fields(), result.difference)
        } else {
            (Observation::ChangeNotSupported, blocked, result.difference)
        }
    }

    /// Custom attributes are only written when the object is created.
    fn draft(&self, name: String, attributes: serde_json::Value, action: TaskAction) -> ObjectDraft {
        let custom_attributes = if action == TaskAction::Create {
            self.custom_attributes.clone()
        } else {
            BTreeMap::new()
        };
        ObjectDraft {
            name,
            version: None,
            attributes,
            custom_attributes,
        }
    }

    /// Runs the task: resolve, decide, mutate unless in checkmode, record.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an incomplete task, an update-not-supported
    /// error when immutable fields differ outside checkmode, or the wrapped
    /// client error.
    pub async fn execute(&self, client: &dyn ObjectClient, session: &mut RunSession) -> Result<TaskOutcome> {
        let kind = S::KIND;
        let label = self.label();
        let wrap = |action: TaskAction| {
            let label = label.clone();
            move |e: CatalogError| e.in_task(kind, label, action)
        };

        self.validate().map_err(wrap(TaskAction::NoAction))?;

        let existing = client
            .get(kind, &self.identity)
            .await
            .map_err(wrap(TaskAction::NoAction))?;

        let requested = match &self.settings {
            Some(settings) => Some(settings.to_attributes().map_err(wrap(TaskAction::NoAction))?),
            None => None,
        };

        let (observation, fields, difference) = match (&existing, &requested, self.target) {
            (None, _, _) => (Observation::Missing, Vec::new(), None),
            (Some(_), _, TargetState::Absent) | (Some(_), None, _) => {
                (Observation::Unchanged, Vec::new(), None)
            }
            (Some(object), Some(requested), TargetState::Present) => Self::observe(object, requested),
        };
        debug!("{kind} '{label}' observed as {observation:?} (fields: {fields:?})");

        let action = match decide(self.target, observation, self.checkmode) {
            Decision::Act(action) => action,
            Decision::RejectUpdate => {
                return Err(CatalogError::UpdateNotSupported {
                    kind,
                    identity: label.clone(),
                    fields,
                }
                .in_task(kind, label.clone(), TaskAction::Update));
            }
        };

        let attributes = requested.unwrap_or_default();
        let object = match (action, existing) {
            (TaskAction::Create, _) => {
                let name = self.identity.name.clone().ok_or_else(|| {
                    wrap(action)(CatalogError::validation(
                        format!("cannot create {kind} without a name"),
                        label.clone(),
                    ))
                })?;
                let created = client
                    .create(kind, &self.identity.scope, &self.draft(name, attributes, action))
                    .await
                    .map_err(wrap(action))?;
                Some(created)
            }
            (TaskAction::Update, Some(current)) => {
                let updated = client
                    .update(kind, &current.id, &self.draft(current.name.clone(), attributes, action))
                    .await
                    .map_err(wrap(action))?;
                Some(updated)
            }
            (TaskAction::Delete, Some(current)) => {
                let deleted = client.delete(kind, &current.id).await.map_err(wrap(action))?;
                Some(deleted)
            }
            (TaskAction::Update | TaskAction::Delete, None) => {
                return Err(wrap(action)(CatalogError::internal(format!(
                    "{action} decided for a missing {kind}"
                ))));
            }
            (_, existing) => existing,
        };

        let transaction = self.transaction.clone().unwrap_or_default();
        let entry = session.record(action, kind, label.clone(), object.as_ref(), transaction);
        info!("[{}] {kind} '{label}': {action}", session.run_id());

        Ok(TaskOutcome {
            action,
            object,
            entry,
            difference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, ParentScope};
    use crate::error::ErrorKind;
    use crate::tasks::settings::{
        AddressLevel, AddressLevelType, ApplicationDomainSettings, SchemaSettings, TopicDomainSettings,
    };
    use crate::tasks::testing::MockClient;
    use crate::tasks::{ApplicationDomainTask, SchemaTask, TopicDomainTask};
    use serde_json::json;

    async fn domain(catalog: &InMemoryCatalog, session: &mut RunSession) -> String {
        let outcome = ApplicationDomainTask::present(
            Identity::named("orders", ParentScope::default()),
            ApplicationDomainSettings::default(),
        )
        .execute(catalog, session)
        .await
        .unwrap();
        outcome.object.unwrap().id
    }

    fn schema(content_type: &str, schema_type: &str) -> SchemaSettings {
        SchemaSettings {
            shared: false,
            content_type: content_type.to_string(),
            schema_type: schema_type.to_string(),
        }
    }

    #[tokio::test]
    async fn test_absent_missing_never_mutates() {
        let mut client = MockClient::new();
        client.expect_get().times(1).returning(|_, _| Ok(None));
        client.expect_create().never();
        client.expect_update().never();
        client.expect_delete().never();

        let mut session = RunSession::new("test");
        let outcome = SchemaTask::absent(Identity::named("Order", ParentScope::domain("d1")))
            .execute(&client, &mut session)
            .await
            .unwrap();

        assert_eq!(outcome.action, TaskAction::NoAction);
        assert!(outcome.object.is_none());
        assert_eq!(session.summary().len(), 1);
    }

    #[tokio::test]
    async fn test_checkmode_never_mutates() {
        let mut client = MockClient::new();
        client.expect_get().returning(|kind, _| {
            Ok(Some(CatalogObject {
                id: String::from("s1"),
                kind,
                name: String::from("Order"),
                scope: ParentScope::domain("d1"),
                version: None,
                attributes: json!({ "shared": false, "contentType": "xml", "schemaType": "jsonSchema" }),
                custom_attributes: BTreeMap::new(),
            }))
        });
        client.expect_create().never();
        client.expect_update().never();
        client.expect_delete().never();

        let mut session = RunSession::new("test");
        let identity = Identity::named("Order", ParentScope::domain("d1"));

        let outcome = SchemaTask::present(identity.clone(), schema("json", "jsonSchema"))
            .with_checkmode(true)
            .execute(&client, &mut session)
            .await
            .unwrap();
        assert_eq!(outcome.action, TaskAction::WouldUpdate);

        let outcome = SchemaTask::present(identity.clone(), schema("json", "avro"))
            .with_checkmode(true)
            .execute(&client, &mut session)
            .await
            .unwrap();
        assert_eq!(outcome.action, TaskAction::WouldFailToUpdate);
        let difference = outcome.difference.unwrap();
        assert_eq!(difference["schemaType"].to, Some(json!("avro")));

        let outcome = SchemaTask::absent(identity)
            .with_checkmode(true)
            .execute(&client, &mut session)
            .await
            .unwrap();
        assert_eq!(outcome.action, TaskAction::WouldDelete);
    }

    #[tokio::test]
    async fn test_create_update_delete_cycle() {
        let catalog = InMemoryCatalog::new();
        let mut session = RunSession::new("test");
        let domain_id = domain(&catalog, &mut session).await;
        let identity = Identity::named("Order", ParentScope::domain(&domain_id));

        let first = SchemaTask::present(identity.clone(), schema("json", "jsonSchema"))
            .execute(&catalog, &mut session)
            .await
            .unwrap();
        assert_eq!(first.action, TaskAction::Create);

        let again = SchemaTask::present(identity.clone(), schema("json", "jsonSchema"))
            .execute(&catalog, &mut session)
            .await
            .unwrap();
        assert_eq!(again.action, TaskAction::NoAction);
        assert_eq!(again.object, first.object);

        let changed = SchemaTask::present(identity.clone(), schema("xml", "jsonSchema"))
            .execute(&catalog, &mut session)
            .await
            .unwrap();
        assert_eq!(changed.action, TaskAction::Update);
        assert_eq!(changed.object.unwrap().attributes["contentType"], "xml");

        let gone = SchemaTask::absent(identity.clone())
            .execute(&catalog, &mut session)
            .await
            .unwrap();
        assert_eq!(gone.action, TaskAction::Delete);

        let before = catalog.mutation_count().unwrap();
        let noop = SchemaTask::absent(identity).execute(&catalog, &mut session).await.unwrap();
        assert_eq!(noop.action, TaskAction::NoAction);
        assert_eq!(catalog.mutation_count().unwrap(), before);
    }

    #[tokio::test]
    async fn test_custom_attributes_only_on_create() {
        let catalog = InMemoryCatalog::new();
        let mut session = RunSession::new("test");
        let domain_id = domain(&catalog, &mut session).await;
        let identity = Identity::named("Order", ParentScope::domain(&domain_id));

        SchemaTask::present(identity.clone(), schema("json", "jsonSchema"))
            .execute(&catalog, &mut session)
            .await
            .unwrap();

        let updated = SchemaTask::present(identity.clone(), schema("xml", "jsonSchema"))
            .with_custom_attribute("catalog_migrate_run_id", "run-42")
            .execute(&catalog, &mut session)
            .await
            .unwrap();
        assert_eq!(updated.action, TaskAction::Update);
        assert_eq!(updated.object.unwrap().custom_attribute("catalog_migrate_run_id"), None);

        let created = SchemaTask::present(
            Identity::named("Invoice", ParentScope::domain(&domain_id)),
            schema("json", "jsonSchema"),
        )
        .with_custom_attribute("catalog_migrate_run_id", "run-42")
        .execute(&catalog, &mut session)
        .await
        .unwrap();
        assert_eq!(created.action, TaskAction::Create);
        assert_eq!(
            created.object.unwrap().custom_attribute("catalog_migrate_run_id"),
            Some("run-42")
        );
    }

    #[tokio::test]
    async fn test_update_payload_has_no_custom_attributes() {
        let mut client = MockClient::new();
        client.expect_get().returning(|kind, _| {
            Ok(Some(CatalogObject {
                id: String::from("s1"),
                kind,
                name: String::from("Order"),
                scope: ParentScope::domain("d1"),
                version: None,
                attributes: json!({ "shared": false, "contentType": "xml", "schemaType": "jsonSchema" }),
                custom_attributes: BTreeMap::new(),
            }))
        });
        client
            .expect_update()
            .times(1)
            .withf(|_, _, draft| draft.custom_attributes.is_empty())
            .returning(|kind, id, draft| {
                Ok(CatalogObject {
                    id: id.to_string(),
                    kind,
                    name: draft.name.clone(),
                    scope: ParentScope::domain("d1"),
                    version: None,
                    attributes: draft.attributes.clone(),
                    custom_attributes: BTreeMap::new(),
                })
            });

        let mut session = RunSession::new("run-42");
        let outcome = SchemaTask::present(
            Identity::named("Order", ParentScope::domain("d1")),
            schema("json", "jsonSchema"),
        )
        .with_custom_attribute("catalog_migrate_run_id", "run-42")
        .execute(&client, &mut session)
        .await
        .unwrap();
        assert_eq!(outcome.action, TaskAction::Update);
    }

    #[tokio::test]
    async fn test_immutable_change_is_rejected() {
        let catalog = InMemoryCatalog::new();
        let mut session = RunSession::new("test");
        let domain_id = domain(&catalog, &mut session).await;
        let identity = Identity::named("orders/topics", ParentScope::domain(&domain_id));
        let levels = |name: &str| TopicDomainSettings {
            broker_type: String::from("solace"),
            address_levels: vec![AddressLevel {
                name: name.to_string(),
                address_level_type: AddressLevelType::Literal,
                enum_version_id: None,
            }],
        };

        TopicDomainTask::present(identity.clone(), levels("orders"))
            .execute(&catalog, &mut session)
            .await
            .unwrap();

        let err = TopicDomainTask::present(identity, levels("billing"))
            .execute(&catalog, &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpdateNotSupported);
        assert!(err.to_string().contains("addressLevels"));
    }

    #[tokio::test]
    async fn test_name_lookup_needs_domain() {
        let client = MockClient::new();
        let mut session = RunSession::new("test");
        let err = SchemaTask::absent(Identity::named("Order", ParentScope::default()))
            .execute(&client, &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(session.summary().is_empty());
    }
}

//! Reconciliation tasks.
//!
//! A task is built fresh for one resource instance, executed once against an
//! [`ObjectClient`](crate::catalog::ObjectClient) and a
//! [`RunSession`](crate::session::RunSession), and then dropped. Object kinds
//! use [`ObjectTask`]; versioned sub-objects use [`VersionTask`].

mod object;
mod settings;
mod version;

pub use object::ObjectTask;
pub use settings::{
    AddressLevel, AddressLevelType, ApplicationDomainSettings, ApplicationSettings,
    ApplicationVersionSettings, DeliveryDescriptor, EnumSettings, EnumVersionSettings,
    EventApiSettings, EventApiVersionSettings, EventSettings, EventVersionSettings, KindSettings,
    SchemaSettings, SchemaVersionSettings, TopicAddress, TopicDomainSettings,
};
pub use version::VersionTask;

use crate::catalog::CatalogObject;
use crate::planner::{Difference, TaskAction};
use crate::session::TransactionLogEntry;

/// Result of one task execution.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Decided action.
    pub action: TaskAction,
    /// Resulting object, or the pre-existing one when nothing changed.
    pub object: Option<CatalogObject>,
    /// Entry appended to the run summary.
    pub entry: TransactionLogEntry,
    /// Field delta behind an update decision.
    pub difference: Option<Difference>,
}

/// Task for an application domain.
pub type ApplicationDomainTask = ObjectTask<ApplicationDomainSettings>;
/// Task for a topic domain.
pub type TopicDomainTask = ObjectTask<TopicDomainSettings>;
/// Task for an enumeration.
pub type EnumTask = ObjectTask<EnumSettings>;
/// Task for an enumeration version.
pub type EnumVersionTask = VersionTask<EnumVersionSettings>;
/// Task for a schema.
pub type SchemaTask = ObjectTask<SchemaSettings>;
/// Task for a schema version.
pub type SchemaVersionTask = VersionTask<SchemaVersionSettings>;
/// Task for an event.
pub type EventTask = ObjectTask<EventSettings>;
/// Task for an event version.
pub type EventVersionTask = VersionTask<EventVersionSettings>;
/// Task for an application.
pub type ApplicationTask = ObjectTask<ApplicationSettings>;
/// Task for an application version.
pub type ApplicationVersionTask = VersionTask<ApplicationVersionSettings>;
/// Task for an event API.
pub type EventApiTask = ObjectTask<EventApiSettings>;
/// Task for an event API version.
pub type EventApiVersionTask = VersionTask<EventApiVersionSettings>;

#[cfg(test)]
pub(crate) mod testing {
    use mockall::mock;

    use crate::catalog::{
        CatalogObject, Identity, ListQuery, ObjectClient, ObjectDraft, ObjectKind, Page, ParentScope,
    };
    use crate::error::Result;

    mock! {
        pub Client {}

        #[async_trait::async_trait]
        impl ObjectClient for Client {
            async fn get(&self, kind: ObjectKind, identity: &Identity) -> Result<Option<CatalogObject>>;
            async fn list(&self, kind: ObjectKind, query: &ListQuery) -> Result<Page<CatalogObject>>;
            async fn create(
                &self,
                kind: ObjectKind,
                scope: &ParentScope,
                draft: &ObjectDraft,
            ) -> Result<CatalogObject>;
            async fn update(&self, kind: ObjectKind, id: &str, draft: &ObjectDraft) -> Result<CatalogObject>;
            async fn delete(&self, kind: ObjectKind, id: &str) -> Result<CatalogObject>;
            async fn ensure_custom_attribute_definition(&self, name: &str, kinds: &[ObjectKind]) -> Result<()>;
        }
    }
}

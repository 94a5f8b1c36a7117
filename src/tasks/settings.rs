//! Desired settings per kind.
//!
//! Each struct serializes to the attribute object the catalog stores, using
//! the catalog's camelCase field names. Which of those fields can change in
//! place is decided by the kind's rules in [`crate::catalog::KIND_RULES`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::ObjectKind;
use crate::error::{CatalogError, Result};

/// Settings type bound to one object kind.
pub trait KindSettings: Serialize + DeserializeOwned + Clone + std::fmt::Debug + Send + Sync {
    /// Kind these settings describe.
    const KIND: ObjectKind;

    /// Serializes the settings to an attribute object.
    ///
    /// # Errors
    ///
    /// Returns an internal error if serialization fails.
    fn to_attributes(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| {
            CatalogError::internal(format!("Failed to serialize {} settings: {e}", Self::KIND))
        })
    }

    /// Reads settings from an attribute object.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the attributes do not fit.
    fn from_attributes(attributes: &Value) -> Result<Self> {
        serde_json::from_value(attributes.clone()).map_err(|e| {
            CatalogError::validation(format!("Invalid {} settings: {e}", Self::KIND), attributes.to_string())
        })
    }
}

/// Settings of an application domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDomainSettings {
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Enforce unique topic addresses across the domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_topic_address_enforcement_enabled: Option<bool>,
    /// Require topic addresses to match a topic domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_domain_enforcement_enabled: Option<bool>,
}

/// Type of one topic address level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddressLevelType {
    /// Fixed text.
    Literal,
    /// Placeholder, optionally bound to an enumeration version.
    Variable,
}

/// One level of a topic address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressLevel {
    /// Level name or literal text.
    pub name: String,
    /// Level type.
    pub address_level_type: AddressLevelType,
    /// Enumeration version a variable level is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_version_id: Option<String>,
}

/// Settings of a topic domain. Nothing can change once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDomainSettings {
    /// Broker type, e.g. `solace`.
    pub broker_type: String,
    /// Address levels.
    pub address_levels: Vec<AddressLevel>,
}

/// Settings of an enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumSettings {
    /// Visible outside the owning domain.
    #[serde(default)]
    pub shared: bool,
}

/// Settings of an enumeration version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumVersionSettings {
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Lifecycle state id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
    /// Allowed values; order is not significant.
    #[serde(default)]
    pub values: Vec<String>,
}

/// Settings of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSettings {
    /// Visible outside the owning domain.
    #[serde(default)]
    pub shared: bool,
    /// Content type, e.g. `json`.
    pub content_type: String,
    /// Schema type, e.g. `jsonSchema`. Immutable.
    pub schema_type: String,
}

/// Settings of a schema version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaVersionSettings {
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Lifecycle state id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
    /// Schema document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Settings of an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSettings {
    /// Visible outside the owning domain.
    #[serde(default)]
    pub shared: bool,
    /// Broker type. Immutable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_type: Option<String>,
}

/// Topic address of an event version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicAddress {
    /// Address levels.
    #[serde(default)]
    pub address_levels: Vec<AddressLevel>,
    /// Address type, e.g. `topic`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_type: Option<String>,
}

/// Where and how an event version is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDescriptor {
    /// Broker type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_type: Option<String>,
    /// Topic address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<TopicAddress>,
}

/// Settings of an event version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventVersionSettings {
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Lifecycle state id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
    /// Payload schema version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version_id: Option<String>,
    /// Delivery descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_descriptor: Option<DeliveryDescriptor>,
}

/// Settings of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSettings {
    /// Application type, e.g. `standard`. Immutable.
    pub application_type: String,
    /// Broker type. Immutable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_type: Option<String>,
}

/// Settings of an application version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationVersionSettings {
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Lifecycle state id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
    /// Event versions the application publishes.
    #[serde(default)]
    pub declared_produced_event_version_ids: Vec<String>,
    /// Event versions the application subscribes to.
    #[serde(default)]
    pub declared_consumed_event_version_ids: Vec<String>,
}

/// Settings of an event API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventApiSettings {
    /// Visible outside the owning domain.
    #[serde(default)]
    pub shared: bool,
    /// Broker type. Immutable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_type: Option<String>,
}

/// Settings of an event API version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventApiVersionSettings {
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Lifecycle state id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
    /// Event versions the API produces.
    #[serde(default)]
    pub produced_event_version_ids: Vec<String>,
    /// Event versions the API consumes.
    #[serde(default)]
    pub consumed_event_version_ids: Vec<String>,
}

macro_rules! bind_kind {
    ($($settings:ty => $kind:ident),+ $(,)?) => {
        $(
            impl KindSettings for $settings {
                const KIND: ObjectKind = ObjectKind::$kind;
            }
        )+
    };
}

bind_kind! {
    ApplicationDomainSettings => ApplicationDomain,
    TopicDomainSettings => TopicDomain,
    EnumSettings => Enum,
    EnumVersionSettings => EnumVersion,
    SchemaSettings => Schema,
    SchemaVersionSettings => SchemaVersion,
    EventSettings => Event,
    EventVersionSettings => EventVersion,
    ApplicationSettings => Application,
    ApplicationVersionSettings => ApplicationVersion,
    EventApiSettings => EventApi,
    EventApiVersionSettings => EventApiVersion,
}

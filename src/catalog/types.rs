//! Catalog object model.
//!
//! These types describe objects as the catalog stores them, independent of
//! whether they come from the REST API or from an in-memory snapshot.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Kind of a catalog object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectKind {
    /// Application domain; the top-level scope.
    ApplicationDomain,
    /// Topic domain inside an application domain.
    TopicDomain,
    /// Enumeration.
    Enum,
    /// Enumeration version.
    EnumVersion,
    /// Schema.
    Schema,
    /// Schema version.
    SchemaVersion,
    /// Event.
    Event,
    /// Event version.
    EventVersion,
    /// Application.
    Application,
    /// Application version.
    ApplicationVersion,
    /// Event API.
    EventApi,
    /// Event API version.
    EventApiVersion,
}

/// Field rules of one object kind.
#[derive(Debug)]
pub struct KindRules {
    /// The kind these rules apply to.
    pub kind: ObjectKind,
    /// Fields that can be changed in place (for version kinds: the fields a
    /// new version is compared on).
    pub updatable: &'static [&'static str],
    /// Fields that cannot be changed once the object exists.
    pub immutable: &'static [&'static str],
}

/// Field rules for every kind, in [`ObjectKind`] declaration order.
pub static KIND_RULES: [KindRules; 12] = [
    KindRules {
        kind: ObjectKind::ApplicationDomain,
        updatable: &[
            "description",
            "uniqueTopicAddressEnforcementEnabled",
            "topicDomainEnforcementEnabled",
        ],
        immutable: &[],
    },
    KindRules {
        kind: ObjectKind::TopicDomain,
        updatable: &[],
        immutable: &["brokerType", "addressLevels"],
    },
    KindRules {
        kind: ObjectKind::Enum,
        updatable: &["shared"],
        immutable: &[],
    },
    KindRules {
        kind: ObjectKind::EnumVersion,
        updatable: &["description", "displayName", "stateId", "values"],
        immutable: &[],
    },
    KindRules {
        kind: ObjectKind::Schema,
        updatable: &["shared", "contentType"],
        immutable: &["schemaType"],
    },
    KindRules {
        kind: ObjectKind::SchemaVersion,
        updatable: &["description", "displayName", "stateId", "content"],
        immutable: &[],
    },
    KindRules {
        kind: ObjectKind::Event,
        updatable: &["shared"],
        immutable: &["brokerType"],
    },
    KindRules {
        kind: ObjectKind::EventVersion,
        updatable: &[
            "description",
            "displayName",
            "stateId",
            "schemaVersionId",
            "deliveryDescriptor",
        ],
        immutable: &[],
    },
    KindRules {
        kind: ObjectKind::Application,
        updatable: &[],
        immutable: &["applicationType", "brokerType"],
    },
    KindRules {
        kind: ObjectKind::ApplicationVersion,
        updatable: &[
            "description",
            "displayName",
            "stateId",
            "declaredProducedEventVersionIds",
            "declaredConsumedEventVersionIds",
        ],
        immutable: &[],
    },
    KindRules {
        kind: ObjectKind::EventApi,
        updatable: &["shared"],
        immutable: &["brokerType"],
    },
    KindRules {
        kind: ObjectKind::EventApiVersion,
        updatable: &[
            "description",
            "displayName",
            "stateId",
            "producedEventVersionIds",
            "consumedEventVersionIds",
        ],
        immutable: &[],
    },
];

impl ObjectKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::ApplicationDomain,
        Self::TopicDomain,
        Self::Enum,
        Self::EnumVersion,
        Self::Schema,
        Self::SchemaVersion,
        Self::Event,
        Self::EventVersion,
        Self::Application,
        Self::ApplicationVersion,
        Self::EventApi,
        Self::EventApiVersion,
    ];

    /// Returns the field rules for this kind.
    #[must_use]
    pub fn rules(self) -> &'static KindRules {
        &KIND_RULES[self as usize]
    }

    /// Returns every field the diff engine looks at for this kind.
    #[must_use]
    pub fn compare_fields(self) -> Vec<&'static str> {
        let rules = self.rules();
        rules.updatable.iter().chain(rules.immutable).copied().collect()
    }

    /// Returns the version kind of a versioned object kind.
    #[must_use]
    pub const fn version_kind(self) -> Option<Self> {
        match self {
            Self::Enum => Some(Self::EnumVersion),
            Self::Schema => Some(Self::SchemaVersion),
            Self::Event => Some(Self::EventVersion),
            Self::Application => Some(Self::ApplicationVersion),
            Self::EventApi => Some(Self::EventApiVersion),
            _ => None,
        }
    }

    /// Returns the owning object kind of a version kind.
    #[must_use]
    pub const fn parent_kind(self) -> Option<Self> {
        match self {
            Self::EnumVersion => Some(Self::Enum),
            Self::SchemaVersion => Some(Self::Schema),
            Self::EventVersion => Some(Self::Event),
            Self::ApplicationVersion => Some(Self::Application),
            Self::EventApiVersion => Some(Self::EventApi),
            _ => None,
        }
    }

    /// Returns true for version kinds.
    #[must_use]
    pub const fn is_version(self) -> bool {
        self.parent_kind().is_some()
    }

    /// Returns true for kinds that live inside an application domain.
    #[must_use]
    pub const fn is_domain_scoped(self) -> bool {
        !matches!(self, Self::ApplicationDomain) && !self.is_version()
    }

    /// Returns the REST collection name.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::ApplicationDomain => "applicationDomains",
            Self::TopicDomain => "topicDomains",
            Self::Enum => "enums",
            Self::EnumVersion => "enumVersions",
            Self::Schema => "schemas",
            Self::SchemaVersion => "schemaVersions",
            Self::Event => "events",
            Self::EventVersion => "eventVersions",
            Self::Application => "applications",
            Self::ApplicationVersion => "applicationVersions",
            Self::EventApi => "eventApis",
            Self::EventApiVersion => "eventApiVersions",
        }
    }

    /// Returns the display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApplicationDomain => "applicationDomain",
            Self::TopicDomain => "topicDomain",
            Self::Enum => "enum",
            Self::EnumVersion => "enumVersion",
            Self::Schema => "schema",
            Self::SchemaVersion => "schemaVersion",
            Self::Event => "event",
            Self::EventVersion => "eventVersion",
            Self::Application => "application",
            Self::ApplicationVersion => "applicationVersion",
            Self::EventApi => "eventApi",
            Self::EventApiVersion => "eventApiVersion",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Owning-scope identifiers of an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentScope {
    /// Owning application domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_domain_id: Option<String>,
    /// Owning object, for version kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl ParentScope {
    /// Scope of an object inside an application domain.
    #[must_use]
    pub fn domain(application_domain_id: impl Into<String>) -> Self {
        Self {
            application_domain_id: Some(application_domain_id.into()),
            parent_id: None,
        }
    }

    /// Scope of a version under its owning object.
    #[must_use]
    pub fn parent(parent_id: impl Into<String>) -> Self {
        Self {
            application_domain_id: None,
            parent_id: Some(parent_id.into()),
        }
    }
}

/// How a task identifies its object. `id` wins once known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Catalog id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name, unique within the scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Owning scope.
    #[serde(default)]
    pub scope: ParentScope,
}

impl Identity {
    /// Identity by name within a scope.
    #[must_use]
    pub fn named(name: impl Into<String>, scope: ParentScope) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            scope,
        }
    }

    /// Identity by id.
    #[must_use]
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
            scope: ParentScope::default(),
        }
    }

    /// Returns true if neither id nor name is known.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none()
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.name, &self.id) {
            (Some(name), _) => write!(f, "{name}"),
            (None, Some(id)) => write!(f, "id:{id}"),
            (None, None) => write!(f, "<unidentified>"),
        }
    }
}

/// An object as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogObject {
    /// Catalog id.
    pub id: String,
    /// Object kind.
    pub kind: ObjectKind,
    /// Object name; for versions the owning object's name.
    #[serde(default)]
    pub name: String,
    /// Owning scope.
    #[serde(default, flatten)]
    pub scope: ParentScope,
    /// Version string, for version kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Kind-specific attributes.
    #[serde(default = "empty_attributes")]
    pub attributes: Value,
    /// Custom attributes (name to value).
    #[serde(default)]
    pub custom_attributes: BTreeMap<String, String>,
}

/// Payload for create and update calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDraft {
    /// Object name.
    pub name: String,
    /// Version string, for version kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Kind-specific attributes.
    pub attributes: Value,
    /// Custom attributes written together with the object.
    #[serde(default)]
    pub custom_attributes: BTreeMap<String, String>,
}

/// One page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page_number: u32,
    /// Items per page.
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Default page size for list calls.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// A list query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Scope to list within; empty means everything of the kind.
    pub scope: ParentScope,
    /// Exact name filter.
    pub name: Option<String>,
    /// Page to fetch.
    pub page: PageRequest,
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Next page number, if any.
    #[serde(default)]
    pub next_page: Option<u32>,
}

fn empty_attributes() -> Value {
    Value::Object(Map::new())
}

impl CatalogObject {
    /// Returns the value of a custom attribute.
    #[must_use]
    pub fn custom_attribute(&self, name: &str) -> Option<&str> {
        self.custom_attributes.get(name).map(String::as_str)
    }

    /// Returns the version ids this object references.
    #[must_use]
    pub fn references(&self) -> Vec<String> {
        referenced_ids(&self.attributes)
    }
}

/// Returns true if `key` names a reference to a version.
fn is_reference_key(key: &str) -> bool {
    key.ends_with("VersionId") || key.ends_with("VersionIds")
}

/// Collects every version id referenced from `value`.
///
/// A reference is a string under a key ending in `VersionId`, or an array of
/// strings under a key ending in `VersionIds`, at any depth.
#[must_use]
pub fn referenced_ids(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_references(value, &mut out);
    out
}

fn collect_references(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                if is_reference_key(key) {
                    match v {
                        Value::String(id) => out.push(id.clone()),
                        Value::Array(ids) => {
                            out.extend(ids.iter().filter_map(Value::as_str).map(String::from));
                        }
                        _ => {}
                    }
                } else {
                    collect_references(v, out);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_references(v, out)),
        _ => {}
    }
}

/// Rewrites every reference in `value` through `mapping`.
///
/// # Errors
///
/// Returns the first id that has no mapping.
pub fn rewrite_references(
    value: &Value,
    mapping: &HashMap<String, String>,
) -> std::result::Result<Value, String> {
    let lookup = |id: &str| mapping.get(id).cloned().ok_or_else(|| id.to_string());

    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, v) in map {
                let rewritten = if is_reference_key(key) {
                    match v {
                        Value::String(id) => Value::String(lookup(id)?),
                        Value::Array(ids) => Value::Array(
                            ids.iter()
                                .map(|id| match id {
                                    Value::String(s) => lookup(s).map(Value::String),
                                    other => Ok(other.clone()),
                                })
                                .collect::<std::result::Result<_, _>>()?,
                        ),
                        other => other.clone(),
                    }
                } else {
                    rewrite_references(v, mapping)?
                };
                out.insert(key.clone(), rewritten);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|v| rewrite_references(v, mapping))
                .collect::<std::result::Result<_, _>>()?,
        )),
        other => Ok(other.clone()),
    }
}

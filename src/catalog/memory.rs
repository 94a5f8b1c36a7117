//! In-memory catalog backend.
//!
//! Behaves like the remote catalog for everything the engine relies on:
//! scoped name uniqueness, paging, reference checks and cascading deletes.
//! It can be loaded from and saved to a JSON snapshot file, which is what the
//! `snapshot` endpoint type in the configuration uses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{CatalogError, RemoteApiError, Result};

use super::client::ObjectClient;
use super::types::{
    referenced_ids, CatalogObject, Identity, ListQuery, ObjectDraft, ObjectKind, Page, ParentScope,
};

/// Snapshot file content.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    /// Every stored object, in insertion order.
    #[serde(default)]
    pub objects: Vec<CatalogObject>,
    /// Custom attribute definitions and the kinds they apply to.
    #[serde(default)]
    pub custom_attribute_definitions: BTreeMap<String, BTreeSet<ObjectKind>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    snapshot: CatalogSnapshot,
    next_id: u64,
    mutations: u64,
}

/// Catalog held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: Mutex<MemoryState>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let next_id = snapshot.objects.len() as u64;
        Self {
            state: Mutex::new(MemoryState {
                snapshot,
                next_id,
                mutations: 0,
            }),
        }
    }

    /// Loads a catalog from a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        debug!("Loading catalog snapshot: {}", path.display());

        let content = fs::read_to_string(path).await.map_err(|e| {
            CatalogError::internal(format!("Failed to read snapshot {}: {e}", path.display()))
        })?;
        let snapshot: CatalogSnapshot = serde_json::from_str(&content).map_err(|e| {
            CatalogError::internal(format!("Failed to parse snapshot {}: {e}", path.display()))
        })?;

        info!(
            "Loaded {} object(s) from {}",
            snapshot.objects.len(),
            path.display()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Writes the catalog to a snapshot file (temp file, then rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot()?;
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| CatalogError::internal(format!("Failed to serialize snapshot: {e}")))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, path).await?;

        debug!("Saved catalog snapshot: {}", path.display());
        Ok(())
    }

    /// Returns a copy of the current content.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn snapshot(&self) -> Result<CatalogSnapshot> {
        Ok(self.lock()?.snapshot.clone())
    }

    /// Returns every object of one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn objects_of(&self, kind: ObjectKind) -> Result<Vec<CatalogObject>> {
        Ok(self
            .lock()?
            .snapshot
            .objects
            .iter()
            .filter(|o| o.kind == kind)
            .cloned()
            .collect())
    }

    /// Number of create, update and delete calls that changed something.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn mutation_count(&self) -> Result<u64> {
        Ok(self.lock()?.mutations)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| CatalogError::internal("in-memory catalog lock poisoned"))
    }

    fn matches_scope(object: &CatalogObject, scope: &ParentScope) -> bool {
        scope
            .application_domain_id
            .as_ref()
            .is_none_or(|d| object.scope.application_domain_id.as_ref() == Some(d))
            && scope
                .parent_id
                .as_ref()
                .is_none_or(|p| object.scope.parent_id.as_ref() == Some(p))
    }

    fn check_scope(objects: &[CatalogObject], kind: ObjectKind, scope: &ParentScope) -> Result<()> {
        let exists = |kind: ObjectKind, id: &str| objects.iter().any(|o| o.kind == kind && o.id == id);

        if kind.is_domain_scoped() {
            let domain = scope.application_domain_id.as_deref().ok_or_else(|| {
                CatalogError::validation(format!("{kind} needs an application domain"), "")
            })?;
            if !exists(ObjectKind::ApplicationDomain, domain) {
                return Err(CatalogError::NotFound {
                    kind: ObjectKind::ApplicationDomain,
                    identity: domain.to_string(),
                });
            }
        }

        if let Some(parent_kind) = kind.parent_kind() {
            let parent = scope.parent_id.as_deref().ok_or_else(|| {
                CatalogError::validation(format!("{kind} needs a parent object"), "")
            })?;
            if !exists(parent_kind, parent) {
                return Err(CatalogError::NotFound {
                    kind: parent_kind,
                    identity: parent.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_references(objects: &[CatalogObject], attributes: &serde_json::Value) -> Result<()> {
        for reference in referenced_ids(attributes) {
            if !objects.iter().any(|o| o.id == reference) {
                return Err(RemoteApiError::api_error(
                    400,
                    format!("referenced object {reference} does not exist"),
                )
                .into());
            }
        }
        Ok(())
    }

    /// Ids removed together with `root`.
    fn cascade(objects: &[CatalogObject], root: &CatalogObject) -> BTreeSet<String> {
        let mut ids = BTreeSet::from([root.id.clone()]);
        if root.kind == ObjectKind::ApplicationDomain {
            for object in objects {
                if object.scope.application_domain_id.as_deref() == Some(root.id.as_str()) {
                    ids.insert(object.id.clone());
                }
            }
        }
        // versions of everything collected so far
        let parents: Vec<String> = ids.iter().cloned().collect();
        for object in objects {
            if let Some(parent) = object.scope.parent_id.as_deref() {
                if parents.iter().any(|p| p == parent) {
                    ids.insert(object.id.clone());
                }
            }
        }
        ids
    }

    fn allocate_id(state: &mut MemoryState, kind: ObjectKind) -> String {
        loop {
            state.next_id += 1;
            let id = format!("{}-{}", kind.as_str(), state.next_id);
            if !state.snapshot.objects.iter().any(|o| o.id == id) {
                return id;
            }
        }
    }
}

#[async_trait]
impl ObjectClient for InMemoryCatalog {
    async fn get(&self, kind: ObjectKind, identity: &Identity) -> Result<Option<CatalogObject>> {
        if identity.is_empty() {
            return Err(CatalogError::validation(
                format!("{kind} identity needs an id or a name"),
                "",
            ));
        }

        let state = self.lock()?;
        let found = state.snapshot.objects.iter().find(|o| {
            o.kind == kind
                && match (&identity.id, &identity.name) {
                    (Some(id), _) => &o.id == id,
                    (None, Some(name)) => {
                        &o.name == name && Self::matches_scope(o, &identity.scope)
                    }
                    (None, None) => false,
                }
        });
        Ok(found.cloned())
    }

    async fn list(&self, kind: ObjectKind, query: &ListQuery) -> Result<Page<CatalogObject>> {
        let state = self.lock()?;
        let matching: Vec<&CatalogObject> = state
            .snapshot
            .objects
            .iter()
            .filter(|o| o.kind == kind && Self::matches_scope(o, &query.scope))
            .filter(|o| query.name.as_ref().is_none_or(|n| &o.name == n))
            .collect();

        let size = query.page.page_size.max(1) as usize;
        let start = (query.page.page_number.max(1) as usize - 1) * size;
        let items: Vec<CatalogObject> = matching
            .iter()
            .skip(start)
            .take(size)
            .map(|o| (*o).clone())
            .collect();
        let next_page = (start + size < matching.len()).then(|| query.page.page_number.max(1) + 1);

        Ok(Page { items, next_page })
    }

    async fn create(
        &self,
        kind: ObjectKind,
        scope: &ParentScope,
        draft: &ObjectDraft,
    ) -> Result<CatalogObject> {
        if draft.name.trim().is_empty() {
            return Err(CatalogError::validation(format!("{kind} name must not be empty"), ""));
        }
        if kind.is_version() && draft.version.is_none() {
            return Err(CatalogError::validation(format!("{kind} needs a version string"), ""));
        }

        let mut state = self.lock()?;
        let objects = &state.snapshot.objects;

        Self::check_scope(objects, kind, scope)?;
        Self::check_references(objects, &draft.attributes)?;

        let duplicate = objects.iter().any(|o| {
            o.kind == kind
                && if kind.is_version() {
                    o.scope.parent_id == scope.parent_id && o.version == draft.version
                } else {
                    o.name == draft.name
                        && o.scope.application_domain_id == scope.application_domain_id
                }
        });
        if duplicate {
            return Err(RemoteApiError::conflict(format!(
                "{kind} '{}' already exists",
                draft.name
            ))
            .into());
        }

        let object = CatalogObject {
            id: Self::allocate_id(&mut state, kind),
            kind,
            name: draft.name.clone(),
            scope: scope.clone(),
            version: draft.version.clone(),
            attributes: draft.attributes.clone(),
            custom_attributes: draft.custom_attributes.clone(),
        };
        state.snapshot.objects.push(object.clone());
        state.mutations += 1;

        debug!("Created {kind} '{}' ({})", object.name, object.id);
        Ok(object)
    }

    async fn update(&self, kind: ObjectKind, id: &str, draft: &ObjectDraft) -> Result<CatalogObject> {
        let mut state = self.lock()?;
        Self::check_references(&state.snapshot.objects, &draft.attributes)?;

        let object = state
            .snapshot
            .objects
            .iter_mut()
            .find(|o| o.kind == kind && o.id == id)
            .ok_or_else(|| CatalogError::NotFound {
                kind,
                identity: id.to_string(),
            })?;

        if let (serde_json::Value::Object(current), serde_json::Value::Object(patch)) =
            (&mut object.attributes, &draft.attributes)
        {
            for (key, value) in patch {
                current.insert(key.clone(), value.clone());
            }
        } else {
            object.attributes = draft.attributes.clone();
        }

        let updated = object.clone();
        state.mutations += 1;

        debug!("Updated {kind} '{}' ({id})", updated.name);
        Ok(updated)
    }

    async fn delete(&self, kind: ObjectKind, id: &str) -> Result<CatalogObject> {
        let mut state = self.lock()?;
        let objects = &state.snapshot.objects;

        let root = objects
            .iter()
            .find(|o| o.kind == kind && o.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound {
                kind,
                identity: id.to_string(),
            })?;

        let removed = Self::cascade(objects, &root);
        let blocker = objects
            .iter()
            .filter(|o| !removed.contains(&o.id))
            .find(|o| o.references().iter().any(|r| removed.contains(r)));
        if let Some(blocker) = blocker {
            return Err(RemoteApiError::conflict(format!(
                "{kind} '{}' is still referenced by {} '{}'",
                root.name, blocker.kind, blocker.name
            ))
            .into());
        }

        state.snapshot.objects.retain(|o| !removed.contains(&o.id));
        state.mutations += 1;

        debug!(
            "Deleted {kind} '{}' ({id}) and {} dependent object(s)",
            root.name,
            removed.len() - 1
        );
        Ok(root)
    }

    async fn ensure_custom_attribute_definition(&self, name: &str, kinds: &[ObjectKind]) -> Result<()> {
        let mut state = self.lock()?;
        let definition = state
            .snapshot
            .custom_attribute_definitions
            .entry(name.to_string())
            .or_default();
        let before = definition.len();
        definition.extend(kinds.iter().copied());
        if definition.len() != before {
            state.mutations += 1;
        }
        Ok(())
    }
}

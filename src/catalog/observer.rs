//! Read-side helpers over an [`ObjectClient`].
//!
//! The observer follows pagination, filters objects by the run-id custom
//! attribute and looks up the versions of a parent object.

use tracing::debug;

use crate::error::Result;
use crate::planner::SemVer;

use super::client::ObjectClient;
use super::types::{CatalogObject, ListQuery, ObjectKind, PageRequest, ParentScope};

/// Custom attribute that tags objects with the run that created them.
pub const RUN_ID_ATTRIBUTE: &str = "catalog_migrate_run_id";

/// Safety bound on the number of pages followed in one listing.
const MAX_PAGES: u32 = 10_000;

/// Read-only view of a catalog.
pub struct CatalogObserver<'a> {
    client: &'a dyn ObjectClient,
    page_size: u32,
}

impl std::fmt::Debug for CatalogObserver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogObserver")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl<'a> CatalogObserver<'a> {
    /// Creates an observer with the default page size.
    #[must_use]
    pub fn new(client: &'a dyn ObjectClient) -> Self {
        Self {
            client,
            page_size: PageRequest::default().page_size,
        }
    }

    /// Sets the page size used for listings.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Lists every object of a kind within a scope, following all pages.
    ///
    /// # Errors
    ///
    /// Returns an error if a list call fails.
    pub async fn list_all(&self, kind: ObjectKind, scope: &ParentScope) -> Result<Vec<CatalogObject>> {
        let mut out = Vec::new();
        let mut page_number = 1;

        while page_number <= MAX_PAGES {
            let query = ListQuery {
                scope: scope.clone(),
                name: None,
                page: PageRequest {
                    page_number,
                    page_size: self.page_size,
                },
            };
            let page = self.client.list(kind, &query).await?;
            out.extend(page.items);

            match page.next_page {
                Some(next) if next > page_number => page_number = next,
                _ => break,
            }
        }

        debug!("Listed {} {kind} object(s)", out.len());
        Ok(out)
    }

    /// Lists the objects of a kind tagged with `run_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if a list call fails.
    pub async fn tagged(&self, kind: ObjectKind, run_id: &str) -> Result<Vec<CatalogObject>> {
        let all = self.list_all(kind, &ParentScope::default()).await?;
        Ok(all
            .into_iter()
            .filter(|o| o.custom_attribute(RUN_ID_ATTRIBUTE) == Some(run_id))
            .collect())
    }

    /// Lists the versions of a versioned object, oldest first.
    ///
    /// Versions with malformed version strings sort first.
    ///
    /// # Errors
    ///
    /// Returns an error if a list call fails or `parent` is not versioned.
    pub async fn versions_of(&self, parent: &CatalogObject) -> Result<Vec<CatalogObject>> {
        let version_kind = parent.kind.version_kind().ok_or_else(|| {
            crate::error::CatalogError::validation(
                format!("{} has no versions", parent.kind),
                parent.name.clone(),
            )
        })?;

        let mut versions = self
            .list_all(version_kind, &ParentScope::parent(&parent.id))
            .await?;
        versions.sort_by_key(|v| v.version.as_deref().and_then(|s| SemVer::parse(s).ok()));
        Ok(versions)
    }
}

/// Returns the version object with the highest version string.
#[must_use]
pub fn latest_version(versions: &[CatalogObject]) -> Option<&CatalogObject> {
    versions
        .iter()
        .filter_map(|v| {
            v.version
                .as_deref()
                .and_then(|s| SemVer::parse(s).ok())
                .map(|parsed| (parsed, v))
        })
        .max_by_key(|(parsed, _)| *parsed)
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::InMemoryCatalog;
    use crate::catalog::types::ObjectDraft;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn draft(name: &str, version: Option<&str>, run_id: Option<&str>) -> ObjectDraft {
        ObjectDraft {
            name: name.to_string(),
            version: version.map(String::from),
            attributes: json!({}),
            custom_attributes: run_id
                .map(|r| BTreeMap::from([(RUN_ID_ATTRIBUTE.to_string(), r.to_string())]))
                .unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn test_list_all_follows_pages() {
        let catalog = InMemoryCatalog::new();
        for i in 0..7 {
            catalog
                .create(ObjectKind::ApplicationDomain, &ParentScope::default(), &draft(&format!("d{i}"), None, None))
                .await
                .unwrap();
        }

        let observer = CatalogObserver::new(&catalog).with_page_size(3);
        let all = observer
            .list_all(ObjectKind::ApplicationDomain, &ParentScope::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 7);
    }

    #[tokio::test]
    async fn test_tagged_and_versions() {
        let catalog = InMemoryCatalog::new();
        let domain = catalog
            .create(ObjectKind::ApplicationDomain, &ParentScope::default(), &draft("d", None, None))
            .await
            .unwrap();
        let schema = catalog
            .create(ObjectKind::Schema, &ParentScope::domain(&domain.id), &draft("S", None, Some("run-1")))
            .await
            .unwrap();
        catalog
            .create(ObjectKind::Schema, &ParentScope::domain(&domain.id), &draft("T", None, Some("run-2")))
            .await
            .unwrap();
        for version in ["1.10.0", "1.2.0", "1.9.1"] {
            catalog
                .create(ObjectKind::SchemaVersion, &ParentScope::parent(&schema.id), &draft("S", Some(version), None))
                .await
                .unwrap();
        }

        let observer = CatalogObserver::new(&catalog);
        let tagged = observer.tagged(ObjectKind::Schema, "run-1").await.unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].name, "S");

        let versions = observer.versions_of(&schema).await.unwrap();
        let order: Vec<_> = versions.iter().filter_map(|v| v.version.as_deref()).collect();
        assert_eq!(order, vec!["1.2.0", "1.9.1", "1.10.0"]);
        assert_eq!(latest_version(&versions).and_then(|v| v.version.as_deref()), Some("1.10.0"));
    }
}

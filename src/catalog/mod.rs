//! Catalog access.
//!
//! The object model, the [`ObjectClient`] facade with its REST and in-memory
//! backends, and read helpers used by the migrator.

mod client;
mod memory;
mod observer;
mod types;

pub use client::{ObjectClient, RestCatalogClient};
pub use memory::{CatalogSnapshot, InMemoryCatalog};
pub use observer::{latest_version, CatalogObserver, RUN_ID_ATTRIBUTE};
pub use types::{
    referenced_ids, rewrite_references, CatalogObject, Identity, KindRules, ListQuery, ObjectDraft,
    ObjectKind, Page, PageRequest, ParentScope, DEFAULT_PAGE_SIZE, KIND_RULES,
};

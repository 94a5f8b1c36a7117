//! Object client facade and its REST implementation.
//!
//! Tasks only talk to the catalog through [`ObjectClient`]. The REST client
//! maps the facade onto the catalog's JSON API; `get` answers `Ok(None)` for
//! a missing object so callers can tell "not there" apart from failures.

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{CatalogError, RemoteApiError, Result};

use super::types::{
    CatalogObject, Identity, ListQuery, ObjectDraft, ObjectKind, Page, PageRequest, ParentScope,
};

/// Path prefix of the catalog API.
const API_PREFIX: &str = "api/v2/architecture";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// CRUD access to one catalog.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Fetches an object by id, or by name within its scope.
    async fn get(&self, kind: ObjectKind, identity: &Identity) -> Result<Option<CatalogObject>>;

    /// Lists one page of objects.
    async fn list(&self, kind: ObjectKind, query: &ListQuery) -> Result<Page<CatalogObject>>;

    /// Creates an object in the given scope.
    async fn create(
        &self,
        kind: ObjectKind,
        scope: &ParentScope,
        draft: &ObjectDraft,
    ) -> Result<CatalogObject>;

    /// Updates an object in place.
    ///
    /// Custom attributes already on the object are left alone.
    async fn update(&self, kind: ObjectKind, id: &str, draft: &ObjectDraft) -> Result<CatalogObject>;

    /// Deletes an object (and, for versioned kinds, all of its versions).
    async fn delete(&self, kind: ObjectKind, id: &str) -> Result<CatalogObject>;

    /// Makes sure a custom attribute definition exists for the given kinds.
    async fn ensure_custom_attribute_definition(&self, name: &str, kinds: &[ObjectKind]) -> Result<()>;
}

#[async_trait]
impl ObjectClient for Box<dyn ObjectClient> {
    async fn get(&self, kind: ObjectKind, identity: &Identity) -> Result<Option<CatalogObject>> {
        (**self).get(kind, identity).await
    }

    async fn list(&self, kind: ObjectKind, query: &ListQuery) -> Result<Page<CatalogObject>> {
        (**self).list(kind, query).await
    }

    async fn create(
        &self,
        kind: ObjectKind,
        scope: &ParentScope,
        draft: &ObjectDraft,
    ) -> Result<CatalogObject> {
        (**self).create(kind, scope, draft).await
    }

    async fn update(&self, kind: ObjectKind, id: &str, draft: &ObjectDraft) -> Result<CatalogObject> {
        (**self).update(kind, id, draft).await
    }

    async fn delete(&self, kind: ObjectKind, id: &str) -> Result<CatalogObject> {
        (**self).delete(kind, id).await
    }

    async fn ensure_custom_attribute_definition(&self, name: &str, kinds: &[ObjectKind]) -> Result<()> {
        (**self).ensure_custom_attribute_definition(name, kinds).await
    }
}

/// REST implementation of [`ObjectClient`].
#[derive(Debug, Clone)]
pub struct RestCatalogClient {
    /// HTTP client.
    client: Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// Bearer token.
    token: String,
}

/// Object as the REST API sends it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireObject {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    application_domain_id: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    attributes: Option<Value>,
    #[serde(default)]
    custom_attributes: BTreeMap<String, String>,
}

/// Create/update body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireDraft<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    application_domain_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    attributes: &'a Value,
    #[serde(skip_serializing_if = "no_custom_attributes")]
    custom_attributes: &'a BTreeMap<String, String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn no_custom_attributes(map: &&BTreeMap<String, String>) -> bool {
    map.is_empty()
}

#[derive(Debug, Deserialize)]
struct SingleResponse {
    data: WireObject,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: Vec<WireObject>,
    #[serde(default)]
    meta: Option<ListMeta>,
}

#[derive(Debug, Deserialize)]
struct ListMeta {
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    next_page: Option<u32>,
}

impl WireObject {
    fn into_object(self, kind: ObjectKind) -> CatalogObject {
        CatalogObject {
            id: self.id,
            kind,
            name: self.name,
            scope: ParentScope {
                application_domain_id: self.application_domain_id,
                parent_id: self.parent_id,
            },
            version: self.version,
            attributes: self
                .attributes
                .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
            custom_attributes: self.custom_attributes,
        }
    }
}

impl RestCatalogClient {
    /// Creates a new REST client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(base_url: &str, token: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RemoteApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn collection_url(&self, kind: ObjectKind) -> String {
        format!("{}/{API_PREFIX}/{}", self.base_url, kind.collection())
    }

    fn object_url(&self, kind: ObjectKind, id: &str) -> String {
        format!("{}/{id}", self.collection_url(kind))
    }

    fn scope_params(scope: &ParentScope, params: &mut Vec<(&'static str, String)>) {
        if let Some(domain) = &scope.application_domain_id {
            params.push(("applicationDomainId", domain.clone()));
        }
        if let Some(parent) = &scope.parent_id {
            params.push(("parentId", parent.clone()));
        }
    }

    /// Sends a request, retrying transient failures. `Ok(None)` means 404.
    async fn send(
        &self,
        method: Method,
        url: &str,
        params: &[(&'static str, String)],
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES} for {method} {url}");
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)))
                    .await;
            }

            match self.send_once(method.clone(), url, params, body).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if Self::is_transient(&e) {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            CatalogError::RemoteApi(RemoteApiError::network("Max retries exceeded"))
        }))
    }

    const fn is_transient(error: &CatalogError) -> bool {
        matches!(
            error,
            CatalogError::RemoteApi(
                RemoteApiError::RateLimited { .. } | RemoteApiError::Network { .. }
            )
        )
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        params: &[(&'static str, String)],
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        trace!("{method} {url} {params:?}");

        let operation = match method {
            Method::GET => "read",
            Method::DELETE => "delete",
            _ => "write",
        };

        let mut request = self
            .client
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .query(params);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteApiError::network(format!("Request failed: {e}")))?;

        let status = response.status();

        match status {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::NO_CONTENT => return Ok(Some(Value::Null)),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or_default();
                let retry_after = if retry_after == 0 { 60 } else { retry_after };
                return Err(RemoteApiError::RateLimited {
                    retry_after_secs: retry_after,
                }
                .into());
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let message = response.text().await.unwrap_or_default();
                return Err(RemoteApiError::AuthorizationDenied {
                    operation: operation.to_string(),
                    message,
                }
                .into());
            }
            StatusCode::CONFLICT => {
                let message = response.text().await.unwrap_or_default();
                return Err(RemoteApiError::conflict(message).into());
            }
            _ => {}
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteApiError::api_error(status.as_u16(), message).into());
        }

        let value: Value = response.json().await.map_err(|e| RemoteApiError::InvalidResponse {
            message: format!("Failed to parse response: {e}"),
        })?;
        Ok(Some(value))
    }

    fn parse<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(|e| {
            RemoteApiError::InvalidResponse {
                message: format!("Unexpected response shape: {e}"),
            }
            .into()
        })
    }

    fn draft_body(scope: &ParentScope, draft: &ObjectDraft) -> Result<Value> {
        let body = WireDraft {
            name: &draft.name,
            application_domain_id: scope.application_domain_id.as_deref(),
            parent_id: scope.parent_id.as_deref(),
            version: draft.version.as_deref(),
            attributes: &draft.attributes,
            custom_attributes: &draft.custom_attributes,
        };
        serde_json::to_value(body)
            .map_err(|e| CatalogError::internal(format!("Failed to encode request: {e}")))
    }

    fn not_found(kind: ObjectKind, id: &str) -> CatalogError {
        CatalogError::NotFound {
            kind,
            identity: id.to_string(),
        }
    }
}

#[async_trait]
impl ObjectClient for RestCatalogClient {
    async fn get(&self, kind: ObjectKind, identity: &Identity) -> Result<Option<CatalogObject>> {
        if let Some(id) = &identity.id {
            let Some(value) = self.send(Method::GET, &self.object_url(kind, id), &[], None).await?
            else {
                return Ok(None);
            };
            let response: SingleResponse = Self::parse(value)?;
            return Ok(Some(response.data.into_object(kind)));
        }

        let Some(name) = &identity.name else {
            return Err(CatalogError::Validation {
                message: format!("{kind} identity needs an id or a name"),
                value: None,
            });
        };

        let query = ListQuery {
            scope: identity.scope.clone(),
            name: Some(name.clone()),
            page: PageRequest {
                page_number: 1,
                page_size: 1,
            },
        };
        let page = self.list(kind, &query).await?;
        Ok(page.items.into_iter().next())
    }

    async fn list(&self, kind: ObjectKind, query: &ListQuery) -> Result<Page<CatalogObject>> {
        let mut params = vec![
            ("pageNumber", query.page.page_number.to_string()),
            ("pageSize", query.page.page_size.to_string()),
        ];
        Self::scope_params(&query.scope, &mut params);
        if let Some(name) = &query.name {
            params.push(("name", name.clone()));
        }

        let Some(value) = self
            .send(Method::GET, &self.collection_url(kind), &params, None)
            .await?
        else {
            return Ok(Page {
                items: Vec::new(),
                next_page: None,
            });
        };

        let response: ListResponse = Self::parse(value)?;
        let next_page = response
            .meta
            .and_then(|m| m.pagination)
            .and_then(|p| p.next_page);

        Ok(Page {
            items: response
                .data
                .into_iter()
                .map(|w| w.into_object(kind))
                .collect(),
            next_page,
        })
    }

    async fn create(
        &self,
        kind: ObjectKind,
        scope: &ParentScope,
        draft: &ObjectDraft,
    ) -> Result<CatalogObject> {
        let body = Self::draft_body(scope, draft)?;
        let url = self.collection_url(kind);
        let value = self
            .send(Method::POST, &url, &[], Some(&body))
            .await?
            .ok_or_else(|| RemoteApiError::api_error(404, format!("collection not found: {url}")))?;
        let response: SingleResponse = Self::parse(value)?;
        Ok(response.data.into_object(kind))
    }

    async fn update(&self, kind: ObjectKind, id: &str, draft: &ObjectDraft) -> Result<CatalogObject> {
        let body = Self::draft_body(&ParentScope::default(), draft)?;
        let value = self
            .send(Method::PATCH, &self.object_url(kind, id), &[], Some(&body))
            .await?
            .ok_or_else(|| Self::not_found(kind, id))?;
        let response: SingleResponse = Self::parse(value)?;
        Ok(response.data.into_object(kind))
    }

    async fn delete(&self, kind: ObjectKind, id: &str) -> Result<CatalogObject> {
        let existing = self
            .get(kind, &Identity::by_id(id))
            .await?
            .ok_or_else(|| Self::not_found(kind, id))?;

        self.send(Method::DELETE, &self.object_url(kind, id), &[], None)
            .await?
            .ok_or_else(|| Self::not_found(kind, id))?;

        Ok(existing)
    }

    async fn ensure_custom_attribute_definition(&self, name: &str, kinds: &[ObjectKind]) -> Result<()> {
        let url = format!("{}/{API_PREFIX}/customAttributeDefinitions", self.base_url);
        let params = [("name", name.to_string())];

        let existing = self.send(Method::GET, &url, &params, None).await?;
        let found = existing
            .as_ref()
            .and_then(|v| v.get("data"))
            .and_then(Value::as_array)
            .is_some_and(|items| !items.is_empty());
        if found {
            debug!("Custom attribute definition '{name}' already exists");
            return Ok(());
        }

        let body = serde_json::json!({
            "name": name,
            "valueType": "STRING",
            "associatedEntityTypes": kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
        });
        self.send(Method::POST, &url, &[], Some(&body)).await?;
        debug!("Created custom attribute definition '{name}'");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> RestCatalogClient {
        RestCatalogClient::with_timeout(&server.uri(), "test-token", 5).unwrap()
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/architecture/enums/e1"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": "e1",
                    "name": "Colors",
                    "applicationDomainId": "d1",
                    "attributes": { "shared": true }
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let object = client
            .get(ObjectKind::Enum, &Identity::by_id("e1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(object.name, "Colors");
        assert_eq!(object.kind, ObjectKind::Enum);
        assert_eq!(object.scope.application_domain_id.as_deref(), Some("d1"));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/architecture/schemas/nope"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client.get(ObjectKind::Schema, &Identity::by_id("nope")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_get_by_name_uses_scoped_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/architecture/events"))
            .and(query_param("name", "OrderCreated"))
            .and(query_param("applicationDomainId", "d1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "ev1", "name": "OrderCreated", "applicationDomainId": "d1" }],
                "meta": { "pagination": { "nextPage": null } }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let identity = Identity::named("OrderCreated", ParentScope::domain("d1"));
        let object = client.get(ObjectKind::Event, &identity).await.unwrap().unwrap();
        assert_eq!(object.id, "ev1");
    }

    #[tokio::test]
    async fn test_list_reports_next_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/architecture/applicationDomains"))
            .and(query_param("pageNumber", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "d1", "name": "Acme" }],
                "meta": { "pagination": { "nextPage": 2 } }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let page = client
            .list(ObjectKind::ApplicationDomain, &ListQuery::default())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_page, Some(2));
    }

    #[tokio::test]
    async fn test_conflict_and_forbidden_are_distinguished() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/architecture/schemas/s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "id": "s1", "name": "Order" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v2/architecture/schemas/s1"))
            .respond_with(ResponseTemplate::new(409).set_body_string("still referenced"))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/v2/architecture/schemas/s1"))
            .respond_with(ResponseTemplate::new(403).set_body_string("no write access"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;

        let err = client.delete(ObjectKind::Schema, "s1").await.unwrap_err();
        assert!(matches!(err, CatalogError::RemoteApi(RemoteApiError::Conflict { .. })));
        assert!(err.is_retryable());

        let draft = ObjectDraft {
            name: String::from("Order"),
            version: None,
            attributes: json!({}),
            custom_attributes: BTreeMap::new(),
        };
        let err = client.update(ObjectKind::Schema, "s1", &draft).await.unwrap_err();
        match err {
            CatalogError::RemoteApi(RemoteApiError::AuthorizationDenied { operation, .. }) => {
                assert_eq!(operation, "write");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_create_sends_custom_attributes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/architecture/enums"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "data": {
                    "id": "e9",
                    "name": "Colors",
                    "applicationDomainId": "d1",
                    "customAttributes": { "catalog_migrate_run_id": "run-42" }
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let draft = ObjectDraft {
            name: String::from("Colors"),
            version: None,
            attributes: json!({ "shared": true }),
            custom_attributes: [(String::from("catalog_migrate_run_id"), String::from("run-42"))]
                .into_iter()
                .collect(),
        };
        let object = client
            .create(ObjectKind::Enum, &ParentScope::domain("d1"), &draft)
            .await
            .unwrap();
        assert_eq!(object.custom_attribute("catalog_migrate_run_id"), Some("run-42"));

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["applicationDomainId"], "d1");
        assert_eq!(body["customAttributes"]["catalog_migrate_run_id"], "run-42");
    }

    #[tokio::test]
    async fn test_update_leaves_custom_attributes_out() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/v2/architecture/enums/e9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "id": "e9", "name": "Colors", "applicationDomainId": "d1" }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let draft = ObjectDraft {
            name: String::from("Colors"),
            version: None,
            attributes: json!({ "shared": false }),
            custom_attributes: BTreeMap::new(),
        };
        client.update(ObjectKind::Enum, "e9", &draft).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("customAttributes").is_none());
        assert_eq!(body["attributes"]["shared"], false);
    }
}

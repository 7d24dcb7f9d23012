//! Grafana HTTP API client for a tenant's folders and dashboards.
//!
//! | op     | folder                      | dashboard                                   |
//! |--------|-----------------------------|---------------------------------------------|
//! | list   | `GET /api/folders[?parentUid]` | `GET /api/search?type=dash-db`           |
//! | fetch  | `GET /api/folders/{uid}`    | `GET /api/dashboards/uid/{uid}`             |
//! | create | `POST /api/folders`         | `POST /api/dashboards/db`                   |
//! | delete | `DELETE /api/folders/{uid}` | `DELETE /api/dashboards/uid/{uid}`          |
//!
//! Folders are listed level by level so nested folders are part of the
//! inventory. A 404 on delete is reported as [`StoreError::NotFound`].

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Map, Value};

use mirror_core::{ResourceKind, ResourceRecord, Uid};

use crate::error::StoreError;
use crate::InventoryStore;

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 500;

/// Authenticated client for one tenant.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    page_size: usize,
    client: Client,
}

impl HttpStore {
    /// Build a client for `base_url` authenticating with a bearer `token`.
    pub fn new(
        base_url: &str,
        token: &str,
        timeout: Duration,
        page_size: usize,
    ) -> Result<Self, StoreError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(StoreError::Config(format!(
                "target url must start with http:// or https://, got '{base_url}'"
            )));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|e| StoreError::Config(format!("token is not a valid header value: {e}")))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            page_size: page_size.max(1),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and return `(status, body)`; transport failures become errors.
    async fn send(
        &self,
        op: &'static str,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, String), StoreError> {
        let started = Instant::now();
        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|source| StoreError::Transport {
            op,
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| StoreError::Transport {
                op,
                url: url.to_string(),
                source,
            })?;
        tracing::debug!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "store request completed",
        );
        Ok((status, text))
    }

    /// Page through one listing, appending unseen uids. Returns the number of
    /// requests made.
    async fn list_pages(
        &self,
        kind: ResourceKind,
        parent: Option<&Uid>,
        seen: &mut HashSet<Uid>,
        uids: &mut Vec<Uid>,
    ) -> Result<usize, StoreError> {
        let mut page = 1;
        loop {
            let url = self.url(&list_path(kind, page, self.page_size, parent));
            let (status, body) = self.send("list", Method::GET, &url, None).await?;
            if !status.is_success() {
                return Err(status_error("list", &url, status, &body));
            }
            let value: Value = serde_json::from_str(&body).map_err(|e| StoreError::Decode {
                op: "list",
                url: url.clone(),
                reason: e.to_string(),
            })?;
            let batch = parse_uid_list(&value).map_err(|reason| StoreError::Decode {
                op: "list",
                url: url.clone(),
                reason,
            })?;

            let returned = batch.len();
            let mut fresh = 0;
            for uid in batch {
                if seen.insert(uid.clone()) {
                    uids.push(uid);
                    fresh += 1;
                }
            }
            // A page of already-seen uids means the server ignores paging or
            // the parent filter.
            if returned < self.page_size || fresh == 0 {
                return Ok(page);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl InventoryStore for HttpStore {
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Uid>, StoreError> {
        let mut seen = HashSet::new();
        let mut uids = Vec::new();
        let mut requests = 0;
        match kind {
            ResourceKind::Dashboard => {
                requests += self.list_pages(kind, None, &mut seen, &mut uids).await?;
            }
            ResourceKind::Folder => {
                // Nested folders are only listed under their parent; walk breadth first.
                requests += self.list_pages(kind, None, &mut seen, &mut uids).await?;
                let mut next = 0;
                while next < uids.len() {
                    let parent = uids[next].clone();
                    next += 1;
                    requests += self
                        .list_pages(kind, Some(&parent), &mut seen, &mut uids)
                        .await?;
                }
            }
        }
        tracing::debug!(kind = %kind, count = uids.len(), requests, "listed target inventory");
        Ok(uids)
    }

    async fn fetch(&self, kind: ResourceKind, uid: &Uid) -> Result<Option<Value>, StoreError> {
        let url = self.url(&item_path(kind, uid));
        let (status, body) = self.send("fetch", Method::GET, &url, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error("fetch", &url, status, &body));
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| StoreError::Decode {
                op: "fetch",
                url,
                reason: e.to_string(),
            })
    }

    async fn create(&self, record: &ResourceRecord) -> Result<Uid, StoreError> {
        let url = self.url(create_path(record.kind));
        let body = create_body(record);
        let (status, text) = self.send("create", Method::POST, &url, Some(&body)).await?;
        if !status.is_success() {
            return Err(status_error("create", &url, status, &text));
        }
        let assigned = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("uid").and_then(Value::as_str).map(Uid::from));
        Ok(assigned.unwrap_or_else(|| record.uid.clone()))
    }

    async fn delete(&self, kind: ResourceKind, uid: &Uid) -> Result<(), StoreError> {
        let url = self.url(&item_path(kind, uid));
        let (status, body) = self.send("delete", Method::DELETE, &url, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                op: "delete",
                kind,
                uid: uid.clone(),
            });
        }
        if !status.is_success() {
            return Err(status_error("delete", &url, status, &body));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Request shaping
// ---------------------------------------------------------------------------

pub(crate) fn list_path(
    kind: ResourceKind,
    page: usize,
    limit: usize,
    parent: Option<&Uid>,
) -> String {
    match (kind, parent) {
        (ResourceKind::Folder, None) => format!("/api/folders?limit={limit}&page={page}"),
        (ResourceKind::Folder, Some(parent)) => format!(
            "/api/folders?parentUid={}&limit={limit}&page={page}",
            urlencoding::encode(parent.as_str())
        ),
        (ResourceKind::Dashboard, _) => {
            format!("/api/search?type=dash-db&limit={limit}&page={page}")
        }
    }
}

pub(crate) fn item_path(kind: ResourceKind, uid: &Uid) -> String {
    let uid = urlencoding::encode(uid.as_str());
    match kind {
        ResourceKind::Folder => format!("/api/folders/{uid}"),
        ResourceKind::Dashboard => format!("/api/dashboards/uid/{uid}"),
    }
}

pub(crate) fn create_path(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Folder => "/api/folders",
        ResourceKind::Dashboard => "/api/dashboards/db",
    }
}

/// Build the create request body for `record`.
///
/// Dashboards drop their numeric `id` so the target assigns its own, keep
/// their folder placement and always overwrite.
pub(crate) fn create_body(record: &ResourceRecord) -> Value {
    match record.kind {
        ResourceKind::Folder => {
            let mut body = Map::new();
            body.insert("uid".to_string(), json!(record.uid.as_str()));
            body.insert(
                "title".to_string(),
                json!(record.display_name()),
            );
            if let Some(parent) = record.payload.get("parentUid").and_then(Value::as_str) {
                if !parent.is_empty() {
                    body.insert("parentUid".to_string(), json!(parent));
                }
            }
            Value::Object(body)
        }
        ResourceKind::Dashboard => {
            let envelope = record.payload.get("dashboard").filter(|d| d.is_object());
            let mut model = envelope.unwrap_or(&record.payload).clone();
            if let Some(obj) = model.as_object_mut() {
                obj.insert("id".to_string(), Value::Null);
            }

            let folder_uid = record
                .payload
                .pointer("/meta/folderUid")
                .or_else(|| record.payload.get("folderUid"))
                .and_then(Value::as_str)
                .filter(|uid| !uid.is_empty() && *uid != mirror_core::PROTECTED_FOLDER_UID);

            let mut body = Map::new();
            body.insert("dashboard".to_string(), model);
            body.insert("overwrite".to_string(), Value::Bool(true));
            if let Some(folder_uid) = folder_uid {
                body.insert("folderUid".to_string(), json!(folder_uid));
            }
            Value::Object(body)
        }
    }
}

/// Extract uids from a folder list or search result array.
pub(crate) fn parse_uid_list(value: &Value) -> Result<Vec<Uid>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| format!("expected a JSON array, got {}", type_name(value)))?;
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| match item.get("uid") {
            Some(Value::String(uid)) if !uid.is_empty() => Ok(Uid::from(uid.as_str())),
            _ => Err(format!("item {idx} has no string uid")),
        })
        .collect()
}

fn status_error(op: &'static str, url: &str, status: StatusCode, body: &str) -> StoreError {
    StoreError::Status {
        op,
        url: url.to_string(),
        status: status.as_u16(),
        body: truncate(body, MAX_ERROR_BODY),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &text[..end])
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

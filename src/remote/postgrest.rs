use super::{Backend, BackendError, Filter, Table, MAX_RESPONSE_SIZE, REQUEST_TIMEOUT_SECS};
use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// PostgREST client for the `entries` and `categories` collections.
///
/// Cheap to clone: the HTTP connection pool and keys are shared. Requests are
/// authorised with the signed-in user's access token when one is attached,
/// otherwise with the anonymous key (row-level security then hides all rows).
///
/// A 401/403 response latches a rejection flag shared by every clone made
/// for the same token; [`take_rejection`](Self::take_rejection) reads and
/// clears it.
#[derive(Clone)]
pub struct PostgrestClient {
    http: reqwest::Client,
    base: Url,
    anon_key: Arc<SecretString>,
    access_token: Option<Arc<SecretString>>,
    rejected: Arc<AtomicBool>,
}

impl std::fmt::Debug for PostgrestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestClient")
            .field("base", &self.base.as_str())
            .field("anon_key", &"[REDACTED]")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl PostgrestClient {
    pub fn new(http: reqwest::Client, base: Url, anon_key: Arc<SecretString>) -> Self {
        Self {
            http,
            base,
            anon_key,
            access_token: None,
            rejected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A copy of this client that acts as the signed-in user.
    pub fn with_access_token(&self, token: SecretString) -> Self {
        Self {
            access_token: Some(Arc::new(token)),
            rejected: Arc::new(AtomicBool::new(false)),
            ..self.clone()
        }
    }

    /// Whether the backend refused this client's credentials since the last
    /// call. Clears the flag.
    pub fn take_rejection(&self) -> bool {
        self.rejected.swap(false, Ordering::Relaxed)
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    fn table_url(&self, table: Table, filter: Option<&Filter>) -> Result<Url, BackendError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidRequest(format!("unusable base URL {}", self.base)))?
            .pop_if_empty()
            .extend(["rest", "v1", table.name()]);
        if let Some(filter) = filter {
            url.query_pairs_mut()
                .append_pair(filter.column, &filter.operator());
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self
            .access_token
            .as_deref()
            .unwrap_or(self.anon_key.as_ref());
        self.http
            .request(method, url)
            .header("apikey", self.anon_key.expose_secret())
            .header(AUTHORIZATION, format!("Bearer {}", bearer.expose_secret()))
            .header(ACCEPT, "application/json")
    }

    fn mutation(&self, method: Method, url: Url) -> RequestBuilder {
        self.request(method, url)
            .header("Prefer", "return=representation")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Vec<Value>, BackendError> {
        let (status, body) = send_limited(request).await?;

        if !status.is_success() {
            let err = BackendError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            };
            if err.is_unauthorized() {
                tracing::warn!(status = status.as_u16(), "Backend rejected credentials");
                self.rejected.store(true, Ordering::Relaxed);
            }
            return Err(err);
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        match serde_json::from_slice::<Value>(&body)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            row => Ok(vec![row]),
        }
    }
}

impl Backend for PostgrestClient {
    async fn select(&self, table: Table) -> Result<Vec<Value>, BackendError> {
        let mut url = self.table_url(table, None)?;
        url.query_pairs_mut().append_pair("select", "*");
        tracing::debug!(table = %table, "select");
        self.send(self.request(Method::GET, url)).await
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(table, None)?;
        tracing::debug!(table = %table, "insert");
        self.send(self.mutation(Method::POST, url).json(&row)).await
    }

    async fn update(
        &self,
        table: Table,
        patch: Value,
        filter: Filter,
    ) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(table, Some(&filter))?;
        tracing::debug!(table = %table, column = filter.column, "update");
        self.send(self.mutation(Method::PATCH, url).json(&patch)).await
    }

    async fn delete(&self, table: Table, filter: Filter) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(table, Some(&filter))?;
        tracing::debug!(table = %table, column = filter.column, "delete");
        self.send(self.mutation(Method::DELETE, url)).await
    }
}

/// Send a request and read the body, bounded by the request timeout and
/// [`MAX_RESPONSE_SIZE`].
pub(super) async fn send_limited(
    request: RequestBuilder,
) -> Result<(StatusCode, Vec<u8>), BackendError> {
    let exchange = async {
        let response = request.send().await?;
        let status = response.status();

        if let Some(len) = response.content_length() {
            if len as usize > MAX_RESPONSE_SIZE {
                return Err(BackendError::ResponseTooLarge(MAX_RESPONSE_SIZE));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if body.len().saturating_add(chunk.len()) > MAX_RESPONSE_SIZE {
                return Err(BackendError::ResponseTooLarge(MAX_RESPONSE_SIZE));
            }
            body.extend_from_slice(&chunk);
        }
        Ok((status, body))
    };

    tokio::time::timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS), exchange)
        .await
        .map_err(|_| BackendError::Timeout)?
}

/// Human-readable message from an error body. PostgREST uses `message`,
/// GoTrue uses `msg`, `error_description` or `error` depending on endpoint.
pub(super) fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        status.canonical_reason().unwrap_or("Unknown error").to_string()
    } else {
        crate::util::truncate_to_width(text, 200).into_owned()
    }
}

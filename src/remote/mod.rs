//! Access to the hosted backend.
//!
//! - [`Backend`]: the generic per-collection query/mutation interface the store
//!   talks to
//! - [`PostgrestClient`]: HTTP implementation against a PostgREST endpoint
//! - [`AuthClient`]: GoTrue sign-in, sign-up, password reset and refresh
//! - [`session`]: the signed-in session persisted between runs
//! - `MemoryBackend`: in-process implementation for tests (`test-support`)

mod auth;
#[cfg(any(test, feature = "test-support"))]
mod memory;
mod postgrest;
pub mod session;

pub use auth::{AuthClient, AuthError, Session, SignUpOutcome};
#[cfg(any(test, feature = "test-support"))]
pub use memory::{MemoryBackend, Op};
pub use postgrest::PostgrestClient;

use serde_json::Value;
use std::future::Future;
use thiserror::Error;

/// Request timeout for every backend call.
pub const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Upper bound on a response body.
pub const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

// ============================================================================
// Collections and filters
// ============================================================================

/// A named collection on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Entries,
    Categories,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Self::Entries => "entries",
            Self::Categories => "categories",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Column equality filter. `None` matches SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: &'static str,
    pub value: Option<String>,
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<String>) -> Self {
        Self {
            column,
            value: Some(value.into()),
        }
    }

    pub fn is_null(column: &'static str) -> Self {
        Self {
            column,
            value: None,
        }
    }

    /// PostgREST operator syntax: `eq.<value>` or `is.null`.
    pub fn operator(&self) -> String {
        match &self.value {
            Some(v) => format!("eq.{}", v),
            None => "is.null".to_string(),
        }
    }

    /// Evaluate the filter against a JSON row. Numbers compare by their
    /// decimal text, matching how ids are normalised client side.
    #[cfg(any(test, feature = "test-support"))]
    pub fn matches(&self, row: &Value) -> bool {
        let cell = row.get(self.column).unwrap_or(&Value::Null);
        match (&self.value, cell) {
            (None, Value::Null) => true,
            (None, _) | (Some(_), Value::Null) => false,
            (Some(want), Value::String(s)) => s == want,
            (Some(want), other) => other.to_string() == *want,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request timed out after 20s")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl BackendError {
    /// Whether repeating the same call could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::ResponseTooLarge(_) | Self::Decode(_) | Self::InvalidRequest(_) => false,
        }
    }

    /// 401/403: the access token is missing, expired or lacks permission.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

// ============================================================================
// Backend trait
// ============================================================================

/// Generic row-level access to the backend's collections.
///
/// Rows travel as JSON objects. Every mutation returns the affected rows as
/// the backend stored them. Futures are `Send` so calls can run on spawned
/// tasks.
pub trait Backend: Send + Sync {
    /// All rows of a collection visible to the current user.
    fn select(&self, table: Table) -> impl Future<Output = Result<Vec<Value>, BackendError>> + Send;

    /// Insert one row and return what was stored.
    fn insert(
        &self,
        table: Table,
        row: Value,
    ) -> impl Future<Output = Result<Vec<Value>, BackendError>> + Send;

    /// Apply `patch` to every row matching `filter` and return the updated rows.
    fn update(
        &self,
        table: Table,
        patch: Value,
        filter: Filter,
    ) -> impl Future<Output = Result<Vec<Value>, BackendError>> + Send;

    /// Delete every row matching `filter` and return the deleted rows.
    fn delete(
        &self,
        table: Table,
        filter: Filter,
    ) -> impl Future<Output = Result<Vec<Value>, BackendError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_operator() {
        assert_eq!(Filter::eq("id", "abc").operator(), "eq.abc");
        assert_eq!(Filter::is_null("parent").operator(), "is.null");
    }

    #[test]
    fn test_filter_matches() {
        let row = json!({ "id": 7, "parent": null, "label": "x" });
        assert!(Filter::eq("id", "7").matches(&row));
        assert!(Filter::is_null("parent").matches(&row));
        assert!(Filter::is_null("missing").matches(&row));
        assert!(!Filter::eq("parent", "7").matches(&row));
        assert!(!Filter::is_null("label").matches(&row));
        assert!(Filter::eq("label", "x").matches(&row));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(BackendError::Timeout.is_retryable());
        assert!(BackendError::Status { status: 503, message: String::new() }.is_retryable());
        assert!(!BackendError::Status { status: 400, message: String::new() }.is_retryable());
        assert!(BackendError::Status { status: 401, message: String::new() }.is_unauthorized());
        assert!(!BackendError::InvalidRequest("x".into()).is_retryable());
    }
}

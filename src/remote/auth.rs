use super::postgrest::{error_message, send_limited};
use super::BackendError;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Seconds before expiry at which a session is already treated as expired.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// Access token lifetime assumed when the server omits it.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

// ============================================================================
// Errors
// ============================================================================

/// Authentication failure, shaped for the login error panel.
///
/// `name` is `"{status} {error code}"` for server rejections (for example
/// `"400 invalid_credentials"`) and a short tag for local failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct AuthError {
    pub name: String,
    pub message: String,
    pub status: Option<u16>,
}

impl AuthError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            name: "invalid_input".to_string(),
            message: message.into(),
            status: None,
        }
    }

    fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let code = serde_json::from_slice::<Value>(body).ok().and_then(|v| {
            ["error_code", "error"]
                .into_iter()
                .find_map(|key| v.get(key).and_then(Value::as_str).map(str::to_string))
        });
        let code = code.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("error")
                .to_ascii_lowercase()
                .replace(' ', "_")
        });

        Self {
            name: format!("{} {}", status.as_u16(), code),
            message: error_message(status, body),
            status: Some(status.as_u16()),
        }
    }
}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        let name = match &err {
            BackendError::Timeout => "timeout",
            BackendError::Network(_) => "network_error",
            BackendError::Decode(_) => "malformed_response",
            _ => "request_failed",
        };
        let status = match &err {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        };
        Self {
            name: name.to_string(),
            message: err.to_string(),
            status,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// A signed-in user's tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .finish()
    }
}

impl Session {
    /// Whether the access token is expired or about to expire at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(Duration::seconds(EXPIRY_LEEWAY_SECS))
            .map_or(true, |deadline| deadline <= now)
    }

    pub fn access_secret(&self) -> SecretString {
        SecretString::from(self.access_token.clone())
    }

    pub fn display_user(&self) -> &str {
        self.email
            .as_deref()
            .or(self.user_id.as_deref())
            .unwrap_or("unknown user")
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<UserInfo>,
}

#[derive(Deserialize)]
struct UserInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let expires_at = match self.expires_at.and_then(|secs| DateTime::from_timestamp(secs, 0)) {
            Some(at) => at,
            None => {
                let lifetime = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
                Duration::try_seconds(lifetime)
                    .and_then(|delta| now.checked_add_signed(delta))
                    .ok_or_else(|| AuthError {
                        name: "malformed_response".to_string(),
                        message: format!("Token lifetime out of range: {}s", lifetime),
                        status: None,
                    })?
            }
        };
        let (user_id, email) = match self.user {
            Some(user) => (user.id, user.email),
            None => (None, None),
        };
        Ok(Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user_id,
            email,
        })
    }
}

/// Result of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The server signed the new user in straight away.
    SignedIn(Session),
    /// The account must be confirmed through the emailed link first.
    ConfirmationSent,
}

// ============================================================================
// Client
// ============================================================================

/// Client for the GoTrue endpoints under `{base}/auth/v1`.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base: Url,
    anon_key: Arc<SecretString>,
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("base", &self.base.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

impl AuthClient {
    pub fn new(http: reqwest::Client, base: Url, anon_key: Arc<SecretString>) -> Self {
        Self {
            http,
            base,
            anon_key,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AuthError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| AuthError::invalid_input(format!("unusable base URL {}", self.base)))?
            .pop_if_empty()
            .extend(["auth", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        let bearer = bearer.unwrap_or(self.anon_key.expose_secret());
        self.http
            .request(method, url)
            .header("apikey", self.anon_key.expose_secret())
            .header(AUTHORIZATION, format!("Bearer {}", bearer))
    }

    async fn call(&self, request: RequestBuilder) -> Result<Vec<u8>, AuthError> {
        let (status, body) = send_limited(request).await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(AuthError::from_response(status, &body))
        }
    }

    async fn token(&self, grant_type: &str, body: Value) -> Result<Session, AuthError> {
        let mut url = self.endpoint(&["token"])?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        let body = self
            .call(self.request(Method::POST, url, None).json(&body))
            .await?;
        let token: TokenResponse =
            serde_json::from_slice(&body).map_err(BackendError::Decode)?;
        token.into_session(Utc::now())
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        check_credentials(email, password)?;
        let session = self
            .token("password", json!({ "email": email.trim(), "password": password }))
            .await?;
        tracing::info!(user = %session.display_user(), "Signed in");
        Ok(session)
    }

    /// Exchange the refresh token for a new session.
    pub async fn refresh(&self, session: &Session) -> Result<Session, AuthError> {
        let mut fresh = self
            .token(
                "refresh_token",
                json!({ "refresh_token": session.refresh_token }),
            )
            .await?;
        if fresh.email.is_none() {
            fresh.email = session.email.clone();
        }
        if fresh.user_id.is_none() {
            fresh.user_id = session.user_id.clone();
        }
        tracing::debug!(expires_at = %fresh.expires_at, "Session refreshed");
        Ok(fresh)
    }

    /// Register a new account.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        check_credentials(email, password)?;
        let url = self.endpoint(&["signup"])?;
        let body = self
            .call(
                self.request(Method::POST, url, None)
                    .json(&json!({ "email": email.trim(), "password": password })),
            )
            .await?;

        // With autoconfirm the response is a full token set, otherwise the
        // bare user record.
        match serde_json::from_slice::<TokenResponse>(&body) {
            Ok(token) => {
                tracing::info!(email = %email.trim(), "Signed up and signed in");
                Ok(SignUpOutcome::SignedIn(token.into_session(Utc::now())?))
            }
            Err(_) => {
                tracing::info!(email = %email.trim(), "Sign-up confirmation sent");
                Ok(SignUpOutcome::ConfirmationSent)
            }
        }
    }

    /// Send a password-reset mail linking to `redirect_to`.
    pub async fn reset_password(
        &self,
        email: &str,
        redirect_to: Option<&Url>,
    ) -> Result<(), AuthError> {
        if email.trim().is_empty() {
            return Err(AuthError::invalid_input("Email is required"));
        }
        let mut url = self.endpoint(&["recover"])?;
        if let Some(redirect) = redirect_to {
            url.query_pairs_mut()
                .append_pair("redirect_to", redirect.as_str());
        }
        self.call(
            self.request(Method::POST, url, None)
                .json(&json!({ "email": email.trim() })),
        )
        .await?;
        tracing::info!(email = %email.trim(), "Password reset requested");
        Ok(())
    }

    /// Change the signed-in user's password.
    pub async fn update_password(&self, session: &Session, password: &str) -> Result<(), AuthError> {
        if password.is_empty() {
            return Err(AuthError::invalid_input("Password is required"));
        }
        let url = self.endpoint(&["user"])?;
        self.call(
            self.request(Method::PUT, url, Some(&session.access_token))
                .json(&json!({ "password": password })),
        )
        .await?;
        tracing::info!(user = %session.display_user(), "Password updated");
        Ok(())
    }

    /// Revoke the session's refresh token on the server.
    pub async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let url = self.endpoint(&["logout"])?;
        self.call(self.request(Method::POST, url, Some(&session.access_token)))
            .await?;
        tracing::info!(user = %session.display_user(), "Signed out");
        Ok(())
    }
}

fn check_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() {
        return Err(AuthError::invalid_input("Email is required"));
    }
    if password.is_empty() {
        return Err(AuthError::invalid_input("Password is required"));
    }
    Ok(())
}

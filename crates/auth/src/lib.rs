use std::time::Duration;

use async_trait::async_trait;
use builder_contracts::{AuthInfo, TableGrant};
use http::HeaderMap;
use http::header;
use serde::{Deserialize, Serialize};

pub const TOKEN_FORMAT_MESSAGE: &str = "token error: wrong format";

pub const ERR_TOKEN_FORMAT: &str = "ERR_TOKEN_FORMAT";
pub const ERR_PERMISSION_DENIED: &str = "ERR_PERMISSION_DENIED";
pub const ERR_INACTIVE: &str = "ERR_INACTIVE";
pub const ERR_TOKEN_EXPIRED: &str = "ERR_TOKEN_EXPIRED";
pub const ERR_AUTH_INVALID: &str = "ERR_AUTH_INVALID";
pub const ERR_AUTH_UNAVAILABLE: &str = "ERR_AUTH_UNAVAILABLE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRequest<'a> {
    pub access_token: &'a str,
    pub path: &'a str,
    pub method: &'a str,
    pub table_slug: &'a str,
}

/// Result of a successful token check: who the caller is and which tenant
/// the token is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub auth: AuthInfo,
    pub project_id: String,
    pub environment_id: String,
    pub resource_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthError {
    pub code: &'static str,
    pub message: String,
}

impl AuthError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AuthError {}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn has_access(&self, request: AccessRequest<'_>) -> Result<AccessGrant, AuthError>;
}

#[derive(Debug, Serialize)]
struct HasAccessBody<'a> {
    access_token: &'a str,
    path: &'a str,
    method: &'a str,
    table_slug: &'a str,
}

#[derive(Debug, Deserialize)]
struct HasAccessResponse {
    user_id: String,
    role_id: String,
    client_type_id: String,
    project_id: String,
    environment_id: String,
    #[serde(default)]
    resource_id: Option<String>,
    #[serde(default)]
    tables: Option<Vec<TableGrant>>,
}

#[derive(Debug, Deserialize)]
struct DeniedResponse {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct HttpAuthClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpAuthClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|_| AuthError::new(ERR_AUTH_UNAVAILABLE, "failed to initialize auth http client"))?;

        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    fn has_access_url(&self) -> String {
        format!("{}/v2/auth/has-access", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl AuthService for HttpAuthClient {
    async fn has_access(&self, request: AccessRequest<'_>) -> Result<AccessGrant, AuthError> {
        let resp = self
            .http
            .post(self.has_access_url())
            .json(&HasAccessBody {
                access_token: request.access_token,
                path: request.path,
                method: request.method,
                table_slug: request.table_slug,
            })
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "auth.has_access transport failure");
                AuthError::new(ERR_AUTH_UNAVAILABLE, "auth service unavailable")
            })?;

        let status = resp.status();
        if status.is_success() {
            let body = resp.json::<HasAccessResponse>().await.map_err(|_| {
                AuthError::new(ERR_AUTH_UNAVAILABLE, "auth service returned invalid JSON")
            })?;
            return Ok(AccessGrant {
                auth: AuthInfo {
                    user_id: body.user_id,
                    role_id: body.role_id,
                    client_type_id: body.client_type_id,
                    tables: body.tables,
                },
                project_id: body.project_id,
                environment_id: body.environment_id,
                resource_id: body.resource_id.filter(|id| !id.trim().is_empty()),
            });
        }

        if status.is_server_error() {
            return Err(AuthError::new(
                ERR_AUTH_UNAVAILABLE,
                format!("auth service returned status {}", status),
            ));
        }

        let denied = resp.json::<DeniedResponse>().await.unwrap_or(DeniedResponse {
            reason: String::new(),
            message: String::new(),
        });
        Err(denial_error(&denied.reason, denied.message))
    }
}

fn denial_error(reason: &str, message: String) -> AuthError {
    let message = if message.trim().is_empty() {
        "access denied".to_string()
    } else {
        message
    };

    match reason.trim().to_ascii_lowercase().as_str() {
        "permission_denied" => AuthError::new(ERR_PERMISSION_DENIED, message),
        "inactive" => AuthError::new(ERR_INACTIVE, message),
        "token_expired" | "expired" => AuthError::new(ERR_TOKEN_EXPIRED, message),
        _ => AuthError::new(ERR_AUTH_INVALID, message),
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
///
/// Only that exact shape is accepted: one space, case-sensitive scheme, a
/// non-empty token without further whitespace.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let wrong_format = || AuthError::new(ERR_TOKEN_FORMAT, TOKEN_FORMAT_MESSAGE);

    let authz = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(wrong_format)?;

    let token = authz.strip_prefix("Bearer ").ok_or_else(wrong_format)?;
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return Err(wrong_format());
    }

    Ok(token.to_string())
}

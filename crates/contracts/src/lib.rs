use std::fmt;

use serde::{Deserialize, Serialize};

pub mod canonical;
pub mod structure;

pub use structure::{EncodeError, Struct};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendFamily {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B")]
    B,
}

impl BackendFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendFamily::A => "A",
            BackendFamily::B => "B",
        }
    }

    /// Service name recorded in version-history entries.
    pub fn service_name(self) -> &'static str {
        match self {
            BackendFamily::A => "builder_service",
            BackendFamily::B => "postgres_service",
        }
    }
}

/// Identifies the backend serving one tenant environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub backend_family: BackendFamily,
    pub node_type: String,
    pub resource_env_id: String,
    pub project_id: String,
    pub env_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGrant {
    pub table_slug: String,
    #[serde(default)]
    pub object_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub user_id: String,
    pub role_id: String,
    pub client_type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<TableGrant>>,
}

/// Envelope sent to both backend families.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommonMessage {
    pub table_slug: String,
    pub project_id: String,
    #[serde(default)]
    pub data: Struct,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_project_id: Option<String>,
    #[serde(default)]
    pub is_cached: bool,
    #[serde(default)]
    pub blocked_builder: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HookMethod {
    Create,
    CreateMany,
    Update,
    MultipleUpdate,
    Delete,
    DeleteMany,
    #[serde(rename = "APPEND_MANY2MANY")]
    AppendMany2Many,
    #[serde(rename = "DELETE_MANY2MANY")]
    DeleteMany2Many,
}

impl HookMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HookMethod::Create => "CREATE",
            HookMethod::CreateMany => "CREATE_MANY",
            HookMethod::Update => "UPDATE",
            HookMethod::MultipleUpdate => "MULTIPLE_UPDATE",
            HookMethod::Delete => "DELETE",
            HookMethod::DeleteMany => "DELETE_MANY",
            HookMethod::AppendMany2Many => "APPEND_MANY2MANY",
            HookMethod::DeleteMany2Many => "DELETE_MANY2MANY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Before,
    After,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Before => "BEFORE",
            ActionType::After => "AFTER",
        }
    }
}

/// A tenant-defined function bound to a table operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEvent {
    pub id: String,
    pub table_slug: String,
    pub method: HookMethod,
    pub action_type: ActionType,
    #[serde(default)]
    pub role_id: String,
    pub function_ref: String,
    #[serde(default)]
    pub function_name: String,
}

impl CustomEvent {
    pub fn display_name(&self) -> &str {
        if self.function_name.trim().is_empty() {
            &self.function_ref
        } else {
            &self.function_name
        }
    }

    /// Events without a role apply to every caller.
    pub fn applies_to_role(&self, role_id: &str) -> bool {
        self.role_id.is_empty() || self.role_id == role_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEventQuery {
    pub table_slug: String,
    pub method: HookMethod,
    pub role_id: String,
    pub resource_env_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionHistoryRecord {
    pub services: Vec<String>,
    pub node_type: String,
    pub project_id: String,
    pub action_source: String,
    pub action_type: String,
    pub user_info: String,
    pub table_slug: String,
    pub request: serde_json::Value,
    pub response: serde_json::Value,
    #[serde(default)]
    pub previous: serde_json::Value,
    #[serde(default)]
    pub current: serde_json::Value,
}

/// Canonical RPC status codes reported by backends and collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcCode {
    Canceled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl RpcCode {
    pub const ALL: [RpcCode; 16] = [
        RpcCode::Canceled,
        RpcCode::Unknown,
        RpcCode::InvalidArgument,
        RpcCode::DeadlineExceeded,
        RpcCode::NotFound,
        RpcCode::AlreadyExists,
        RpcCode::PermissionDenied,
        RpcCode::ResourceExhausted,
        RpcCode::FailedPrecondition,
        RpcCode::Aborted,
        RpcCode::OutOfRange,
        RpcCode::Unimplemented,
        RpcCode::Internal,
        RpcCode::Unavailable,
        RpcCode::DataLoss,
        RpcCode::Unauthenticated,
    ];

    /// Name used as the status-map key.
    pub fn as_str(self) -> &'static str {
        match self {
            RpcCode::Canceled => "Canceled",
            RpcCode::Unknown => "Unknown",
            RpcCode::InvalidArgument => "InvalidArgument",
            RpcCode::DeadlineExceeded => "DeadlineExceeded",
            RpcCode::NotFound => "NotFound",
            RpcCode::AlreadyExists => "AlreadyExists",
            RpcCode::PermissionDenied => "PermissionDenied",
            RpcCode::ResourceExhausted => "ResourceExhausted",
            RpcCode::FailedPrecondition => "FailedPrecondition",
            RpcCode::Aborted => "Aborted",
            RpcCode::OutOfRange => "OutOfRange",
            RpcCode::Unimplemented => "Unimplemented",
            RpcCode::Internal => "Internal",
            RpcCode::Unavailable => "Unavailable",
            RpcCode::DataLoss => "DataLoss",
            RpcCode::Unauthenticated => "Unauthenticated",
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            RpcCode::Canceled => "CANCELLED",
            RpcCode::Unknown => "UNKNOWN",
            RpcCode::InvalidArgument => "INVALID_ARGUMENT",
            RpcCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            RpcCode::NotFound => "NOT_FOUND",
            RpcCode::AlreadyExists => "ALREADY_EXISTS",
            RpcCode::PermissionDenied => "PERMISSION_DENIED",
            RpcCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            RpcCode::FailedPrecondition => "FAILED_PRECONDITION",
            RpcCode::Aborted => "ABORTED",
            RpcCode::OutOfRange => "OUT_OF_RANGE",
            RpcCode::Unimplemented => "UNIMPLEMENTED",
            RpcCode::Internal => "INTERNAL",
            RpcCode::Unavailable => "UNAVAILABLE",
            RpcCode::DataLoss => "DATA_LOSS",
            RpcCode::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    /// Parses a wire code name; anything unrecognized is `Unknown`.
    pub fn from_wire(name: &str) -> Self {
        let name = name.trim();
        RpcCode::ALL
            .into_iter()
            .find(|code| code.wire_name().eq_ignore_ascii_case(name) || code.as_str() == name)
            .unwrap_or(RpcCode::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcStatus {
    pub code: RpcCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Unavailable, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(RpcCode::DeadlineExceeded, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Internal, message)
    }
}

impl fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc error: code = {} desc = {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for RpcStatus {}

/// JSON body carried by non-success RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcStatusBody {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl From<RpcStatusBody> for RpcStatus {
    fn from(value: RpcStatusBody) -> Self {
        RpcStatus::new(RpcCode::from_wire(&value.code), value.message)
    }
}

impl From<&RpcStatus> for RpcStatusBody {
    fn from(value: &RpcStatus) -> Self {
        RpcStatusBody {
            code: value.code.wire_name().to_string(),
            message: value.message.clone(),
        }
    }
}

//! Handler-level error taxonomy. Every variant maps to exactly one Status
//! Map binding.

use builder_auth::{
    AuthError, ERR_INACTIVE, ERR_PERMISSION_DENIED, ERR_TOKEN_EXPIRED, ERR_TOKEN_FORMAT,
    TOKEN_FORMAT_MESSAGE,
};
use builder_contracts::RpcStatus;

use crate::dispatcher::{DispatchError, NOT_IMPLEMENTED_MESSAGE};
use crate::hooks::HookFailure;
use crate::registry::RegistryError;
use crate::status_map::{self, StatusBinding};

pub const INVALID_PROJECT_ID: &str = "project_id is an invalid uuid";
pub const INVALID_ENVIRONMENT_ID: &str = "environment id is an invalid uuid";
pub const INVALID_ITEM_ID: &str = "item id is an invalid uuid";

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayError {
    Decode(String),
    InvalidProjectId,
    InvalidEnvironmentId,
    InvalidItemId,
    TokenFormat,
    Auth(AuthError),
    Registry(RegistryError),
    NotImplemented,
    Hook(HookFailure),
    Backend(RpcStatus),
}

impl GatewayError {
    pub fn binding(&self) -> StatusBinding {
        match self {
            GatewayError::Decode(_)
            | GatewayError::InvalidProjectId
            | GatewayError::InvalidItemId
            | GatewayError::NotImplemented
            | GatewayError::Hook(_) => status_map::lookup(status_map::BAD_REQUEST),
            GatewayError::InvalidEnvironmentId => status_map::lookup(status_map::BAD_ENVIRONMENT),
            GatewayError::TokenFormat => status_map::lookup(status_map::FORBIDDEN),
            GatewayError::Auth(err) => match err.code {
                ERR_TOKEN_FORMAT | ERR_TOKEN_EXPIRED => status_map::lookup(status_map::FORBIDDEN),
                ERR_PERMISSION_DENIED | ERR_INACTIVE => status_map::lookup(status_map::BAD_REQUEST),
                _ => status_map::lookup(status_map::UNAUTHORIZED),
            },
            GatewayError::Registry(err) => {
                status_map::lookup_with_message(status_map::GRPC_ERROR, err.to_string())
            }
            GatewayError::Backend(status) => status_map::for_rpc(status.code, &status.message),
        }
    }

    /// Text placed in the response `data` field.
    pub fn data_text(&self) -> String {
        match self {
            GatewayError::Decode(message) => message.clone(),
            GatewayError::InvalidProjectId => INVALID_PROJECT_ID.to_string(),
            GatewayError::InvalidEnvironmentId => INVALID_ENVIRONMENT_ID.to_string(),
            GatewayError::InvalidItemId => INVALID_ITEM_ID.to_string(),
            GatewayError::TokenFormat => TOKEN_FORMAT_MESSAGE.to_string(),
            GatewayError::Auth(err) => err.message.clone(),
            GatewayError::Registry(err) => err.to_string(),
            GatewayError::NotImplemented => NOT_IMPLEMENTED_MESSAGE.to_string(),
            GatewayError::Hook(failure) => failure.to_string(),
            GatewayError::Backend(status) => status.message.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Decode(_)
            | GatewayError::InvalidProjectId
            | GatewayError::InvalidEnvironmentId
            | GatewayError::InvalidItemId => "decode",
            GatewayError::TokenFormat | GatewayError::Auth(_) => "auth",
            GatewayError::Registry(_) => "registry",
            GatewayError::NotImplemented => "not_implemented",
            GatewayError::Hook(_) => "hook",
            GatewayError::Backend(_) => "backend",
        }
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Backend(status) => write!(f, "{}", status),
            other => f.write_str(&other.data_text()),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<RegistryError> for GatewayError {
    fn from(value: RegistryError) -> Self {
        GatewayError::Registry(value)
    }
}

impl From<DispatchError> for GatewayError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Registry(err) => GatewayError::Registry(err),
            DispatchError::NotImplemented { .. } => GatewayError::NotImplemented,
        }
    }
}

impl From<HookFailure> for GatewayError {
    fn from(value: HookFailure) -> Self {
        GatewayError::Hook(value)
    }
}

impl From<RpcStatus> for GatewayError {
    fn from(value: RpcStatus) -> Self {
        GatewayError::Backend(value)
    }
}

impl From<AuthError> for GatewayError {
    fn from(value: AuthError) -> Self {
        if value.code == ERR_TOKEN_FORMAT {
            GatewayError::TokenFormat
        } else {
            GatewayError::Auth(value)
        }
    }
}

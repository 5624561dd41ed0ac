//! Static translation from status names to HTTP responses.
//!
//! Every HTTP status the gateway emits comes from this table. Backend RPC
//! codes are keyed by [`RpcCode::as_str`].

use std::collections::HashMap;
use std::sync::OnceLock;

use axum::http::StatusCode;
use builder_contracts::RpcCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBinding {
    pub name: &'static str,
    pub status: StatusCode,
    pub description: &'static str,
    pub custom_message: Option<String>,
}

impl StatusBinding {
    /// Upper snake name used in response bodies (`NOT_FOUND`, `GRPC_ERROR`).
    pub fn status_label(&self) -> String {
        let chars = self.name.chars().collect::<Vec<_>>();
        let mut out = String::with_capacity(chars.len() + 4);
        for (idx, ch) in chars.iter().enumerate() {
            if idx > 0 && ch.is_ascii_uppercase() {
                let prev_lower = chars[idx - 1].is_ascii_lowercase();
                let next_lower = chars.get(idx + 1).is_some_and(|c| c.is_ascii_lowercase());
                if prev_lower || next_lower {
                    out.push('_');
                }
            }
            out.push(ch.to_ascii_uppercase());
        }
        out
    }
}

pub const OK: &str = "Ok";
pub const CREATED: &str = "Created";
pub const NO_CONTENT: &str = "NoContent";
pub const BAD_REQUEST: &str = "BadRequest";
pub const INVALID_ARGUMENT: &str = "InvalidArgument";
pub const FORBIDDEN: &str = "Forbidden";
pub const UNAUTHORIZED: &str = "Unauthorized";
pub const NOT_FOUND: &str = "NotFound";
pub const INTERNAL: &str = "Internal";
pub const GRPC_ERROR: &str = "GRPCError";
pub const BAD_ENVIRONMENT: &str = "BadEnvironment";

static STATUS_MAP: OnceLock<HashMap<&'static str, (StatusCode, &'static str)>> = OnceLock::new();

fn table() -> &'static HashMap<&'static str, (StatusCode, &'static str)> {
    STATUS_MAP.get_or_init(|| {
        let mut map = HashMap::from([
            (OK, (StatusCode::OK, "The request has succeeded")),
            (CREATED, (StatusCode::CREATED, "The request has been fulfilled and resulted in a new resource being created")),
            (NO_CONTENT, (StatusCode::NO_CONTENT, "The server has fulfilled the request but does not need to return an entity-body")),
            (BAD_REQUEST, (StatusCode::BAD_REQUEST, "The request could not be understood by the server due to malformed syntax")),
            (FORBIDDEN, (StatusCode::FORBIDDEN, "The server understood the request, but is refusing to fulfill it")),
            (UNAUTHORIZED, (StatusCode::UNAUTHORIZED, "The request requires user authentication")),
            (GRPC_ERROR, (StatusCode::INTERNAL_SERVER_ERROR, "Backend service call failed")),
            (BAD_ENVIRONMENT, (StatusCode::BAD_REQUEST, "Environment is missing or invalid")),
        ]);

        for code in RpcCode::ALL {
            map.insert(code.as_str(), rpc_binding(code));
        }

        map
    })
}

fn rpc_binding(code: RpcCode) -> (StatusCode, &'static str) {
    match code {
        RpcCode::Canceled => (StatusCode::REQUEST_TIMEOUT, "The operation was cancelled"),
        RpcCode::Unknown => (StatusCode::INTERNAL_SERVER_ERROR, "Unknown backend error"),
        RpcCode::InvalidArgument => (StatusCode::BAD_REQUEST, "Client specified an invalid argument"),
        RpcCode::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, "Deadline expired before the operation could complete"),
        RpcCode::NotFound => (StatusCode::NOT_FOUND, "Requested entity was not found"),
        RpcCode::AlreadyExists => (StatusCode::CONFLICT, "The entity already exists"),
        RpcCode::PermissionDenied => (StatusCode::FORBIDDEN, "The caller does not have permission"),
        RpcCode::ResourceExhausted => (StatusCode::TOO_MANY_REQUESTS, "Some resource has been exhausted"),
        RpcCode::FailedPrecondition => (StatusCode::BAD_REQUEST, "The system is not in a state required for the operation"),
        RpcCode::Aborted => (StatusCode::CONFLICT, "The operation was aborted"),
        RpcCode::OutOfRange => (StatusCode::BAD_REQUEST, "The operation was attempted past the valid range"),
        RpcCode::Unimplemented => (StatusCode::NOT_IMPLEMENTED, "The operation is not implemented"),
        RpcCode::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        RpcCode::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "The service is currently unavailable"),
        RpcCode::DataLoss => (StatusCode::INTERNAL_SERVER_ERROR, "Unrecoverable data loss or corruption"),
        RpcCode::Unauthenticated => (StatusCode::UNAUTHORIZED, "The request does not have valid authentication credentials"),
    }
}

/// Resolves a status name; unknown names resolve to `Internal`.
pub fn lookup(code_name: &str) -> StatusBinding {
    let (name, (status, description)) = table()
        .get_key_value(code_name)
        .map(|(k, v)| (*k, *v))
        .unwrap_or_else(|| (INTERNAL, rpc_binding(RpcCode::Internal)));

    StatusBinding {
        name,
        status,
        description,
        custom_message: None,
    }
}

pub fn lookup_with_message(code_name: &str, custom_message: impl Into<String>) -> StatusBinding {
    let mut binding = lookup(code_name);
    let custom_message = custom_message.into();
    binding.custom_message = (!custom_message.is_empty()).then_some(custom_message);
    binding
}

pub fn for_rpc(code: RpcCode, message: &str) -> StatusBinding {
    lookup_with_message(code.as_str(), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_bindings_match_http_surface() {
        let expected = [
            (OK, 200),
            (CREATED, 201),
            (NO_CONTENT, 204),
            (BAD_REQUEST, 400),
            (UNAUTHORIZED, 401),
            (FORBIDDEN, 403),
            (NOT_FOUND, 404),
            (INVALID_ARGUMENT, 400),
            (INTERNAL, 500),
            (GRPC_ERROR, 500),
            (BAD_ENVIRONMENT, 400),
        ];

        for (name, code) in expected {
            let binding = lookup(name);
            assert_eq!(binding.status.as_u16(), code, "binding {}", name);
            assert_eq!(binding.name, name);
        }
    }

    #[test]
    fn every_rpc_code_has_a_fixed_binding() {
        for code in RpcCode::ALL {
            let binding = lookup(code.as_str());
            assert_eq!(binding.name, code.as_str());
            assert!(binding.status.is_client_error() || binding.status.is_server_error());
        }
        assert_eq!(lookup("Unknown").status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unknown_names_resolve_to_internal() {
        let binding = lookup("SomethingElse");
        assert_eq!(binding.name, INTERNAL);
        assert_eq!(binding.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn custom_message_is_carried() {
        let binding = for_rpc(RpcCode::NotFound, "order gone");
        assert_eq!(binding.status, StatusCode::NOT_FOUND);
        assert_eq!(binding.custom_message.as_deref(), Some("order gone"));

        assert!(lookup_with_message(OK, "").custom_message.is_none());
    }

    #[test]
    fn status_labels_are_upper_snake() {
        assert_eq!(lookup(NOT_FOUND).status_label(), "NOT_FOUND");
        assert_eq!(lookup(CREATED).status_label(), "CREATED");
        assert_eq!(lookup(GRPC_ERROR).status_label(), "GRPC_ERROR");
        assert_eq!(lookup(BAD_ENVIRONMENT).status_label(), "BAD_ENVIRONMENT");
    }
}

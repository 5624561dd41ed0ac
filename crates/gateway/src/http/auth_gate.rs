use std::time::Instant;

use axum::extract::{MatchedPath, RawPathParams, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use builder_auth::{AccessRequest, bearer_token};
use builder_contracts::AuthInfo;

use super::finalize::error_response;
use super::{AppState, extract_request_id};
use crate::error::GatewayError;

const UNMATCHED_ROUTE: &str = "unmatched";

/// Per-request values proven by the auth service.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestScope {
    pub auth: Option<AuthInfo>,
    pub project_id: String,
    pub environment_id: String,
    pub resource_id: Option<String>,
    pub user_id: Option<String>,
}

/// Reads the caller's identity; absence means the gate did not run.
pub fn get_auth(scope: Option<&RequestScope>) -> Result<(&RequestScope, &AuthInfo), GatewayError> {
    let scope = scope.ok_or(GatewayError::TokenFormat)?;
    let auth = scope.auth.as_ref().ok_or(GatewayError::TokenFormat)?;
    Ok((scope, auth))
}

pub(super) async fn auth_gate(
    State(state): State<AppState>,
    params: RawPathParams,
    mut req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let request_id = extract_request_id(req.headers());
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());
    let path = req.uri().path().to_string();
    let method = req.method().as_str().to_string();

    let token = match bearer_token(req.headers()) {
        Ok(token) => token,
        Err(err) => {
            return reject(GatewayError::from(err), &request_id, &route, &method, started);
        }
    };

    let table_slug = params
        .iter()
        .find(|(name, _)| *name == "collection")
        .map(|(_, value)| value.to_string())
        .unwrap_or_default();

    let grant = state
        .auth
        .has_access(AccessRequest {
            access_token: &token,
            path: &path,
            method: &method,
            table_slug: &table_slug,
        })
        .await;

    match grant {
        Ok(grant) => {
            let user_id = grant.auth.user_id.clone();
            req.extensions_mut().insert(RequestScope {
                auth: Some(grant.auth),
                project_id: grant.project_id,
                environment_id: grant.environment_id,
                resource_id: grant.resource_id,
                user_id: (!user_id.is_empty()).then_some(user_id),
            });
            next.run(req).await
        }
        Err(err) => {
            tracing::info!(
                request_id = %request_id,
                path = %path,
                code = err.code,
                "auth_gate.denied"
            );
            reject(GatewayError::from(err), &request_id, &route, &method, started)
        }
    }
}

/// Rejections before a handler runs; counted like handler responses.
fn reject(err: GatewayError, request_id: &str, route: &str, method: &str, started: Instant) -> Response {
    let resp = error_response(&err, request_id);
    crate::metrics::observe_http_request(route, method, resp.status().as_u16(), started.elapsed());
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_auth_requires_populated_scope() {
        assert_eq!(get_auth(None).map(|_| ()), Err(GatewayError::TokenFormat));

        let mut scope = RequestScope {
            auth: None,
            project_id: "p".to_string(),
            environment_id: "e".to_string(),
            resource_id: None,
            user_id: None,
        };
        assert_eq!(get_auth(Some(&scope)).map(|_| ()), Err(GatewayError::TokenFormat));

        scope.auth = Some(AuthInfo {
            user_id: "u".to_string(),
            role_id: "r".to_string(),
            client_type_id: "c".to_string(),
            tables: None,
        });
        let (_, auth) = get_auth(Some(&scope)).expect("auth present");
        assert_eq!(auth.role_id, "r");
    }
}

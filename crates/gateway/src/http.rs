use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use builder_auth::{AuthService, HttpAuthClient};
use serde::Serialize;
use ulid::Ulid;

use crate::cache::ReadCache;
use crate::config::{GatewayConfig, StartupError};
use crate::dispatcher::Dispatcher;
use crate::history::HistoryWriter;
use crate::hooks::{FunctionRunner, HookEngine, HttpFunctionRunner};
use crate::registry::{BackendRegistry, CachedRegistry, HttpRegistryClient, ServicePool};
use crate::task_pool::TaskPool;

mod auth_gate;
mod finalize;
mod items;
mod pipeline;
mod schema;

pub use self::auth_gate::{RequestScope, get_auth};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// External collaborators the gateway talks to.
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<dyn AuthService>,
    pub registry: Arc<dyn BackendRegistry>,
    pub backends: ServicePool,
    pub functions: Arc<dyn FunctionRunner>,
}

impl Services {
    /// HTTP clients for every collaborator named in `config`.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, StartupError> {
        let auth = HttpAuthClient::new(config.auth_url.clone(), config.rpc_timeout()).map_err(|err| {
            StartupError {
                code: "ERR_AUTH_UNAVAILABLE",
                message: format!("failed to initialize auth client: {}", err.message),
            }
        })?;

        let registry = HttpRegistryClient::new(config.registry_url.clone(), config.rpc_timeout())
            .map_err(|err| StartupError {
                code: "ERR_REGISTRY_UNAVAILABLE",
                message: format!("failed to initialize registry client: {}", err),
            })?;

        let backends = ServicePool::from_nodes(
            &config.backend_a_nodes,
            &config.backend_b_nodes,
            config.primary_timeout().max(config.rpc_timeout()),
        )
        .map_err(|err| StartupError {
            code: "ERR_BACKEND_UNAVAILABLE",
            message: format!("failed to initialize backend clients: {}", err),
        })?;

        let functions = HttpFunctionRunner::new(config.function_url.clone(), config.hook_timeout())
            .map_err(|err| StartupError {
                code: "ERR_FUNCTION_UNAVAILABLE",
                message: format!("failed to initialize function client: {}", err),
            })?;

        Ok(Self {
            auth: Arc::new(auth),
            registry: Arc::new(CachedRegistry::new(registry, config.registry_cache_ttl())),
            backends,
            functions: Arc::new(functions),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    auth: Arc<dyn AuthService>,
    dispatcher: Dispatcher,
    hooks: HookEngine,
    cache: ReadCache,
    history: HistoryWriter,
}

impl AppState {
    pub fn new(config: GatewayConfig, services: Services) -> Self {
        let cache = ReadCache::new(
            config.cache_max_entries,
            config.cache_max_entry_bytes,
            config.cache_list_ttl(),
            config.cache_aggregation_ttl(),
        );
        let pool = TaskPool::new("history", config.history_workers, config.history_queue_warn);
        let history = HistoryWriter::new(pool, config.history_write_timeout());
        let hooks = HookEngine::new(services.functions, config.hook_timeout());
        let dispatcher = Dispatcher::new(services.registry, services.backends);

        Self {
            config: Arc::new(config),
            auth: services.auth,
            dispatcher,
            hooks,
            cache,
            history,
        }
    }

    pub fn history(&self) -> &HistoryWriter {
        &self.history
    }

    pub fn cache(&self) -> &ReadCache {
        &self.cache
    }
}

pub fn router(config: GatewayConfig) -> Result<Router, StartupError> {
    let services = Services::from_config(&config)?;
    Ok(app(AppState::new(config, services)))
}

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v3/items/{collection}", post(items::create_item).put(items::update_item))
        .route(
            "/v3/items/{collection}/multiple",
            post(items::create_items).put(items::update_items),
        )
        .route("/v3/items/{collection}/list", post(items::list_items))
        .route("/v3/items/{collection}/aggregation", post(items::aggregate))
        .route("/v3/items/{collection}/delete", post(items::delete_items))
        .route("/v3/items/{collection}/m2m/append", post(items::append_many2many))
        .route("/v3/items/{collection}/m2m/delete", post(items::delete_many2many))
        .route("/v3/items/{collection}/row-order", put(items::update_row_order))
        .route(
            "/v3/items/{collection}/{id}",
            get(items::get_item)
                .put(items::update_item_by_id)
                .delete(items::delete_item),
        )
        .merge(schema::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_gate::auth_gate,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .merge(protected)
        .layer(middleware::from_fn(propagate_request_id))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ReadyzResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, bool>,
    background_queue_depth: usize,
    background_in_flight: usize,
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let pool = state.history.pool();
    let mut checks = BTreeMap::new();
    checks.insert("history_pool_accepting", pool.is_accepting());
    checks.insert("history_queue_below_warn", pool.is_ready());

    let all_ready = checks.values().all(|ok| *ok);
    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyzResponse {
            status: if all_ready { "ready" } else { "not_ready" },
            checks,
            background_queue_depth: pool.queue_depth(),
            background_in_flight: pool.in_flight(),
        }),
    )
}

async fn metrics() -> impl IntoResponse {
    match crate::metrics::render() {
        Ok((body, content_type)) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(content_type.as_str()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            (headers, body).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Pins a sanitized request id on the request and echoes it on the response.
async fn propagate_request_id(mut req: Request, next: Next) -> Response {
    let request_id = extract_request_id(req.headers());
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
        let mut resp = next.run(req).await;
        resp.headers_mut().insert(REQUEST_ID_HEADER, value);
        return resp;
    }
    next.run(req).await
}

pub(crate) fn extract_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .and_then(sanitize_request_id)
        .unwrap_or_else(|| Ulid::new().to_string())
}

fn sanitize_request_id(raw: &str) -> Option<String> {
    const MAX_LEN: usize = 64;
    let mut out = String::with_capacity(raw.len().min(MAX_LEN));

    for ch in raw.chars() {
        if out.len() >= MAX_LEN {
            break;
        }
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            out.push(ch);
        }
    }

    (!out.is_empty()).then_some(out)
}

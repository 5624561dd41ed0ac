use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use builder_auth::{
    AccessGrant, AccessRequest, AuthError, AuthService, ERR_AUTH_INVALID, ERR_INACTIVE,
    ERR_PERMISSION_DENIED, ERR_TOKEN_EXPIRED,
};
use builder_contracts::{
    AuthInfo, BackendFamily, CommonMessage, CustomEvent, CustomEventQuery, ResourceDescriptor,
    RpcStatus, VersionHistoryRecord, structure,
};
use builder_gateway::backend::{BackendResult, BuilderBackend, Operation, SchemaKind};
use builder_gateway::config::GatewayConfig;
use builder_gateway::hooks::{FunctionRunner, HookPayload};
use builder_gateway::http::{AppState, Services, app};
use builder_gateway::registry::{BackendRegistry, RegistryError, ServicePool};
use serde_json::{Map, Value, json};

pub const PROJECT_ID: &str = "4f1b3c9e-2f4a-4d7e-9a51-6c0d7b1e2a33";
pub const ENV_ID: &str = "a3d5e6f7-8b9c-4d0e-8f1a-2b3c4d5e6f70";
pub const OTHER_PROJECT_ID: &str = "0b7f3a52-6a9d-4f3e-8c2b-1d0e9f8a7b6c";
pub const RESOURCE_ENV_A: &str = "res-env-a";
pub const RESOURCE_ENV_B: &str = "res-env-b";
pub const ITEM_ID: &str = "9a8c7c4e-3c53-4b5e-9f5e-0d9c2f1f7b11";

pub const TOKEN: &str = "good-token";
pub const TOKEN_FAMILY_B: &str = "family-b-token";
pub const TOKEN_BAD_PROJECT: &str = "bad-project-token";
pub const TOKEN_EXPIRED: &str = "expired-token";
pub const TOKEN_DENIED: &str = "denied-token";
pub const TOKEN_INACTIVE: &str = "inactive-token";

pub fn config_kv() -> HashMap<String, String> {
    let mut kv = HashMap::new();
    kv.insert("BUILDER_AUTH_URL".to_string(), "http://127.0.0.1:9".to_string());
    kv.insert("BUILDER_REGISTRY_URL".to_string(), "http://127.0.0.1:9".to_string());
    kv.insert("BUILDER_FUNCTION_URL".to_string(), "http://127.0.0.1:9".to_string());
    kv.insert(
        "BUILDER_BACKEND_A_NODES".to_string(),
        "default=http://127.0.0.1:9".to_string(),
    );
    kv
}

pub fn test_config(overrides: &[(&str, &str)]) -> GatewayConfig {
    let mut kv = config_kv();
    for (key, value) in overrides {
        kv.insert(key.to_string(), value.to_string());
    }
    GatewayConfig::from_kv(&kv).expect("test config")
}

pub struct FakeAuth {
    pub calls: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl AuthService for FakeAuth {
    async fn has_access(&self, request: AccessRequest<'_>) -> Result<AccessGrant, AuthError> {
        self.calls.lock().expect("lock").push((
            request.path.to_string(),
            request.method.to_string(),
            request.table_slug.to_string(),
        ));

        let grant = |project_id: &str, user_id: &str| AccessGrant {
            auth: AuthInfo {
                user_id: user_id.to_string(),
                role_id: "role-editor".to_string(),
                client_type_id: "client-admin".to_string(),
                tables: None,
            },
            project_id: project_id.to_string(),
            environment_id: ENV_ID.to_string(),
            resource_id: None,
        };

        match request.access_token {
            TOKEN => Ok(grant(PROJECT_ID, "user-a")),
            TOKEN_FAMILY_B => Ok(grant(OTHER_PROJECT_ID, "user-b")),
            TOKEN_BAD_PROJECT => Ok(grant("not-a-uuid", "user-c")),
            TOKEN_EXPIRED => Err(AuthError::new(ERR_TOKEN_EXPIRED, "token expired")),
            TOKEN_DENIED => Err(AuthError::new(ERR_PERMISSION_DENIED, "permission denied")),
            TOKEN_INACTIVE => Err(AuthError::new(ERR_INACTIVE, "user is inactive")),
            _ => Err(AuthError::new(ERR_AUTH_INVALID, "invalid token")),
        }
    }
}

pub struct FakeRegistry {
    pub calls: AtomicUsize,
}

#[async_trait]
impl BackendRegistry for FakeRegistry {
    async fn resolve(&self, project_id: &str, env_id: &str) -> Result<ResourceDescriptor, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (family, resource_env_id) = match project_id {
            PROJECT_ID => (BackendFamily::A, RESOURCE_ENV_A),
            OTHER_PROJECT_ID => (BackendFamily::B, RESOURCE_ENV_B),
            _ => {
                return Err(RegistryError::Rpc(RpcStatus::new(
                    builder_contracts::RpcCode::NotFound,
                    "resource not found",
                )));
            }
        };
        Ok(ResourceDescriptor {
            backend_family: family,
            node_type: "default".to_string(),
            resource_env_id: resource_env_id.to_string(),
            project_id: project_id.to_string(),
            env_id: env_id.to_string(),
        })
    }
}

/// In-memory backend recording every call.
pub struct FakeBackend {
    family: BackendFamily,
    pub calls: Mutex<Vec<(Operation, CommonMessage)>>,
    pub errors: Mutex<HashMap<Operation, RpcStatus>>,
    pub events: Mutex<Vec<CustomEvent>>,
    pub history: Mutex<Vec<VersionHistoryRecord>>,
    pub advertise_cacheable: Mutex<bool>,
    pub primary_delay: Mutex<Option<Duration>>,
    pub history_delay: Mutex<Option<Duration>>,
    pub completed: AtomicUsize,
}

impl FakeBackend {
    pub fn new(family: BackendFamily) -> Arc<Self> {
        Arc::new(Self {
            family,
            calls: Mutex::new(Vec::new()),
            errors: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            advertise_cacheable: Mutex::new(false),
            primary_delay: Mutex::new(None),
            history_delay: Mutex::new(None),
            completed: AtomicUsize::new(0),
        })
    }

    pub fn fail_with(&self, op: Operation, status: RpcStatus) {
        self.errors.lock().expect("lock").insert(op, status);
    }

    pub fn register_event(&self, event: CustomEvent) {
        self.events.lock().expect("lock").push(event);
    }

    pub fn calls_of(&self, op: Operation) -> Vec<CommonMessage> {
        self.calls
            .lock()
            .expect("lock")
            .iter()
            .filter(|(called, _)| *called == op)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("lock").len()
    }

    pub fn history(&self) -> Vec<VersionHistoryRecord> {
        self.history.lock().expect("lock").clone()
    }

    async fn handle(&self, op: Operation, msg: CommonMessage) -> BackendResult {
        self.calls.lock().expect("lock").push((op, msg.clone()));

        let delay = *self.primary_delay.lock().expect("lock");
        if op.is_mutation()
            && let Some(delay) = delay
        {
            tokio::time::sleep(delay).await;
        }

        if let Some(status) = self.errors.lock().expect("lock").get(&op).cloned() {
            return Err(status);
        }

        let data = match op {
            Operation::ListItems | Operation::Aggregate => {
                let calls = self.calls_of(op).len();
                let mut map = Map::new();
                map.insert("count".to_string(), json!(calls));
                map.insert("response".to_string(), json!([{"name": "first"}]));
                structure::encode_map(&map).expect("encode list response")
            }
            Operation::GetItem => {
                let mut map = structure::decode(&msg.data);
                map.insert("status".to_string(), json!("stored"));
                structure::encode_map(&map).expect("encode item")
            }
            _ => msg.data.clone(),
        };

        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(CommonMessage {
            data,
            is_cached: *self.advertise_cacheable.lock().expect("lock"),
            ..msg
        })
    }
}

#[async_trait]
impl BuilderBackend for FakeBackend {
    fn family(&self) -> BackendFamily {
        self.family
    }

    async fn create_item(&self, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::CreateItem, msg).await
    }
    async fn create_items(&self, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::CreateItems, msg).await
    }
    async fn get_item(&self, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::GetItem, msg).await
    }
    async fn list_items(&self, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::ListItems, msg).await
    }
    async fn update_item(&self, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::UpdateItem, msg).await
    }
    async fn update_items(&self, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::UpdateItems, msg).await
    }
    async fn delete_item(&self, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::DeleteItem, msg).await
    }
    async fn delete_items(&self, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::DeleteItems, msg).await
    }
    async fn append_many2many(&self, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::AppendManyToMany, msg).await
    }
    async fn delete_many2many(&self, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::DeleteManyToMany, msg).await
    }
    async fn aggregate(&self, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::Aggregate, msg).await
    }
    async fn update_row_order(&self, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::UpdateRowOrder, msg).await
    }
    async fn create_schema(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::CreateSchema(kind), msg).await
    }
    async fn get_schema(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::GetSchema(kind), msg).await
    }
    async fn list_schemas(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::ListSchemas(kind), msg).await
    }
    async fn update_schema(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::UpdateSchema(kind), msg).await
    }
    async fn delete_schema(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult {
        self.handle(Operation::DeleteSchema(kind), msg).await
    }

    async fn list_custom_events(
        &self,
        query: CustomEventQuery,
    ) -> Result<Vec<CustomEvent>, RpcStatus> {
        let events = self.events.lock().expect("lock").clone();
        Ok(events
            .into_iter()
            .filter(|event| event.table_slug == query.table_slug && event.method == query.method)
            .collect())
    }

    async fn write_version_history(&self, record: VersionHistoryRecord) -> Result<(), RpcStatus> {
        let delay = *self.history_delay.lock().expect("lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.history.lock().expect("lock").push(record);
        Ok(())
    }
}

pub struct FakeFunctions {
    pub calls: Mutex<Vec<(String, HookPayload)>>,
    pub failures: Mutex<HashMap<String, String>>,
    pub delays: Mutex<HashMap<String, Duration>>,
}

impl FakeFunctions {
    pub fn delay(&self, function_ref: &str, delay: Duration) {
        self.delays
            .lock()
            .expect("lock")
            .insert(function_ref.to_string(), delay);
    }

    pub fn fail(&self, function_ref: &str, message: &str) {
        self.failures
            .lock()
            .expect("lock")
            .insert(function_ref.to_string(), message.to_string());
    }

    pub fn invoked(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("lock")
            .iter()
            .map(|(function_ref, _)| function_ref.clone())
            .collect()
    }
}

#[async_trait]
impl FunctionRunner for FakeFunctions {
    async fn run(&self, function_ref: &str, payload: &HookPayload) -> Result<(), String> {
        self.calls
            .lock()
            .expect("lock")
            .push((function_ref.to_string(), payload.clone()));
        let delay = self.delays.lock().expect("lock").get(function_ref).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.failures.lock().expect("lock").get(function_ref) {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }
}

pub struct Harness {
    pub base_url: String,
    pub client: reqwest::Client,
    pub state: AppState,
    pub auth: Arc<FakeAuth>,
    pub registry: Arc<FakeRegistry>,
    pub backend_a: Arc<FakeBackend>,
    pub backend_b: Arc<FakeBackend>,
    pub functions: Arc<FakeFunctions>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(test_config(&[])).await
    }

    pub async fn start_with(config: GatewayConfig) -> Self {
        let auth = Arc::new(FakeAuth {
            calls: Mutex::new(Vec::new()),
        });
        let registry = Arc::new(FakeRegistry {
            calls: AtomicUsize::new(0),
        });
        let backend_a = FakeBackend::new(BackendFamily::A);
        let backend_b = FakeBackend::new(BackendFamily::B);
        let functions = Arc::new(FakeFunctions {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
        });

        let backends = ServicePool::new()
            .with_backend(BackendFamily::A, "default", backend_a.clone())
            .with_backend(BackendFamily::B, "default", backend_b.clone());

        let state = AppState::new(
            config,
            Services {
                auth: auth.clone(),
                registry: registry.clone(),
                backends,
                functions: functions.clone(),
            },
        );

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let router = app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });

        Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::new(),
            state,
            auth,
            registry,
            backend_a,
            backend_b,
            functions,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn authed(&self, method: reqwest::Method, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("authorization", format!("Bearer {}", token))
    }

    /// Waits for queued history writes to land.
    pub async fn drain_history(&self) {
        assert!(
            self.state
                .history()
                .pool()
                .wait_idle(Duration::from_secs(5))
                .await,
            "history pool did not drain"
        );
    }
}

pub fn event(
    id: &str,
    table_slug: &str,
    method: builder_contracts::HookMethod,
    action_type: builder_contracts::ActionType,
) -> CustomEvent {
    CustomEvent {
        id: id.to_string(),
        table_slug: table_slug.to_string(),
        method,
        action_type,
        role_id: String::new(),
        function_ref: format!("ref-{}", id),
        function_name: format!("fn-{}", id),
    }
}

pub fn data_map(msg: &CommonMessage) -> Map<String, Value> {
    structure::decode(&msg.data)
}

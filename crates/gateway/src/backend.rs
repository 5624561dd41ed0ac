//! Backend service contract shared by both storage families.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use builder_contracts::{
    BackendFamily, CommonMessage, CustomEvent, CustomEventQuery, RpcStatus, RpcStatusBody,
    VersionHistoryRecord,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Table,
    View,
    Menu,
}

impl SchemaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaKind::Table => "table",
            SchemaKind::View => "view",
            SchemaKind::Menu => "menu",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SchemaKind::Table => "TABLE",
            SchemaKind::View => "VIEW",
            SchemaKind::Menu => "MENU",
        }
    }
}

/// Logical operations a backend may serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateItem,
    CreateItems,
    GetItem,
    ListItems,
    UpdateItem,
    UpdateItems,
    DeleteItem,
    DeleteItems,
    AppendManyToMany,
    DeleteManyToMany,
    Aggregate,
    UpdateRowOrder,
    CreateSchema(SchemaKind),
    GetSchema(SchemaKind),
    ListSchemas(SchemaKind),
    UpdateSchema(SchemaKind),
    DeleteSchema(SchemaKind),
}

impl Operation {
    /// RPC method name, also used as a metrics label.
    pub fn rpc_name(self) -> String {
        match self {
            Operation::CreateItem => "items.create".to_string(),
            Operation::CreateItems => "items.create_many".to_string(),
            Operation::GetItem => "items.get".to_string(),
            Operation::ListItems => "items.list".to_string(),
            Operation::UpdateItem => "items.update".to_string(),
            Operation::UpdateItems => "items.update_many".to_string(),
            Operation::DeleteItem => "items.delete".to_string(),
            Operation::DeleteItems => "items.delete_many".to_string(),
            Operation::AppendManyToMany => "items.m2m_append".to_string(),
            Operation::DeleteManyToMany => "items.m2m_delete".to_string(),
            Operation::Aggregate => "items.aggregate".to_string(),
            Operation::UpdateRowOrder => "items.row_order".to_string(),
            Operation::CreateSchema(kind) => format!("{}.create", kind.as_str()),
            Operation::GetSchema(kind) => format!("{}.get", kind.as_str()),
            Operation::ListSchemas(kind) => format!("{}.list", kind.as_str()),
            Operation::UpdateSchema(kind) => format!("{}.update", kind.as_str()),
            Operation::DeleteSchema(kind) => format!("{}.delete", kind.as_str()),
        }
    }

    pub fn is_mutation(self) -> bool {
        !matches!(
            self,
            Operation::GetItem
                | Operation::ListItems
                | Operation::Aggregate
                | Operation::GetSchema(_)
                | Operation::ListSchemas(_)
        )
    }
}

/// Capability table of each family.
pub fn family_supports(family: BackendFamily, op: Operation) -> bool {
    match family {
        BackendFamily::A => true,
        BackendFamily::B => !matches!(
            op,
            Operation::CreateItems
                | Operation::AppendManyToMany
                | Operation::DeleteManyToMany
                | Operation::Aggregate
                | Operation::UpdateRowOrder
        ),
    }
}

pub type BackendResult = Result<CommonMessage, RpcStatus>;

fn unsupported(family: BackendFamily, op: Operation) -> RpcStatus {
    RpcStatus::new(
        builder_contracts::RpcCode::Unimplemented,
        format!("{} is not served by backend family {}", op.rpc_name(), family.as_str()),
    )
}

#[async_trait]
pub trait BuilderBackend: Send + Sync {
    fn family(&self) -> BackendFamily;

    fn supports(&self, op: Operation) -> bool {
        family_supports(self.family(), op)
    }

    async fn create_item(&self, msg: CommonMessage) -> BackendResult;
    async fn create_items(&self, _msg: CommonMessage) -> BackendResult {
        Err(unsupported(self.family(), Operation::CreateItems))
    }
    async fn get_item(&self, msg: CommonMessage) -> BackendResult;
    async fn list_items(&self, msg: CommonMessage) -> BackendResult;
    async fn update_item(&self, msg: CommonMessage) -> BackendResult;
    async fn update_items(&self, msg: CommonMessage) -> BackendResult;
    async fn delete_item(&self, msg: CommonMessage) -> BackendResult;
    async fn delete_items(&self, msg: CommonMessage) -> BackendResult;
    async fn append_many2many(&self, _msg: CommonMessage) -> BackendResult {
        Err(unsupported(self.family(), Operation::AppendManyToMany))
    }
    async fn delete_many2many(&self, _msg: CommonMessage) -> BackendResult {
        Err(unsupported(self.family(), Operation::DeleteManyToMany))
    }
    async fn aggregate(&self, _msg: CommonMessage) -> BackendResult {
        Err(unsupported(self.family(), Operation::Aggregate))
    }
    async fn update_row_order(&self, _msg: CommonMessage) -> BackendResult {
        Err(unsupported(self.family(), Operation::UpdateRowOrder))
    }

    async fn create_schema(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult;
    async fn get_schema(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult;
    async fn list_schemas(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult;
    async fn update_schema(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult;
    async fn delete_schema(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult;

    async fn list_custom_events(
        &self,
        query: CustomEventQuery,
    ) -> Result<Vec<CustomEvent>, RpcStatus>;

    async fn write_version_history(&self, record: VersionHistoryRecord) -> Result<(), RpcStatus>;
}

/// Routes a logical operation to the matching trait method.
pub async fn call(backend: &dyn BuilderBackend, op: Operation, msg: CommonMessage) -> BackendResult {
    let family = backend.family();
    let rpc_name = op.rpc_name();
    let started = Instant::now();

    let result = match op {
        Operation::CreateItem => backend.create_item(msg).await,
        Operation::CreateItems => backend.create_items(msg).await,
        Operation::GetItem => backend.get_item(msg).await,
        Operation::ListItems => backend.list_items(msg).await,
        Operation::UpdateItem => backend.update_item(msg).await,
        Operation::UpdateItems => backend.update_items(msg).await,
        Operation::DeleteItem => backend.delete_item(msg).await,
        Operation::DeleteItems => backend.delete_items(msg).await,
        Operation::AppendManyToMany => backend.append_many2many(msg).await,
        Operation::DeleteManyToMany => backend.delete_many2many(msg).await,
        Operation::Aggregate => backend.aggregate(msg).await,
        Operation::UpdateRowOrder => backend.update_row_order(msg).await,
        Operation::CreateSchema(kind) => backend.create_schema(kind, msg).await,
        Operation::GetSchema(kind) => backend.get_schema(kind, msg).await,
        Operation::ListSchemas(kind) => backend.list_schemas(kind, msg).await,
        Operation::UpdateSchema(kind) => backend.update_schema(kind, msg).await,
        Operation::DeleteSchema(kind) => backend.delete_schema(kind, msg).await,
    };

    let outcome = match &result {
        Ok(_) => "ok",
        Err(status) => status.code.as_str(),
    };
    crate::metrics::observe_backend_call(family.as_str(), &rpc_name, outcome);
    tracing::debug!(
        family = family.as_str(),
        operation = %rpc_name,
        outcome,
        latency_ms = started.elapsed().as_millis() as u64,
        "backend.call"
    );

    result
}

/// JSON-over-HTTP client for one backend node.
#[derive(Clone)]
pub struct HttpBackendClient {
    family: BackendFamily,
    base_url: String,
    http: reqwest::Client,
}

impl HttpBackendClient {
    pub fn new(
        family: BackendFamily,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            family,
            base_url: base_url.into(),
            http,
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/rpc/{}", self.base_url.trim_end_matches('/'), method)
    }

    async fn invoke<Req, Resp>(&self, method: &str, body: &Req) -> Result<Resp, RpcStatus>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let resp = self
            .http
            .post(self.url(method))
            .json(body)
            .send()
            .await
            .map_err(transport_status)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(match resp.json::<RpcStatusBody>().await {
                Ok(body) => RpcStatus::from(body),
                Err(_) => RpcStatus::new(
                    builder_contracts::RpcCode::Unknown,
                    format!("backend returned status {}", status),
                ),
            });
        }

        resp.json::<Resp>()
            .await
            .map_err(|err| RpcStatus::internal(format!("invalid backend response: {}", err)))
    }

    async fn message(&self, op: Operation, msg: CommonMessage) -> BackendResult {
        self.invoke(&op.rpc_name(), &msg).await
    }
}

fn transport_status(err: reqwest::Error) -> RpcStatus {
    if err.is_timeout() {
        RpcStatus::deadline_exceeded("backend request timed out")
    } else {
        RpcStatus::unavailable(format!("backend unreachable: {}", err))
    }
}

#[async_trait]
impl BuilderBackend for HttpBackendClient {
    fn family(&self) -> BackendFamily {
        self.family
    }

    async fn create_item(&self, msg: CommonMessage) -> BackendResult {
        self.message(Operation::CreateItem, msg).await
    }

    async fn create_items(&self, msg: CommonMessage) -> BackendResult {
        if !self.supports(Operation::CreateItems) {
            return Err(unsupported(self.family, Operation::CreateItems));
        }
        self.message(Operation::CreateItems, msg).await
    }

    async fn get_item(&self, msg: CommonMessage) -> BackendResult {
        self.message(Operation::GetItem, msg).await
    }

    async fn list_items(&self, msg: CommonMessage) -> BackendResult {
        self.message(Operation::ListItems, msg).await
    }

    async fn update_item(&self, msg: CommonMessage) -> BackendResult {
        self.message(Operation::UpdateItem, msg).await
    }

    async fn update_items(&self, msg: CommonMessage) -> BackendResult {
        self.message(Operation::UpdateItems, msg).await
    }

    async fn delete_item(&self, msg: CommonMessage) -> BackendResult {
        self.message(Operation::DeleteItem, msg).await
    }

    async fn delete_items(&self, msg: CommonMessage) -> BackendResult {
        self.message(Operation::DeleteItems, msg).await
    }

    async fn append_many2many(&self, msg: CommonMessage) -> BackendResult {
        if !self.supports(Operation::AppendManyToMany) {
            return Err(unsupported(self.family, Operation::AppendManyToMany));
        }
        self.message(Operation::AppendManyToMany, msg).await
    }

    async fn delete_many2many(&self, msg: CommonMessage) -> BackendResult {
        if !self.supports(Operation::DeleteManyToMany) {
            return Err(unsupported(self.family, Operation::DeleteManyToMany));
        }
        self.message(Operation::DeleteManyToMany, msg).await
    }

    async fn aggregate(&self, msg: CommonMessage) -> BackendResult {
        if !self.supports(Operation::Aggregate) {
            return Err(unsupported(self.family, Operation::Aggregate));
        }
        self.message(Operation::Aggregate, msg).await
    }

    async fn update_row_order(&self, msg: CommonMessage) -> BackendResult {
        if !self.supports(Operation::UpdateRowOrder) {
            return Err(unsupported(self.family, Operation::UpdateRowOrder));
        }
        self.message(Operation::UpdateRowOrder, msg).await
    }

    async fn create_schema(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult {
        self.message(Operation::CreateSchema(kind), msg).await
    }

    async fn get_schema(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult {
        self.message(Operation::GetSchema(kind), msg).await
    }

    async fn list_schemas(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult {
        self.message(Operation::ListSchemas(kind), msg).await
    }

    async fn update_schema(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult {
        self.message(Operation::UpdateSchema(kind), msg).await
    }

    async fn delete_schema(&self, kind: SchemaKind, msg: CommonMessage) -> BackendResult {
        self.message(Operation::DeleteSchema(kind), msg).await
    }

    async fn list_custom_events(
        &self,
        query: CustomEventQuery,
    ) -> Result<Vec<CustomEvent>, RpcStatus> {
        self.invoke("custom_events.list", &query).await
    }

    async fn write_version_history(&self, record: VersionHistoryRecord) -> Result<(), RpcStatus> {
        self.invoke::<_, serde_json::Value>("version_history.create", &record)
            .await
            .map(|_| ())
    }
}

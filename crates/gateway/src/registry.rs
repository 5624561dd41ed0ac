//! Tenant resolution: (project, environment) to backend descriptor, and
//! descriptor to concrete backend handles.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use builder_contracts::{BackendFamily, ResourceDescriptor, RpcStatus, RpcStatusBody};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::backend::{BuilderBackend, HttpBackendClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    Timeout,
    Http(String),
    Rpc(RpcStatus),
    InvalidResponse,
    UnknownNode {
        family: BackendFamily,
        node_type: String,
    },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Timeout => write!(f, "registry request timed out"),
            RegistryError::Http(err) => write!(f, "registry HTTP error: {}", err),
            RegistryError::Rpc(status) => write!(f, "{}", status.message),
            RegistryError::InvalidResponse => write!(f, "registry returned invalid JSON response"),
            RegistryError::UnknownNode { family, node_type } => write!(
                f,
                "no backend {} node configured for node type {:?}",
                family.as_str(),
                node_type
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<reqwest::Error> for RegistryError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            RegistryError::Timeout
        } else {
            RegistryError::Http(value.to_string())
        }
    }
}

#[async_trait]
pub trait BackendRegistry: Send + Sync {
    async fn resolve(&self, project_id: &str, env_id: &str) -> Result<ResourceDescriptor, RegistryError>;
}

#[derive(Serialize)]
struct ResolveRequest<'a> {
    project_id: &'a str,
    environment_id: &'a str,
}

#[derive(Clone)]
pub struct HttpRegistryClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpRegistryClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RegistryError::Http(err.to_string()))?;
        Ok(Self { base_url, http })
    }

    fn resolve_url(&self) -> String {
        format!("{}/v1/resources/resolve", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl BackendRegistry for HttpRegistryClient {
    async fn resolve(&self, project_id: &str, env_id: &str) -> Result<ResourceDescriptor, RegistryError> {
        let resp = self
            .http
            .post(self.resolve_url())
            .json(&ResolveRequest {
                project_id,
                environment_id: env_id,
            })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(match resp.json::<RpcStatusBody>().await {
                Ok(body) => RegistryError::Rpc(body.into()),
                Err(_) => RegistryError::Http(format!("registry returned status {}", status)),
            });
        }

        resp.json::<ResourceDescriptor>()
            .await
            .map_err(|_| RegistryError::InvalidResponse)
    }
}

/// Memoizes descriptors per `(project_id, env_id)` until their TTL lapses.
pub struct CachedRegistry<R> {
    inner: R,
    ttl: Duration,
    cache: RwLock<HashMap<(String, String), CachedDescriptor>>,
}

struct CachedDescriptor {
    descriptor: ResourceDescriptor,
    expires_at: Instant,
}

impl<R: BackendRegistry> CachedRegistry<R> {
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn get_cached(&self, key: &(String, String)) -> Option<ResourceDescriptor> {
        let now = Instant::now();
        let cache = self.cache.read().await;
        cache
            .get(key)
            .and_then(|entry| (entry.expires_at > now).then(|| entry.descriptor.clone()))
    }
}

#[async_trait]
impl<R: BackendRegistry> BackendRegistry for CachedRegistry<R> {
    async fn resolve(&self, project_id: &str, env_id: &str) -> Result<ResourceDescriptor, RegistryError> {
        if self.ttl.is_zero() {
            return self.inner.resolve(project_id, env_id).await;
        }

        let key = (project_id.to_string(), env_id.to_string());
        if let Some(descriptor) = self.get_cached(&key).await {
            return Ok(descriptor);
        }

        let descriptor = self.inner.resolve(project_id, env_id).await?;

        let now = Instant::now();
        let mut cache = self.cache.write().await;
        cache.retain(|_, entry| entry.expires_at > now);
        cache.insert(
            key,
            CachedDescriptor {
                descriptor: descriptor.clone(),
                expires_at: now + self.ttl,
            },
        );

        Ok(descriptor)
    }
}

/// Backend clients serving one node type.
#[derive(Clone, Default)]
pub struct BackendHandles {
    pub family_a: Option<Arc<dyn BuilderBackend>>,
    pub family_b: Option<Arc<dyn BuilderBackend>>,
}

impl BackendHandles {
    pub fn for_family(&self, family: BackendFamily) -> Option<Arc<dyn BuilderBackend>> {
        match family {
            BackendFamily::A => self.family_a.clone(),
            BackendFamily::B => self.family_b.clone(),
        }
    }
}

pub const DEFAULT_NODE: &str = "default";

/// Configured backend nodes of both families.
#[derive(Clone, Default)]
pub struct ServicePool {
    family_a: HashMap<String, Arc<dyn BuilderBackend>>,
    family_b: HashMap<String, Arc<dyn BuilderBackend>>,
}

impl ServicePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(
        a_nodes: &BTreeMap<String, String>,
        b_nodes: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let mut pool = Self::new();
        for (node, url) in a_nodes {
            let client = HttpBackendClient::new(BackendFamily::A, url.clone(), timeout)?;
            pool.insert(BackendFamily::A, node.clone(), Arc::new(client));
        }
        for (node, url) in b_nodes {
            let client = HttpBackendClient::new(BackendFamily::B, url.clone(), timeout)?;
            pool.insert(BackendFamily::B, node.clone(), Arc::new(client));
        }
        Ok(pool)
    }

    pub fn insert(&mut self, family: BackendFamily, node_type: String, backend: Arc<dyn BuilderBackend>) {
        match family {
            BackendFamily::A => self.family_a.insert(node_type, backend),
            BackendFamily::B => self.family_b.insert(node_type, backend),
        };
    }

    pub fn with_backend(
        mut self,
        family: BackendFamily,
        node_type: impl Into<String>,
        backend: Arc<dyn BuilderBackend>,
    ) -> Self {
        self.insert(family, node_type.into(), backend);
        self
    }

    /// Handles for `node_type`; an empty node type selects the default node.
    pub fn project_services(&self, project_id: &str, node_type: &str) -> Result<BackendHandles, RegistryError> {
        let node = if node_type.trim().is_empty() {
            DEFAULT_NODE
        } else {
            node_type
        };

        let handles = BackendHandles {
            family_a: self.family_a.get(node).cloned(),
            family_b: self.family_b.get(node).cloned(),
        };

        if handles.family_a.is_none() && handles.family_b.is_none() {
            tracing::warn!(project_id, node_type = node, "registry.unknown_node");
            return Err(RegistryError::UnknownNode {
                family: BackendFamily::A,
                node_type: node.to_string(),
            });
        }

        Ok(handles)
    }
}

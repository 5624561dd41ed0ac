use std::sync::Arc;

use builder_contracts::{BackendFamily, ResourceDescriptor};

use crate::backend::{BuilderBackend, Operation};
use crate::registry::{BackendRegistry, RegistryError, ServicePool};

pub const NOT_IMPLEMENTED_MESSAGE: &str = "does not implemented";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    Registry(RegistryError),
    NotImplemented {
        family: BackendFamily,
        operation: Operation,
    },
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Registry(err) => write!(f, "{}", err),
            DispatchError::NotImplemented { .. } => f.write_str(NOT_IMPLEMENTED_MESSAGE),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<RegistryError> for DispatchError {
    fn from(value: RegistryError) -> Self {
        DispatchError::Registry(value)
    }
}

/// Resolves tenants to descriptors and descriptors to backend clients.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<dyn BackendRegistry>,
    services: ServicePool,
}

impl Dispatcher {
    pub fn new(registry: Arc<dyn BackendRegistry>, services: ServicePool) -> Self {
        Self { registry, services }
    }

    pub async fn resolve(&self, project_id: &str, env_id: &str) -> Result<ResourceDescriptor, RegistryError> {
        self.registry.resolve(project_id, env_id).await
    }

    /// Backend of the descriptor's family, regardless of capability.
    pub fn backend_for(&self, descriptor: &ResourceDescriptor) -> Result<Arc<dyn BuilderBackend>, RegistryError> {
        let handles = self
            .services
            .project_services(&descriptor.project_id, &descriptor.node_type)?;

        handles
            .for_family(descriptor.backend_family)
            .ok_or_else(|| RegistryError::UnknownNode {
                family: descriptor.backend_family,
                node_type: descriptor.node_type.clone(),
            })
    }

    /// Backend able to serve `operation`, or `NotImplemented` when the
    /// descriptor's family lacks it.
    pub fn select(
        &self,
        descriptor: &ResourceDescriptor,
        operation: Operation,
    ) -> Result<Arc<dyn BuilderBackend>, DispatchError> {
        let backend = self.backend_for(descriptor)?;
        if !backend.supports(operation) {
            return Err(DispatchError::NotImplemented {
                family: descriptor.backend_family,
                operation,
            });
        }
        Ok(backend)
    }
}

//! Asynchronous version-history writer.

use std::sync::Arc;
use std::time::Duration;

use builder_contracts::{ResourceDescriptor, VersionHistoryRecord};
use serde_json::Value;

use crate::backend::BuilderBackend;
use crate::task_pool::TaskPool;

/// Result of the primary operation as recorded in history.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryOutcome {
    Success { response: Value, previous: Value },
    Failure(String),
}

/// Builds the audit record of one mutating request.
pub fn build_record(
    descriptor: &ResourceDescriptor,
    action_source: &str,
    action_type: &str,
    user_id: &str,
    table_slug: &str,
    request: Value,
    outcome: HistoryOutcome,
) -> VersionHistoryRecord {
    let (response, previous, current) = match outcome {
        HistoryOutcome::Success { response, previous } => {
            let current = response.clone();
            (response, previous, current)
        }
        HistoryOutcome::Failure(message) => (Value::String(message), Value::Null, Value::Null),
    };

    VersionHistoryRecord {
        services: vec![descriptor.backend_family.service_name().to_string()],
        node_type: descriptor.node_type.clone(),
        project_id: descriptor.resource_env_id.clone(),
        action_source: action_source.to_string(),
        action_type: action_type.to_string(),
        user_info: user_id.to_string(),
        table_slug: table_slug.to_string(),
        request,
        response,
        previous,
        current,
    }
}

#[derive(Clone)]
pub struct HistoryWriter {
    pool: TaskPool,
    timeout: Duration,
}

impl HistoryWriter {
    pub fn new(pool: TaskPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }

    /// Queues `record` for `backend`; failures are logged, never returned.
    pub fn submit(&self, backend: Arc<dyn BuilderBackend>, record: VersionHistoryRecord, request_id: String) {
        let timeout = self.timeout;
        self.pool.spawn(async move {
            let family = backend.family().as_str();
            let action_type = record.action_type.clone();
            let table_slug = record.table_slug.clone();

            let outcome = match tokio::time::timeout(timeout, backend.write_version_history(record)).await {
                Ok(Ok(())) => "ok",
                Ok(Err(status)) => {
                    tracing::warn!(
                        request_id = %request_id,
                        family,
                        action_type = %action_type,
                        table_slug = %table_slug,
                        error = %status,
                        "history.write_failed"
                    );
                    "error"
                }
                Err(_) => {
                    tracing::warn!(
                        request_id = %request_id,
                        family,
                        action_type = %action_type,
                        table_slug = %table_slug,
                        "history.write_timeout"
                    );
                    "timeout"
                }
            };

            crate::metrics::observe_history_write(family, outcome);
        });
    }
}

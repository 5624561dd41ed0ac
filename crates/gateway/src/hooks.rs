//! Custom-event hook engine.
//!
//! Hooks are fetched from the tenant's backend per `(table, method, role)`
//! and executed strictly in the order the backend returned them. The first
//! failing function stops the chain.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use builder_contracts::{
    ActionType, CustomEvent, CustomEventQuery, HookMethod, ResourceDescriptor, RpcStatus,
};
use serde::{Deserialize, Serialize};

use crate::backend::BuilderBackend;

/// A hook function that returned an error, named by its display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure {
    pub function_name: String,
    pub message: String,
}

impl std::fmt::Display for HookFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} in {}", self.message, self.function_name)
    }
}

impl std::error::Error for HookFailure {}

/// Body posted to every hook function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookPayload {
    pub ids: Vec<String>,
    pub table_slug: String,
    pub object_data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_data_before_update: Option<serde_json::Value>,
    pub method: HookMethod,
    pub action_type: ActionType,
    pub user_id: String,
    pub resource: ResourceDescriptor,
    pub request_id: String,
}

#[async_trait]
pub trait FunctionRunner: Send + Sync {
    /// Runs one function; `Err` carries the function's error text.
    async fn run(&self, function_ref: &str, payload: &HookPayload) -> Result<(), String>;
}

#[derive(Deserialize)]
struct FunctionResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: Option<FunctionResponseData>,
}

#[derive(Deserialize)]
struct FunctionResponseData {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct HttpFunctionRunner {
    base_url: String,
    http: reqwest::Client,
}

impl HttpFunctionRunner {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, http })
    }

    fn function_url(&self, function_ref: &str) -> String {
        format!(
            "{}/function/{}",
            self.base_url.trim_end_matches('/'),
            function_ref
        )
    }
}

#[async_trait]
impl FunctionRunner for HttpFunctionRunner {
    async fn run(&self, function_ref: &str, payload: &HookPayload) -> Result<(), String> {
        let resp = self
            .http
            .post(self.function_url(function_ref))
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    "function timed out".to_string()
                } else {
                    format!("function unreachable: {}", err)
                }
            })?;

        let status = resp.status();
        let body = resp.json::<FunctionResponse>().await.ok();

        let error_message = body
            .as_ref()
            .and_then(|body| body.data.as_ref())
            .and_then(|data| data.message.clone());

        if !status.is_success() {
            return Err(error_message.unwrap_or_else(|| status.to_string()));
        }

        match body {
            Some(body) if body.status.eq_ignore_ascii_case("error") => {
                Err(error_message.unwrap_or_else(|| "function returned an error".to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Ordered hooks for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookPlan {
    pub before: Vec<CustomEvent>,
    pub after: Vec<CustomEvent>,
}

/// Request values shared by every function call of one pipeline run.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub ids: Vec<String>,
    pub table_slug: String,
    pub method: HookMethod,
    pub user_id: String,
    pub resource: ResourceDescriptor,
    pub request_id: String,
}

#[derive(Clone)]
pub struct HookEngine {
    runner: Arc<dyn FunctionRunner>,
    timeout: Duration,
}

impl HookEngine {
    pub fn new(runner: Arc<dyn FunctionRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Fetches the hooks bound to `(table_slug, method)` that apply to `role_id`.
    ///
    /// `from_ofs` marks calls made by hook functions themselves; those never
    /// look up or run hooks.
    pub async fn list(
        &self,
        backend: &dyn BuilderBackend,
        table_slug: &str,
        method: HookMethod,
        resource: &ResourceDescriptor,
        role_id: &str,
        from_ofs: bool,
    ) -> Result<HookPlan, RpcStatus> {
        if from_ofs {
            return Ok(HookPlan::default());
        }

        let events = backend
            .list_custom_events(CustomEventQuery {
                table_slug: table_slug.to_string(),
                method,
                role_id: role_id.to_string(),
                resource_env_id: resource.resource_env_id.clone(),
            })
            .await?;

        let mut plan = HookPlan::default();
        for event in events {
            if event.table_slug != table_slug
                || event.method != method
                || !event.applies_to_role(role_id)
            {
                continue;
            }
            match event.action_type {
                ActionType::Before => plan.before.push(event),
                ActionType::After => plan.after.push(event),
            }
        }

        Ok(plan)
    }

    /// Runs `events` in order, stopping at the first failure.
    pub async fn invoke(
        &self,
        events: &[CustomEvent],
        ctx: &HookContext,
        object_data: &serde_json::Value,
        action_type: ActionType,
        object_data_before_update: Option<&serde_json::Value>,
    ) -> Result<(), HookFailure> {
        if events.is_empty() {
            return Ok(());
        }

        let payload = HookPayload {
            ids: ctx.ids.clone(),
            table_slug: ctx.table_slug.clone(),
            object_data: object_data.clone(),
            object_data_before_update: match (action_type, ctx.method) {
                (ActionType::After, HookMethod::Update) => {
                    object_data_before_update.cloned()
                }
                _ => None,
            },
            method: ctx.method,
            action_type,
            user_id: ctx.user_id.clone(),
            resource: ctx.resource.clone(),
            request_id: ctx.request_id.clone(),
        };

        for event in events {
            let outcome =
                match tokio::time::timeout(self.timeout, self.runner.run(&event.function_ref, &payload))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err("function timed out".to_string()),
                };

            if let Err(message) = outcome {
                crate::metrics::observe_hook_invocation(action_type.as_str(), "error");
                tracing::info!(
                    request_id = %ctx.request_id,
                    table_slug = %ctx.table_slug,
                    method = ctx.method.as_str(),
                    action_type = action_type.as_str(),
                    function = event.display_name(),
                    "hooks.function_failed"
                );
                return Err(HookFailure {
                    function_name: event.display_name().to_string(),
                    message,
                });
            }

            crate::metrics::observe_hook_invocation(action_type.as_str(), "ok");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use builder_contracts::BackendFamily;
    use std::sync::Mutex;

    struct RecordingRunner {
        calls: Mutex<Vec<(String, HookPayload)>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl FunctionRunner for RecordingRunner {
        async fn run(&self, function_ref: &str, payload: &HookPayload) -> Result<(), String> {
            self.calls
                .lock()
                .expect("lock")
                .push((function_ref.to_string(), payload.clone()));
            if self.fail_on.as_deref() == Some(function_ref) {
                return Err("boom".to_string());
            }
            Ok(())
        }
    }

    fn event(id: &str, action_type: ActionType) -> CustomEvent {
        CustomEvent {
            id: id.to_string(),
            table_slug: "orders".to_string(),
            method: HookMethod::Update,
            action_type,
            role_id: String::new(),
            function_ref: format!("ref-{}", id),
            function_name: format!("fn-{}", id),
        }
    }

    fn ctx() -> HookContext {
        HookContext {
            ids: vec!["9a8c7c4e-3c53-4b5e-9f5e-0d9c2f1f7b11".to_string()],
            table_slug: "orders".to_string(),
            method: HookMethod::Update,
            user_id: "user-1".to_string(),
            resource: ResourceDescriptor {
                backend_family: BackendFamily::A,
                node_type: "default".to_string(),
                resource_env_id: "res-1".to_string(),
                project_id: "p".to_string(),
                env_id: "e".to_string(),
            },
            request_id: "req-1".to_string(),
        }
    }

    #[tokio::test]
    async fn stops_at_first_failure_in_order() {
        let runner = Arc::new(RecordingRunner {
            calls: Mutex::new(Vec::new()),
            fail_on: Some("ref-2".to_string()),
        });
        let engine = HookEngine::new(runner.clone(), Duration::from_secs(1));
        let events = vec![
            event("1", ActionType::Before),
            event("2", ActionType::Before),
            event("3", ActionType::Before),
        ];

        let err = engine
            .invoke(&events, &ctx(), &serde_json::json!({}), ActionType::Before, None)
            .await
            .expect_err("second hook fails");

        assert_eq!(err.function_name, "fn-2");
        assert_eq!(err.to_string(), "boom in fn-2");
        let calls = runner.calls.lock().expect("lock");
        let refs = calls.iter().map(|(r, _)| r.as_str()).collect::<Vec<_>>();
        assert_eq!(refs, vec!["ref-1", "ref-2"]);
    }

    #[tokio::test]
    async fn pre_image_only_reaches_update_after_hooks() {
        let runner = Arc::new(RecordingRunner {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
        });
        let engine = HookEngine::new(runner.clone(), Duration::from_secs(1));
        let before_image = serde_json::json!({"status": "old"});

        engine
            .invoke(
                &[event("1", ActionType::Before)],
                &ctx(),
                &serde_json::json!({"status": "new"}),
                ActionType::Before,
                Some(&before_image),
            )
            .await
            .expect("before hooks");
        engine
            .invoke(
                &[event("2", ActionType::After)],
                &ctx(),
                &serde_json::json!({"status": "new"}),
                ActionType::After,
                Some(&before_image),
            )
            .await
            .expect("after hooks");

        let calls = runner.calls.lock().expect("lock");
        assert_eq!(calls[0].1.object_data_before_update, None);
        assert_eq!(calls[1].1.object_data_before_update, Some(before_image));
    }

    #[tokio::test]
    async fn bulk_update_after_hooks_get_no_pre_image() {
        let runner = Arc::new(RecordingRunner {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
        });
        let engine = HookEngine::new(runner.clone(), Duration::from_secs(1));
        let bulk = HookContext {
            method: HookMethod::MultipleUpdate,
            ..ctx()
        };

        engine
            .invoke(
                &[event("1", ActionType::After)],
                &bulk,
                &serde_json::json!({"objects": []}),
                ActionType::After,
                Some(&serde_json::json!({"status": "old"})),
            )
            .await
            .expect("after hooks");

        let calls = runner.calls.lock().expect("lock");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.method, HookMethod::MultipleUpdate);
        assert_eq!(calls[0].1.object_data_before_update, None);
    }

    struct SlowRunner;

    #[async_trait]
    impl FunctionRunner for SlowRunner {
        async fn run(&self, _function_ref: &str, _payload: &HookPayload) -> Result<(), String> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_functions_fail_with_timeout() {
        let engine = HookEngine::new(Arc::new(SlowRunner), Duration::from_millis(10));
        let err = engine
            .invoke(
                &[event("1", ActionType::Before)],
                &ctx(),
                &serde_json::json!({}),
                ActionType::Before,
                None,
            )
            .await
            .expect_err("timeout");
        assert_eq!(err.to_string(), "function timed out in fn-1");
    }
}

//! Single exit point of every handler: exactly one HTTP response, with its
//! log fields and metrics.

use std::time::Instant;

use axum::Json;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use super::REQUEST_ID_HEADER;
use crate::error::GatewayError;
use crate::status_map::{self, StatusBinding};

#[derive(Debug, Serialize)]
pub(super) struct ResponseBody {
    pub(super) status: String,
    pub(super) description: String,
    pub(super) data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) custom_message: Option<String>,
}

/// Outcome of one pipeline run, consumed by [`finalize`].
pub(super) struct PipelineResult {
    pub(super) outcome: Result<Value, GatewayError>,
}

impl PipelineResult {
    pub(super) fn ok(data: Value) -> Self {
        Self {
            outcome: Ok(data),
        }
    }

    pub(super) fn fail(err: impl Into<GatewayError>) -> Self {
        Self {
            outcome: Err(err.into()),
        }
    }
}

/// Per-request values `finalize` needs for headers, logs and metrics.
pub(super) struct Exit<'a> {
    pub(super) route: &'static str,
    pub(super) method: &'a str,
    pub(super) request_id: &'a str,
    pub(super) success: &'static str,
    pub(super) started: Instant,
}

pub(super) fn finalize(exit: Exit<'_>, result: PipelineResult) -> Response {
    let span = tracing::Span::current();
    let resp = match result.outcome {
        Ok(data) => {
            span.record("stage", "RESPONDED");
            span.record("outcome", "ok");
            respond(status_map::lookup(exit.success), data, exit.request_id)
        }
        Err(err) => {
            span.record("stage", "FAILED");
            span.record("outcome", err.kind());
            tracing::info!(
                request_id = %exit.request_id,
                route = exit.route,
                error_kind = err.kind(),
                error = %err,
                "pipeline.failed"
            );
            error_response(&err, exit.request_id)
        }
    };

    let latency = exit.started.elapsed();
    span.record("latency_ms", latency.as_millis() as u64);
    crate::metrics::observe_http_request(exit.route, exit.method, resp.status().as_u16(), latency);

    resp
}

pub(super) fn error_response(err: &GatewayError, request_id: &str) -> Response {
    respond(err.binding(), Value::String(err.data_text()), request_id)
}

fn respond(binding: StatusBinding, data: Value, request_id: &str) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }

    if binding.status == StatusCode::NO_CONTENT {
        return (binding.status, headers).into_response();
    }

    let body = ResponseBody {
        status: binding.status_label(),
        description: binding.description.to_string(),
        data,
        custom_message: binding.custom_message,
    };
    (binding.status, headers, Json(body)).into_response()
}

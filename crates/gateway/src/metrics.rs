use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
static BACKEND_CALLS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static HOOK_INVOCATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static CACHE_LOOKUPS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static HISTORY_WRITES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static BACKGROUND_QUEUE_DEPTH: OnceLock<IntGauge> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

fn register_collector<T>(collector: T) -> T
where
    T: prometheus::core::Collector + Clone + 'static,
{
    let _ = registry().register(Box::new(collector.clone()));
    collector
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    register_collector(
        IntCounterVec::new(Opts::new(name, help), labels)
            .unwrap_or_else(|err| panic!("create {}: {}", name, err)),
    )
}

fn http_requests_total() -> &'static IntCounterVec {
    HTTP_REQUESTS_TOTAL.get_or_init(|| {
        counter_vec(
            "builder_gateway_http_requests_total",
            "Gateway HTTP request count.",
            &["route", "method", "status"],
        )
    })
}

fn http_request_duration_seconds() -> &'static HistogramVec {
    HTTP_REQUEST_DURATION_SECONDS.get_or_init(|| {
        register_collector(
            HistogramVec::new(
                HistogramOpts::new(
                    "builder_gateway_http_request_duration_seconds",
                    "Gateway HTTP request duration in seconds.",
                )
                .buckets(vec![
                    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0,
                ]),
                &["route", "method", "outcome"],
            )
            .expect("create builder_gateway_http_request_duration_seconds"),
        )
    })
}

fn backend_calls_total() -> &'static IntCounterVec {
    BACKEND_CALLS_TOTAL.get_or_init(|| {
        counter_vec(
            "builder_gateway_backend_calls_total",
            "Backend RPC calls by family, operation and outcome.",
            &["family", "operation", "outcome"],
        )
    })
}

fn hook_invocations_total() -> &'static IntCounterVec {
    HOOK_INVOCATIONS_TOTAL.get_or_init(|| {
        counter_vec(
            "builder_gateway_hook_invocations_total",
            "Custom event function invocations.",
            &["action_type", "outcome"],
        )
    })
}

fn cache_lookups_total() -> &'static IntCounterVec {
    CACHE_LOOKUPS_TOTAL.get_or_init(|| {
        counter_vec(
            "builder_gateway_cache_lookups_total",
            "Read-through cache lookups.",
            &["kind", "outcome"],
        )
    })
}

fn history_writes_total() -> &'static IntCounterVec {
    HISTORY_WRITES_TOTAL.get_or_init(|| {
        counter_vec(
            "builder_gateway_history_writes_total",
            "Version history writes by backend family.",
            &["family", "outcome"],
        )
    })
}

fn background_queue_depth() -> &'static IntGauge {
    BACKGROUND_QUEUE_DEPTH.get_or_init(|| {
        register_collector(
            IntGauge::new(
                "builder_gateway_background_queue_depth",
                "Background tasks waiting for a worker slot.",
            )
            .expect("create builder_gateway_background_queue_depth"),
        )
    })
}

pub fn observe_http_request(route: &str, method: &str, status: u16, duration: Duration) {
    let status_str = status.to_string();
    http_requests_total()
        .with_label_values(&[route, method, status_str.as_str()])
        .inc();

    let outcome = if (200..400).contains(&status) {
        "success"
    } else {
        "error"
    };
    http_request_duration_seconds()
        .with_label_values(&[route, method, outcome])
        .observe(duration.as_secs_f64());
}

pub fn observe_backend_call(family: &str, operation: &str, outcome: &str) {
    backend_calls_total()
        .with_label_values(&[family, operation, outcome])
        .inc();
}

pub fn observe_hook_invocation(action_type: &str, outcome: &str) {
    hook_invocations_total()
        .with_label_values(&[action_type, outcome])
        .inc();
}

pub fn observe_cache_lookup(kind: &str, outcome: &str) {
    cache_lookups_total()
        .with_label_values(&[kind, outcome])
        .inc();
}

pub fn observe_history_write(family: &str, outcome: &str) {
    history_writes_total()
        .with_label_values(&[family, outcome])
        .inc();
}

pub fn set_background_queue_depth(depth: usize) {
    background_queue_depth().set(depth as i64);
}

pub fn render() -> Result<(Vec<u8>, String), prometheus::Error> {
    let _ = background_queue_depth();

    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((buffer, encoder.format_type().to_string()))
}

//! Request-lifecycle pipeline shared by every item and schema handler.
//!
//! Mutations: decode, authorize, validate tenant, tag payload, resolve
//! descriptor, capability check, hooks before, primary, one history
//! record handed to the background pool, hooks after. Reads skip hooks
//! and history and may be answered from the read cache.

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, OriginalUri, Query};
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use builder_contracts::{
    ActionType, CommonMessage, HookMethod, ResourceDescriptor, RpcStatus, Struct, structure,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::Instrument;
use uuid::Uuid;

use super::auth_gate::{RequestScope, get_auth};
use super::finalize::{Exit, PipelineResult, finalize};
use super::{AppState, extract_request_id};
use crate::backend::{self, BuilderBackend, Operation};
use crate::cache::{CacheError, CacheKey, ReadKind};
use crate::error::GatewayError;
use crate::history::{HistoryOutcome, build_record};
use crate::hooks::{HookContext, HookPlan};

#[derive(Debug, Clone, Copy)]
enum Stage {
    Decoded,
    Authorized,
    Tagged,
    Resolved,
    BeforeOk,
    PrimaryOk,
    AfterOk,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Decoded => "DECODED",
            Stage::Authorized => "AUTHORIZED",
            Stage::Tagged => "TAGGED",
            Stage::Resolved => "RESOLVED",
            Stage::BeforeOk => "BEFORE_OK",
            Stage::PrimaryOk => "PRIMARY_OK",
            Stage::AfterOk => "AFTER_OK",
        }
    }
}

fn enter(stage: Stage) {
    tracing::Span::current().record("stage", stage.as_str());
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct CommonQuery {
    #[serde(default, rename = "from-ofs")]
    from_ofs: Option<String>,
    #[serde(default)]
    block_builder: Option<String>,
    #[serde(default)]
    language_setting: Option<String>,
}

impl CommonQuery {
    fn from_ofs(&self) -> bool {
        self.from_ofs.as_deref() == Some("true")
    }

    fn blocked_builder(&self) -> bool {
        self.block_builder.as_deref() == Some("true")
    }
}

fn decode_query(
    query: Result<Query<CommonQuery>, QueryRejection>,
) -> Result<CommonQuery, GatewayError> {
    query
        .map(|Query(query)| query)
        .map_err(|rejection| GatewayError::Decode(rejection.body_text()))
}

#[derive(Debug, Deserialize)]
pub(super) struct RawBody {
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

/// Request data after binding the JSON body.
#[derive(Debug, Clone, Default)]
pub(super) struct RequestBody {
    data: Map<String, Value>,
    is_cached: bool,
}

/// Binds `{ "data": {...}, ... }`. Other top-level fields (bulk `ids` and
/// `objects`, relation endpoints) are folded into `data` without
/// overwriting it.
pub(super) fn decode_body(
    body: Result<Json<RawBody>, JsonRejection>,
) -> Result<RequestBody, GatewayError> {
    let Json(raw) = body.map_err(|rejection| GatewayError::Decode(rejection.body_text()))?;
    let mut data = raw.data.unwrap_or_default();
    let mut is_cached = false;

    for (key, value) in raw.rest {
        if key == "is_cached" {
            is_cached = value.as_bool().unwrap_or(false);
            continue;
        }
        data.entry(key).or_insert(value);
    }

    Ok(RequestBody { data, is_cached })
}

pub(super) fn empty_body() -> Result<RequestBody, GatewayError> {
    Ok(RequestBody::default())
}

/// Everything a handler extracted from the HTTP request.
pub(super) struct Inbound {
    pub(super) scope: Option<RequestScope>,
    pub(super) query: Result<CommonQuery, GatewayError>,
    pub(super) body: Result<RequestBody, GatewayError>,
    pub(super) request_id: String,
    pub(super) method: String,
    pub(super) path: String,
}

pub(super) fn inbound(
    scope: Option<Extension<RequestScope>>,
    query: Result<Query<CommonQuery>, QueryRejection>,
    headers: &HeaderMap,
    method: &Method,
    uri: &OriginalUri,
    body: Result<RequestBody, GatewayError>,
) -> Inbound {
    Inbound {
        scope: scope.map(|Extension(scope)| scope),
        query: decode_query(query),
        body,
        request_id: extract_request_id(headers),
        method: method.as_str().to_string(),
        path: uri.0.path().to_string(),
    }
}

/// Where the ids of the affected objects come from.
#[derive(Debug, Clone)]
pub(super) enum IdPolicy {
    /// Keep a valid client id, otherwise generate one.
    Generate,
    /// Body id wins over the path id; one of them must be a valid UUID.
    FromBodyOrPath(Option<String>),
    /// `ids` array plus the ids of `objects`.
    Bulk { generate: bool },
    /// `id_from` must be a UUID; `id_to` may be one id or a list.
    Relation,
    Unchecked,
}

pub(super) struct Mutation {
    pub(super) route: &'static str,
    pub(super) operation: Operation,
    pub(super) hook_method: Option<HookMethod>,
    pub(super) action_type: String,
    pub(super) table_slug: String,
    pub(super) id_field: &'static str,
    pub(super) ids: IdPolicy,
    pub(super) success: &'static str,
}

pub(super) struct Read {
    pub(super) route: &'static str,
    pub(super) operation: Operation,
    pub(super) table_slug: String,
    pub(super) id_field: &'static str,
    pub(super) ids: IdPolicy,
    pub(super) cache: Option<ReadKind>,
}

pub(super) async fn run_mutation(state: AppState, inbound: Inbound, mutation: Mutation) -> Response {
    let started = Instant::now();
    let span = tracing::info_span!(
        "pipeline.mutation",
        operation = mutation.route,
        request_id = %inbound.request_id,
        table_slug = %mutation.table_slug,
        project_id = tracing::field::Empty,
        stage = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    async {
        let result = mutate(&state, &inbound, &mutation).await;
        finalize(
            Exit {
                route: mutation.route,
                method: &inbound.method,
                request_id: &inbound.request_id,
                success: mutation.success,
                started,
            },
            result,
        )
    }
    .instrument(span)
    .await
}

pub(super) async fn run_read(state: AppState, inbound: Inbound, read: Read) -> Response {
    let started = Instant::now();
    let span = tracing::info_span!(
        "pipeline.read",
        operation = read.route,
        request_id = %inbound.request_id,
        table_slug = %read.table_slug,
        project_id = tracing::field::Empty,
        stage = tracing::field::Empty,
        cache = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    async {
        let result = read_through(&state, &inbound, &read).await;
        finalize(
            Exit {
                route: read.route,
                method: &inbound.method,
                request_id: &inbound.request_id,
                success: crate::status_map::OK,
                started,
            },
            result,
        )
    }
    .instrument(span)
    .await
}

/// Steps shared by reads and mutations up to the chosen backend.
struct Prepared<'a> {
    query: &'a CommonQuery,
    body: &'a RequestBody,
    scope: &'a RequestScope,
    role_id: String,
    user_id: String,
    data: Map<String, Value>,
    encoded: Struct,
    ids: Vec<String>,
}

fn prepare<'a>(
    inbound: &'a Inbound,
    id_field: &str,
    ids: &IdPolicy,
) -> Result<Prepared<'a>, GatewayError> {
    let query = inbound.query.as_ref().map_err(Clone::clone)?;
    let body = inbound.body.as_ref().map_err(Clone::clone)?;
    enter(Stage::Decoded);

    let (scope, auth) = get_auth(inbound.scope.as_ref())?;
    enter(Stage::Authorized);

    validate_tenant(scope)?;
    tracing::Span::current().record("project_id", scope.project_id.as_str());

    let mut data = body.data.clone();
    let ids = tag_payload(&mut data, scope, query, id_field, ids)?;
    let encoded =
        structure::encode_map(&data).map_err(|err| GatewayError::Decode(err.to_string()))?;
    enter(Stage::Tagged);

    let user_id = scope
        .user_id
        .clone()
        .unwrap_or_else(|| auth.user_id.clone());

    Ok(Prepared {
        query,
        body,
        scope,
        role_id: auth.role_id.clone(),
        user_id,
        data,
        encoded,
        ids,
    })
}

async fn mutate(state: &AppState, inbound: &Inbound, m: &Mutation) -> PipelineResult {
    let prepared = match prepare(inbound, m.id_field, &m.ids) {
        Ok(prepared) => prepared,
        Err(err) => return PipelineResult::fail(err),
    };
    let Prepared {
        query,
        scope,
        role_id,
        user_id,
        mut data,
        encoded,
        ids,
        ..
    } = prepared;

    let descriptor = match state
        .dispatcher
        .resolve(&scope.project_id, &scope.environment_id)
        .await
    {
        Ok(descriptor) => descriptor,
        Err(err) => return PipelineResult::fail(err),
    };
    enter(Stage::Resolved);

    let backend = match state.dispatcher.select(&descriptor, m.operation) {
        Ok(backend) => backend,
        Err(err) => return PipelineResult::fail(err),
    };

    let hook_ctx = m.hook_method.map(|method| HookContext {
        ids: ids.clone(),
        table_slug: m.table_slug.clone(),
        method,
        user_id: user_id.clone(),
        resource: descriptor.clone(),
        request_id: inbound.request_id.clone(),
    });

    let plan = match &hook_ctx {
        Some(ctx) => match state
            .hooks
            .list(
                backend.as_ref(),
                &m.table_slug,
                ctx.method,
                &descriptor,
                &role_id,
                query.from_ofs(),
            )
            .await
        {
            Ok(plan) => plan,
            Err(status) => return PipelineResult::fail(status),
        },
        None => HookPlan::default(),
    };

    if let Some(ctx) = &hook_ctx
        && let Err(failure) = state
            .hooks
            .invoke(&plan.before, ctx, &Value::Object(data.clone()), ActionType::Before, None)
            .await
    {
        return PipelineResult::fail(failure);
    }
    enter(Stage::BeforeOk);

    let blocked_builder = query.blocked_builder();
    let outbound = |data: Struct| outbound_message(&m.table_slug, &descriptor, data, blocked_builder, false);

    let previous = if m.operation == Operation::UpdateItem {
        snapshot_pre_image(backend.as_ref(), outbound(encoded.clone()), &inbound.request_id).await
    } else {
        Value::Null
    };

    let request_value = Value::Object(data.clone());
    let primary = match tokio::time::timeout(
        state.config.primary_timeout(),
        backend::call(backend.as_ref(), m.operation, outbound(encoded)),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(RpcStatus::deadline_exceeded("primary operation timed out")),
    };

    // The record is owed once the primary settles, whatever follows.
    let record_history = |outcome: HistoryOutcome| {
        let record = build_record(
            &descriptor,
            &inbound.path,
            &m.action_type,
            &user_id,
            &m.table_slug,
            request_value.clone(),
            outcome,
        );
        state
            .history
            .submit(Arc::clone(&backend), record, inbound.request_id.clone());
    };

    let response = match primary {
        Ok(response) => response,
        Err(status) => {
            record_history(HistoryOutcome::Failure(status.message.clone()));
            return PipelineResult::fail(status);
        }
    };
    enter(Stage::PrimaryOk);

    let response_data = structure::decode(&response.data);
    for (key, value) in &response_data {
        data.insert(key.clone(), value.clone());
    }
    let response_value = Value::Object(response_data);

    record_history(HistoryOutcome::Success {
        response: response_value.clone(),
        previous: previous.clone(),
    });

    if let Some(ctx) = &hook_ctx
        && let Err(failure) = state
            .hooks
            .invoke(
                &plan.after,
                ctx,
                &Value::Object(data),
                ActionType::After,
                Some(&previous),
            )
            .await
    {
        return PipelineResult::fail(failure);
    }
    enter(Stage::AfterOk);

    PipelineResult::ok(response_value)
}

async fn snapshot_pre_image(
    backend: &dyn BuilderBackend,
    msg: CommonMessage,
    request_id: &str,
) -> Value {
    match backend::call(backend, Operation::GetItem, msg).await {
        Ok(resp) => Value::Object(structure::decode(&resp.data)),
        Err(status) => {
            tracing::warn!(request_id, error = %status, "pipeline.pre_image_unavailable");
            Value::Null
        }
    }
}

async fn read_through(state: &AppState, inbound: &Inbound, r: &Read) -> PipelineResult {
    let prepared = match prepare(inbound, r.id_field, &r.ids) {
        Ok(prepared) => prepared,
        Err(err) => return PipelineResult::fail(err),
    };

    let descriptor = match state
        .dispatcher
        .resolve(&prepared.scope.project_id, &prepared.scope.environment_id)
        .await
    {
        Ok(descriptor) => descriptor,
        Err(err) => return PipelineResult::fail(err),
    };
    enter(Stage::Resolved);

    let backend = match state.dispatcher.select(&descriptor, r.operation) {
        Ok(backend) => backend,
        Err(err) => return PipelineResult::fail(err),
    };

    let client_cached = prepared.body.is_cached;
    let cache_key = r.cache.map(|kind| {
        (
            kind,
            CacheKey::fingerprint(&r.table_slug, &prepared.data, &descriptor.resource_env_id),
        )
    });

    if let Some((kind, key)) = &cache_key {
        if let Some(data) = cached_payload(state, *kind, key, client_cached).await {
            tracing::Span::current().record("cache", "hit");
            return PipelineResult::ok(data);
        }
        tracing::Span::current().record("cache", "miss");
    }

    let msg = outbound_message(
        &r.table_slug,
        &descriptor,
        prepared.encoded,
        prepared.query.blocked_builder(),
        client_cached,
    );
    let response = match tokio::time::timeout(
        state.config.primary_timeout(),
        backend::call(backend.as_ref(), r.operation, msg),
    )
    .await
    {
        Ok(Ok(response)) => response,
        Ok(Err(status)) => return PipelineResult::fail(status),
        Err(_) => {
            return PipelineResult::fail(RpcStatus::deadline_exceeded("read operation timed out"));
        }
    };
    enter(Stage::PrimaryOk);

    let value = Value::Object(structure::decode(&response.data));

    if let Some((kind, key)) = cache_key
        && (client_cached || response.is_cached)
        && let Err(err) = state
            .cache
            .store_json(key, kind, &value, response.is_cached)
            .await
    {
        log_cache_error(&inbound.request_id, &err);
    }

    PipelineResult::ok(value)
}

/// Serves a live entry when the client asked for caching or the backend
/// advertised the entry as cacheable.
async fn cached_payload(
    state: &AppState,
    kind: ReadKind,
    key: &CacheKey,
    client_cached: bool,
) -> Option<Value> {
    let hit = state
        .cache
        .get(key)
        .await
        .filter(|hit| client_cached || hit.advertised);

    let Some(hit) = hit else {
        crate::metrics::observe_cache_lookup(kind.as_str(), "miss");
        return None;
    };

    match serde_json::from_slice::<Value>(&hit.bytes) {
        Ok(value) => {
            crate::metrics::observe_cache_lookup(kind.as_str(), "hit");
            Some(value)
        }
        Err(err) => {
            crate::metrics::observe_cache_lookup(kind.as_str(), "error");
            tracing::warn!(
                key = key.as_str(),
                error = %CacheError::Serialize(err.to_string()),
                "cache.corrupt_entry"
            );
            None
        }
    }
}

fn log_cache_error(request_id: &str, err: &CacheError) {
    tracing::warn!(request_id, error = %err, "cache.store_failed");
}

fn outbound_message(
    table_slug: &str,
    descriptor: &ResourceDescriptor,
    data: Struct,
    blocked_builder: bool,
    is_cached: bool,
) -> CommonMessage {
    CommonMessage {
        table_slug: table_slug.to_string(),
        project_id: descriptor.resource_env_id.clone(),
        data,
        env_id: Some(descriptor.env_id.clone()),
        company_project_id: Some(descriptor.project_id.clone()),
        is_cached,
        blocked_builder,
    }
}

fn is_uuid(raw: &str) -> bool {
    Uuid::try_parse(raw).is_ok()
}

fn validate_tenant(scope: &RequestScope) -> Result<(), GatewayError> {
    if !is_uuid(&scope.project_id) {
        return Err(GatewayError::InvalidProjectId);
    }
    if !is_uuid(&scope.environment_id) {
        return Err(GatewayError::InvalidEnvironmentId);
    }
    Ok(())
}

fn tag_payload(
    data: &mut Map<String, Value>,
    scope: &RequestScope,
    query: &CommonQuery,
    id_field: &str,
    policy: &IdPolicy,
) -> Result<Vec<String>, GatewayError> {
    data.insert(
        "company_service_project_id".to_string(),
        Value::String(scope.project_id.clone()),
    );
    data.insert(
        "company_service_environment_id".to_string(),
        Value::String(scope.environment_id.clone()),
    );
    if let Some(language) = query
        .language_setting
        .as_deref()
        .filter(|language| !language.is_empty())
    {
        data.insert(
            "language_setting".to_string(),
            Value::String(language.to_string()),
        );
    }

    match policy {
        IdPolicy::Generate => {
            let id = match data.get(id_field).and_then(Value::as_str) {
                Some(id) if is_uuid(id) => id.to_string(),
                _ => Uuid::new_v4().to_string(),
            };
            data.insert(id_field.to_string(), Value::String(id.clone()));
            Ok(vec![id])
        }
        IdPolicy::FromBodyOrPath(path_id) => {
            let id = data
                .get(id_field)
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .or_else(|| path_id.clone())
                .ok_or(GatewayError::InvalidItemId)?;
            if !is_uuid(&id) {
                return Err(GatewayError::InvalidItemId);
            }
            data.insert(id_field.to_string(), Value::String(id.clone()));
            Ok(vec![id])
        }
        IdPolicy::Bulk { generate } => {
            let mut ids = Vec::new();
            if let Some(Value::Array(values)) = data.get("ids") {
                for value in values {
                    let id = value
                        .as_str()
                        .filter(|id| is_uuid(id))
                        .ok_or(GatewayError::InvalidItemId)?;
                    ids.push(id.to_string());
                }
            }

            if let Some(Value::Array(objects)) = data.get_mut("objects") {
                for object in objects.iter_mut() {
                    let Value::Object(object) = object else {
                        return Err(GatewayError::Decode(
                            "objects must contain JSON objects".to_string(),
                        ));
                    };
                    let existing = object
                        .get(id_field)
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    match existing {
                        Some(id) if is_uuid(&id) => ids.push(id),
                        Some(_) if !*generate => return Err(GatewayError::InvalidItemId),
                        _ if *generate => {
                            let id = Uuid::new_v4().to_string();
                            object.insert(id_field.to_string(), Value::String(id.clone()));
                            ids.push(id);
                        }
                        _ => {}
                    }
                }
            }

            Ok(ids)
        }
        IdPolicy::Relation => {
            let id_from = data
                .get("id_from")
                .and_then(Value::as_str)
                .filter(|id| is_uuid(id))
                .ok_or(GatewayError::InvalidItemId)?
                .to_string();

            match data.get("id_to") {
                None | Some(Value::Null) => {}
                Some(Value::String(id)) if is_uuid(id) => {}
                Some(Value::Array(values))
                    if values
                        .iter()
                        .all(|value| value.as_str().is_some_and(is_uuid)) => {}
                Some(_) => return Err(GatewayError::InvalidItemId),
            }

            Ok(vec![id_from])
        }
        IdPolicy::Unchecked => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PROJECT: &str = "4f1b3c9e-2f4a-4d7e-9a51-6c0d7b1e2a33";
    const ENV: &str = "a3d5e6f7-8b9c-4d0e-8f1a-2b3c4d5e6f70";
    const ITEM: &str = "9a8c7c4e-3c53-4b5e-9f5e-0d9c2f1f7b11";

    fn scope() -> RequestScope {
        RequestScope {
            auth: None,
            project_id: PROJECT.to_string(),
            environment_id: ENV.to_string(),
            resource_id: None,
            user_id: None,
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn create_generates_guid_and_tags_tenant() {
        let mut data = object(json!({"name": "A", "guid": "not-a-uuid"}));
        let query = CommonQuery {
            language_setting: Some("en".to_string()),
            ..CommonQuery::default()
        };

        let ids = tag_payload(&mut data, &scope(), &query, "guid", &IdPolicy::Generate)
            .expect("tag");

        let guid = data["guid"].as_str().expect("guid string");
        assert!(is_uuid(guid));
        assert_ne!(guid, "not-a-uuid");
        assert_eq!(ids, vec![guid.to_string()]);
        assert_eq!(data["company_service_project_id"], json!(PROJECT));
        assert_eq!(data["company_service_environment_id"], json!(ENV));
        assert_eq!(data["language_setting"], json!("en"));
    }

    #[test]
    fn create_keeps_valid_client_guid() {
        let mut data = object(json!({"guid": ITEM}));
        let ids = tag_payload(&mut data, &scope(), &CommonQuery::default(), "guid", &IdPolicy::Generate)
            .expect("tag");
        assert_eq!(ids, vec![ITEM.to_string()]);
    }

    #[test]
    fn update_prefers_body_guid_over_path() {
        let other = "0b7f3a52-6a9d-4f3e-8c2b-1d0e9f8a7b6c";
        let mut data = object(json!({"guid": ITEM}));
        let ids = tag_payload(
            &mut data,
            &scope(),
            &CommonQuery::default(),
            "guid",
            &IdPolicy::FromBodyOrPath(Some(other.to_string())),
        )
        .expect("tag");
        assert_eq!(ids, vec![ITEM.to_string()]);

        let mut data = Map::new();
        let err = tag_payload(
            &mut data,
            &scope(),
            &CommonQuery::default(),
            "guid",
            &IdPolicy::FromBodyOrPath(Some("not-a-uuid".to_string())),
        )
        .expect_err("invalid path id");
        assert_eq!(err, GatewayError::InvalidItemId);
    }

    #[test]
    fn bulk_validates_ids_and_fills_object_guids() {
        let mut data = object(json!({"objects": [{"name": "a"}, {"guid": ITEM}]}));
        let ids = tag_payload(
            &mut data,
            &scope(),
            &CommonQuery::default(),
            "guid",
            &IdPolicy::Bulk { generate: true },
        )
        .expect("tag");
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[1], ITEM);
        assert!(is_uuid(data["objects"][0]["guid"].as_str().expect("generated")));

        let mut data = object(json!({"ids": [ITEM, "nope"]}));
        let err = tag_payload(
            &mut data,
            &scope(),
            &CommonQuery::default(),
            "guid",
            &IdPolicy::Bulk { generate: false },
        )
        .expect_err("invalid id");
        assert_eq!(err, GatewayError::InvalidItemId);
    }

    #[test]
    fn relation_requires_uuid_endpoints() {
        let mut data = object(json!({"table_from": "a", "id_from": ITEM, "table_to": "b", "id_to": [ITEM]}));
        let ids = tag_payload(&mut data, &scope(), &CommonQuery::default(), "guid", &IdPolicy::Relation)
            .expect("tag");
        assert_eq!(ids, vec![ITEM.to_string()]);

        let mut data = object(json!({"id_from": ITEM, "id_to": ["x"]}));
        assert!(
            tag_payload(&mut data, &scope(), &CommonQuery::default(), "guid", &IdPolicy::Relation)
                .is_err()
        );
    }

    #[test]
    fn tenant_ids_must_be_uuids() {
        let mut bad = scope();
        bad.project_id = "p".to_string();
        assert_eq!(validate_tenant(&bad), Err(GatewayError::InvalidProjectId));

        let mut bad = scope();
        bad.environment_id = "e".to_string();
        assert_eq!(validate_tenant(&bad), Err(GatewayError::InvalidEnvironmentId));

        assert_eq!(validate_tenant(&scope()), Ok(()));
    }

    #[test]
    fn query_flags_require_literal_true() {
        let query = CommonQuery {
            from_ofs: Some("true".to_string()),
            block_builder: Some("false".to_string()),
            language_setting: None,
        };
        assert!(query.from_ofs());
        assert!(!query.blocked_builder());

        let query = CommonQuery {
            from_ofs: Some("TRUE".to_string()),
            ..CommonQuery::default()
        };
        assert!(!query.from_ofs());
    }
}

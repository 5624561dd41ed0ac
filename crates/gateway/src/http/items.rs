use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, OriginalUri, Path, Query, State};
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use builder_contracts::HookMethod;

use super::auth_gate::RequestScope;
use super::AppState;
use super::pipeline::{
    self, CommonQuery, IdPolicy, Mutation, RawBody, Read, decode_body, empty_body,
    run_mutation, run_read,
};
use crate::backend::Operation;
use crate::cache::ReadKind;
use crate::status_map;

const GUID: &str = "guid";

pub(super) type Body = Result<Json<RawBody>, JsonRejection>;
pub(super) type QueryParams = Result<Query<CommonQuery>, QueryRejection>;

fn mutation(
    route: &'static str,
    operation: Operation,
    hook_method: HookMethod,
    action_type: &str,
    table_slug: String,
    ids: IdPolicy,
    success: &'static str,
) -> Mutation {
    Mutation {
        route,
        operation,
        hook_method: Some(hook_method),
        action_type: action_type.to_string(),
        table_slug,
        id_field: GUID,
        ids,
        success,
    }
}

pub(super) async fn create_item(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path(collection): Path<String>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
    body: Body,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, decode_body(body));
    let m = mutation(
        "items.create",
        Operation::CreateItem,
        HookMethod::Create,
        "CREATE ITEM",
        collection,
        IdPolicy::Generate,
        status_map::CREATED,
    );
    run_mutation(state, inbound, m).await
}

pub(super) async fn create_items(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path(collection): Path<String>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
    body: Body,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, decode_body(body));
    let m = mutation(
        "items.create_many",
        Operation::CreateItems,
        HookMethod::CreateMany,
        "CREATE ITEMS",
        collection,
        IdPolicy::Bulk { generate: true },
        status_map::CREATED,
    );
    run_mutation(state, inbound, m).await
}

pub(super) async fn get_item(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path((collection, id)): Path<(String, String)>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, empty_body());
    let read = Read {
        route: "items.get",
        operation: Operation::GetItem,
        table_slug: collection,
        id_field: GUID,
        ids: IdPolicy::FromBodyOrPath(Some(id)),
        cache: None,
    };
    run_read(state, inbound, read).await
}

pub(super) async fn list_items(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path(collection): Path<String>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
    body: Body,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, decode_body(body));
    let read = Read {
        route: "items.list",
        operation: Operation::ListItems,
        table_slug: collection,
        id_field: GUID,
        ids: IdPolicy::Unchecked,
        cache: Some(ReadKind::List),
    };
    run_read(state, inbound, read).await
}

pub(super) async fn aggregate(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path(collection): Path<String>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
    body: Body,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, decode_body(body));
    let read = Read {
        route: "items.aggregation",
        operation: Operation::Aggregate,
        table_slug: collection,
        id_field: GUID,
        ids: IdPolicy::Unchecked,
        cache: Some(ReadKind::Aggregation),
    };
    run_read(state, inbound, read).await
}

pub(super) async fn update_item(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path(collection): Path<String>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
    body: Body,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, decode_body(body));
    let m = mutation(
        "items.update",
        Operation::UpdateItem,
        HookMethod::Update,
        "UPDATE ITEM",
        collection,
        IdPolicy::FromBodyOrPath(None),
        status_map::OK,
    );
    run_mutation(state, inbound, m).await
}

pub(super) async fn update_item_by_id(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path((collection, id)): Path<(String, String)>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
    body: Body,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, decode_body(body));
    let m = mutation(
        "items.update",
        Operation::UpdateItem,
        HookMethod::Update,
        "UPDATE ITEM",
        collection,
        IdPolicy::FromBodyOrPath(Some(id)),
        status_map::OK,
    );
    run_mutation(state, inbound, m).await
}

pub(super) async fn update_items(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path(collection): Path<String>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
    body: Body,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, decode_body(body));
    let m = mutation(
        "items.update_many",
        Operation::UpdateItems,
        HookMethod::MultipleUpdate,
        "UPDATE ITEMS",
        collection,
        IdPolicy::Bulk { generate: false },
        status_map::OK,
    );
    run_mutation(state, inbound, m).await
}

pub(super) async fn delete_item(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path((collection, id)): Path<(String, String)>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, empty_body());
    let m = mutation(
        "items.delete",
        Operation::DeleteItem,
        HookMethod::Delete,
        "DELETE ITEM",
        collection,
        IdPolicy::FromBodyOrPath(Some(id)),
        status_map::NO_CONTENT,
    );
    run_mutation(state, inbound, m).await
}

pub(super) async fn delete_items(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path(collection): Path<String>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
    body: Body,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, decode_body(body));
    let m = mutation(
        "items.delete_many",
        Operation::DeleteItems,
        HookMethod::DeleteMany,
        "DELETE ITEMS",
        collection,
        IdPolicy::Bulk { generate: false },
        status_map::NO_CONTENT,
    );
    run_mutation(state, inbound, m).await
}

pub(super) async fn append_many2many(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path(collection): Path<String>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
    body: Body,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, decode_body(body));
    let m = mutation(
        "items.m2m_append",
        Operation::AppendManyToMany,
        HookMethod::AppendMany2Many,
        "APPEND MANY2MANY",
        collection,
        IdPolicy::Relation,
        status_map::OK,
    );
    run_mutation(state, inbound, m).await
}

pub(super) async fn delete_many2many(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path(collection): Path<String>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
    body: Body,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, decode_body(body));
    let m = mutation(
        "items.m2m_delete",
        Operation::DeleteManyToMany,
        HookMethod::DeleteMany2Many,
        "DELETE MANY2MANY",
        collection,
        IdPolicy::Relation,
        status_map::NO_CONTENT,
    );
    run_mutation(state, inbound, m).await
}

/// Row reordering runs no hooks.
pub(super) async fn update_row_order(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path(collection): Path<String>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
    body: Body,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, decode_body(body));
    let m = Mutation {
        route: "items.row_order",
        operation: Operation::UpdateRowOrder,
        hook_method: None,
        action_type: "UPDATE ROW ORDER".to_string(),
        table_slug: collection,
        id_field: GUID,
        ids: IdPolicy::Unchecked,
        success: status_map::OK,
    };
    run_mutation(state, inbound, m).await
}

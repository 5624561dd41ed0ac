//! Table, view and menu definitions. Mutations run the pipeline without
//! hooks but still record history.

use axum::Router;
use axum::extract::{Extension, OriginalUri, Path, State};
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use axum::routing::{get, post};

use super::auth_gate::RequestScope;
use super::AppState;
use super::pipeline::{
    self, IdPolicy, Mutation, Read, decode_body, empty_body, run_mutation, run_read,
};
use crate::backend::{Operation, SchemaKind};
use crate::status_map;

type Body = super::items::Body;
type QueryParams = super::items::QueryParams;

const ID: &str = "id";

trait SchemaRoute: Send + Sync + 'static {
    const KIND: SchemaKind;
}

struct Table;
struct View;
struct Menu;

impl SchemaRoute for Table {
    const KIND: SchemaKind = SchemaKind::Table;
}

impl SchemaRoute for View {
    const KIND: SchemaKind = SchemaKind::View;
}

impl SchemaRoute for Menu {
    const KIND: SchemaKind = SchemaKind::Menu;
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .merge(routes_for::<Table>("/v3/table"))
        .merge(routes_for::<View>("/v3/view"))
        .merge(routes_for::<Menu>("/v3/menu"))
}

fn routes_for<K: SchemaRoute>(base: &str) -> Router<AppState> {
    Router::new()
        .route(base, post(create::<K>).put(update::<K>).get(list::<K>))
        .route(
            &format!("{}/{{id}}", base),
            get(get_one::<K>).delete(delete::<K>),
        )
}

#[derive(Clone, Copy)]
enum Verb {
    Create,
    Get,
    List,
    Update,
    Delete,
}

fn route_name(kind: SchemaKind, verb: Verb) -> &'static str {
    match (kind, verb) {
        (SchemaKind::Table, Verb::Create) => "table.create",
        (SchemaKind::Table, Verb::Get) => "table.get",
        (SchemaKind::Table, Verb::List) => "table.list",
        (SchemaKind::Table, Verb::Update) => "table.update",
        (SchemaKind::Table, Verb::Delete) => "table.delete",
        (SchemaKind::View, Verb::Create) => "view.create",
        (SchemaKind::View, Verb::Get) => "view.get",
        (SchemaKind::View, Verb::List) => "view.list",
        (SchemaKind::View, Verb::Update) => "view.update",
        (SchemaKind::View, Verb::Delete) => "view.delete",
        (SchemaKind::Menu, Verb::Create) => "menu.create",
        (SchemaKind::Menu, Verb::Get) => "menu.get",
        (SchemaKind::Menu, Verb::List) => "menu.list",
        (SchemaKind::Menu, Verb::Update) => "menu.update",
        (SchemaKind::Menu, Verb::Delete) => "menu.delete",
    }
}

fn action_type(kind: SchemaKind, verb: &str) -> String {
    format!("{} {}", verb, kind.label())
}

fn schema_mutation(
    kind: SchemaKind,
    verb: Verb,
    operation: Operation,
    ids: IdPolicy,
    success: &'static str,
) -> Mutation {
    let verb_label = match verb {
        Verb::Create => "CREATE",
        Verb::Update => "UPDATE",
        Verb::Delete => "DELETE",
        Verb::Get | Verb::List => "READ",
    };
    Mutation {
        route: route_name(kind, verb),
        operation,
        hook_method: None,
        action_type: action_type(kind, verb_label),
        table_slug: kind.as_str().to_string(),
        id_field: ID,
        ids,
        success,
    }
}

async fn create<K: SchemaRoute>(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
    body: Body,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, decode_body(body));
    let m = schema_mutation(
        K::KIND,
        Verb::Create,
        Operation::CreateSchema(K::KIND),
        IdPolicy::Generate,
        status_map::CREATED,
    );
    run_mutation(state, inbound, m).await
}

async fn update<K: SchemaRoute>(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
    body: Body,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, decode_body(body));
    let m = schema_mutation(
        K::KIND,
        Verb::Update,
        Operation::UpdateSchema(K::KIND),
        IdPolicy::FromBodyOrPath(None),
        status_map::OK,
    );
    run_mutation(state, inbound, m).await
}

async fn delete<K: SchemaRoute>(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path(id): Path<String>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, empty_body());
    let m = schema_mutation(
        K::KIND,
        Verb::Delete,
        Operation::DeleteSchema(K::KIND),
        IdPolicy::FromBodyOrPath(Some(id)),
        status_map::NO_CONTENT,
    );
    run_mutation(state, inbound, m).await
}

async fn get_one<K: SchemaRoute>(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    Path(id): Path<String>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, empty_body());
    let read = Read {
        route: route_name(K::KIND, Verb::Get),
        operation: Operation::GetSchema(K::KIND),
        table_slug: K::KIND.as_str().to_string(),
        id_field: ID,
        ids: IdPolicy::FromBodyOrPath(Some(id)),
        cache: None,
    };
    run_read(state, inbound, read).await
}

async fn list<K: SchemaRoute>(
    State(state): State<AppState>,
    scope: Option<Extension<RequestScope>>,
    query: QueryParams,
    headers: HeaderMap,
    method: Method,
    uri: OriginalUri,
) -> Response {
    let inbound = pipeline::inbound(scope, query, &headers, &method, &uri, empty_body());
    let read = Read {
        route: route_name(K::KIND, Verb::List),
        operation: Operation::ListSchemas(K::KIND),
        table_slug: K::KIND.as_str().to_string(),
        id_field: ID,
        ids: IdPolicy::Unchecked,
        cache: None,
    };
    run_read(state, inbound, read).await
}

// SyncList HTTP router: maps method + path pairs onto ChecklistService calls.
//
// Routes (also served under /api; every response carries permissive CORS headers):
//   GET    /health                 - static liveness payload
//   GET    /categories             - list categories
//   POST   /categories             - create a category
//   GET    /checklists             - list checklists with items and category
//   GET    /checklists/{id}        - one checklist with items and category
//   POST   /checklists             - create a checklist
//   PUT    /checklists/{id}        - partial update
//   DELETE /checklists/{id}        - delete with its items
//   GET    /items/{checklistId}    - items of one checklist
//   POST   /items                  - create an item (always incomplete)
//   PATCH  /items/{id}/toggle      - flip completion
//   PUT    /items/{id}             - partial update
//   DELETE /items/{id}             - delete one item

use std::future::Future;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path, Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::http::request::Parts;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use synclist_core::error::{StoreError, SyncListError};
use synclist_core::service::ChecklistService;
use synclist_core::store::sqlite::SqliteStore;
use synclist_core::types::{
    Category, Checklist, ChecklistDetail, ChecklistPatch, Item, ItemPatch, NewCategory,
    NewChecklist, NewItem, RecordId,
};

/// The service type the router is wired against.
pub type Service = ChecklistService<SqliteStore>;

// ── State ─────────────────────────────────────────────────────────

/// Shared router state: a handle to the domain service.
#[derive(Debug, Clone)]
pub struct AppState {
    service: Service,
}

impl AppState {
    pub fn new(service: Service) -> Self {
        Self { service }
    }
}

// ── Response bodies ───────────────────────────────────────────────

/// JSON error payload: `{ "error": ..., "details"?: ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
}

// ── Errors ────────────────────────────────────────────────────────

/// A failed request, ready to be rendered as a JSON error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                details,
            },
        }
    }

    /// Map a domain failure onto a status code.
    ///
    /// Missing records become 404 and bad input becomes 400; anything else
    /// uses `fallback` with `message` as the headline.
    pub fn from_domain(err: &SyncListError, message: &str, fallback: StatusCode) -> Self {
        let details = Some(err.to_string());
        match err {
            SyncListError::NotFound { kind, .. }
            | SyncListError::Store(StoreError::RecordNotFound { kind, .. }) => {
                Self::new(StatusCode::NOT_FOUND, format!("{kind} not found"), details)
            }
            _ if err.is_validation() => Self::new(StatusCode::BAD_REQUEST, message, details),
            _ => Self::new(fallback, message, details),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "Invalid request body",
            Some(rejection.body_text()),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(
                status = self.status.as_u16(),
                error = %self.body.error,
                details = ?self.body.details,
                "Request failed"
            );
        } else {
            warn!(
                status = self.status.as_u16(),
                error = %self.body.error,
                details = ?self.body.details,
                "Request rejected"
            );
        }
        (self.status, Json(self.body)).into_response()
    }
}

/// Integer `{id}` path segment; anything else is a 400 with a JSON body.
#[derive(Debug, Clone, Copy)]
pub struct IdPath(pub RecordId);

impl<S: Send + Sync> FromRequestParts<S> for IdPath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "Invalid id",
                    Some(rejection.body_text()),
                )
            })?;
        Ok(Self(RecordId(id)))
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// `map_err` adapter for reads and updates: unclassified failures are 500s.
fn server_error(message: &'static str) -> impl FnOnce(SyncListError) -> ApiError {
    move |e| ApiError::from_domain(&e, message, StatusCode::INTERNAL_SERVER_ERROR)
}

/// `map_err` adapter for creates: unclassified failures are 400s.
fn bad_request(message: &'static str) -> impl FnOnce(SyncListError) -> ApiError {
    move |e| ApiError::from_domain(&e, message, StatusCode::BAD_REQUEST)
}

// ── Router ────────────────────────────────────────────────────────

fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/categories", get(list_categories).post(create_category))
        .route("/checklists", get(list_checklists).post(create_checklist))
        .route(
            "/checklists/{id}",
            get(get_checklist)
                .put(update_checklist)
                .delete(delete_checklist),
        )
        .route("/items", post(create_item))
        .route(
            "/items/{id}",
            get(list_items).put(update_item).delete(delete_item),
        )
        .route("/items/{id}/toggle", patch(toggle_item))
        .method_not_allowed_fallback(method_not_allowed)
}

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let api = routes();
    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .fallback(route_not_found)
        .layer(middleware::from_fn(log_request))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Serve `service` on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, service: Service, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "SyncList listening");
    axum::serve(listener, app(AppState::new(service)))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                warn!("Cannot register SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received");
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();
    let response = next.run(req).await;
    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed = ?started.elapsed(),
        "Handled request"
    );
    response
}

const CORS_ALLOW_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

/// Permissive CORS: any origin, preflights answered with 204 before routing
/// reaches a method router.
async fn cors(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let requested = req
            .headers()
            .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .cloned();
        let mut resp = StatusCode::NO_CONTENT.into_response();
        let headers = resp.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        );
        if let Some(requested) = requested {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested);
        }
        return resp;
    }

    let mut resp = next.run(req).await;
    resp.headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    resp
}

// ── Handlers ──────────────────────────────────────────────────────

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "OK".to_string(),
    })
}

async fn route_not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Route not found", None)
}

async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::new(
        StatusCode::METHOD_NOT_ALLOWED,
        "Method not allowed",
        Some(format!("{method} is not supported on this route")),
    )
}

async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    state
        .service
        .list_categories()
        .await
        .map(Json)
        .map_err(server_error("Could not fetch categories"))
}

async fn create_category(
    State(state): State<AppState>,
    payload: Result<Json<NewCategory>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let Json(fields) = payload?;
    let category = state
        .service
        .create_category(fields)
        .await
        .map_err(bad_request("Could not create category"))?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn list_checklists(State(state): State<AppState>) -> ApiResult<Json<Vec<ChecklistDetail>>> {
    state
        .service
        .list_checklists()
        .await
        .map(Json)
        .map_err(server_error("Could not fetch checklists"))
}

async fn get_checklist(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Json<ChecklistDetail>> {
    state
        .service
        .get_checklist(id)
        .await
        .map(Json)
        .map_err(server_error("Could not fetch checklist"))
}

async fn create_checklist(
    State(state): State<AppState>,
    payload: Result<Json<NewChecklist>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Checklist>)> {
    let Json(fields) = payload?;
    let checklist = state
        .service
        .create_checklist(fields)
        .await
        .map_err(bad_request("Could not create checklist"))?;
    Ok((StatusCode::CREATED, Json(checklist)))
}

async fn update_checklist(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    payload: Result<Json<ChecklistPatch>, JsonRejection>,
) -> ApiResult<Json<Checklist>> {
    let Json(patch) = payload?;
    state
        .service
        .update_checklist(id, patch)
        .await
        .map(Json)
        .map_err(server_error("Update failed"))
}

async fn delete_checklist(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Json<MessageBody>> {
    state
        .service
        .delete_checklist(id)
        .await
        .map_err(server_error("Delete failed"))?;
    Ok(Json(MessageBody {
        message: "Checklist deleted".to_string(),
    }))
}

/// `GET /items/{id}` lists the items of checklist `id`.
async fn list_items(
    State(state): State<AppState>,
    IdPath(checklist_id): IdPath,
) -> ApiResult<Json<Vec<Item>>> {
    state
        .service
        .list_items_for_checklist(checklist_id)
        .await
        .map(Json)
        .map_err(server_error("Could not fetch items"))
}

async fn create_item(
    State(state): State<AppState>,
    payload: Result<Json<NewItem>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    let Json(fields) = payload?;
    let item = state
        .service
        .create_item(fields)
        .await
        .map_err(bad_request("Could not add item"))?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn toggle_item(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<Json<Item>> {
    state
        .service
        .toggle_item(id)
        .await
        .map(Json)
        .map_err(server_error("Update failed"))
}

async fn update_item(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    payload: Result<Json<ItemPatch>, JsonRejection>,
) -> ApiResult<Json<Item>> {
    let Json(patch) = payload?;
    state
        .service
        .update_item(id, patch)
        .await
        .map(Json)
        .map_err(server_error("Update failed"))
}

async fn delete_item(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Json<MessageBody>> {
    state
        .service
        .delete_item(id)
        .await
        .map_err(server_error("Delete failed"))?;
    Ok(Json(MessageBody {
        message: "Item deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    fn test_app() -> Router {
        let store = SqliteStore::in_memory().unwrap();
        app(AppState::new(ChecklistService::new(Arc::new(store))))
    }

    async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };
        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn responses_allow_any_origin() {
        let response = test_app()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/categories")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn preflight_is_answered_without_routing() {
        let response = test_app()
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/items/3/toggle")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS]
                .to_str()
                .unwrap()
                .contains("PATCH")
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "content-type");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let router = test_app();
        let (status, body) = send(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "OK"}));
    }

    #[tokio::test]
    async fn routes_are_also_served_under_api_prefix() {
        let router = test_app();
        let (status, body) = send(&router, Method::GET, "/api/checklists", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn create_category_returns_201() {
        let router = test_app();
        let (status, body) = send(
            &router,
            Method::POST,
            "/categories",
            Some(json!({"name": "Travel"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], 1);
        assert_eq!(body["name"], "Travel");

        let (status, body) = send(&router, Method::GET, "/categories", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_required_field_is_400_with_error_body() {
        let router = test_app();
        let (status, body) = send(&router, Method::POST, "/checklists", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request body");
        assert!(body["details"].is_string());
    }

    #[tokio::test]
    async fn blank_title_is_400() {
        let router = test_app();
        let (status, body) = send(
            &router,
            Method::POST,
            "/checklists",
            Some(json!({"title": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Could not create checklist");
    }

    #[tokio::test]
    async fn body_without_content_type_is_400() {
        let router = test_app();
        let response = router
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::POST)
                    .uri("/items")
                    .body(Body::from(r#"{"taskName":"x","checklistId":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_missing_checklist_is_404() {
        let router = test_app();
        let (status, body) = send(&router, Method::GET, "/checklists/12", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Checklist not found");
    }

    #[tokio::test]
    async fn non_numeric_id_is_400() {
        let router = test_app();
        let (status, body) = send(&router, Method::GET, "/checklists/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid id");
    }

    #[tokio::test]
    async fn update_missing_item_is_404() {
        let router = test_app();
        let (status, body) = send(
            &router,
            Method::PUT,
            "/items/999",
            Some(json!({"taskName": "Visa"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Item not found");
    }

    #[tokio::test]
    async fn toggle_missing_item_is_404() {
        let router = test_app();
        let (status, _) = send(&router, Method::PATCH, "/items/5/toggle", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_checklist_merges_fields() {
        let router = test_app();
        send(
            &router,
            Method::POST,
            "/checklists",
            Some(json!({"title": "Packing", "categoryId": 2})),
        )
        .await;

        let (status, body) = send(
            &router,
            Method::PUT,
            "/checklists/1",
            Some(json!({"title": "Packing list"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Packing list");
        assert_eq!(body["categoryId"], 2);

        let (_, body) = send(
            &router,
            Method::PUT,
            "/checklists/1",
            Some(json!({"categoryId": null})),
        )
        .await;
        assert!(body["categoryId"].is_null());
    }

    #[tokio::test]
    async fn delete_item_confirms_even_when_absent() {
        let router = test_app();
        let (status, body) = send(&router, Method::DELETE, "/items/3", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Item deleted"}));
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let router = test_app();
        let (status, body) = send(&router, Method::GET, "/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Route not found");
    }

    #[tokio::test]
    async fn wrong_method_on_known_path_is_json_405() {
        let router = test_app();
        for (method, uri) in [
            (Method::POST, "/checklists/1"),
            (Method::DELETE, "/categories"),
            (Method::GET, "/api/items"),
        ] {
            let (status, body) = send(&router, method.clone(), uri, None).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method} {uri}");
            assert_eq!(body["error"], "Method not allowed");
            assert!(body["details"].as_str().unwrap().contains(method.as_str()));
        }
    }

    #[test]
    fn store_failures_use_the_fallback_status() {
        let err = SyncListError::Store(StoreError::Migration("disk gone".into()));
        let api = ApiError::from_domain(&err, "Update failed", StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let create = ApiError::from_domain(&err, "Could not add item", StatusCode::BAD_REQUEST);
        assert_eq!(create.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn constraint_failures_are_400_even_on_update() {
        let err = SyncListError::Store(StoreError::Constraint("CHECK constraint failed".into()));
        let api = ApiError::from_domain(&err, "Update failed", StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
    }
}

// Integration test utilities for SyncList: a router backed by a scratch
// SQLite file, driven in-process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use synclist_core::service::ChecklistService;
use synclist_core::store::sqlite::SqliteStore;
use synclist_server::{AppState, app};

/// A running application over a temporary database file.
#[derive(Debug)]
pub struct TestApp {
    pub dir: tempfile::TempDir,
    pub store: Arc<SqliteStore>,
    router: Router,
}

impl TestApp {
    /// Fresh app with an empty database.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create tempdir");
        let db = dir.path().join("synclist.db");
        Self::with_dir(dir, &db)
    }

    /// Reopen the same database file, as a restarted server would.
    pub fn restart(self) -> Self {
        let Self { dir, store, router } = self;
        drop(router);
        drop(store);
        let db = dir.path().join("synclist.db");
        Self::with_dir(dir, &db)
    }

    fn with_dir(dir: tempfile::TempDir, db: &Path) -> Self {
        let store = Arc::new(SqliteStore::open(db).expect("open store"));
        let service = ChecklistService::new(Arc::clone(&store));
        let router = app(AppState::new(service));
        Self { dir, store, router }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("synclist.db")
    }

    /// Send one request and decode the JSON response body.
    ///
    /// An empty body decodes as `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let resp = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("router is infallible");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is JSON")
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, None).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None).await
    }

    /// Create a checklist and return its id, panicking on any non-201.
    pub async fn seed_checklist(&self, title: &str, category_id: Option<i64>) -> i64 {
        let (status, body) = self
            .post(
                "/checklists",
                serde_json::json!({ "title": title, "categoryId": category_id }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "seed checklist: {body}");
        body["id"].as_i64().expect("checklist id")
    }

    /// Create an item and return its id, panicking on any non-201.
    pub async fn seed_item(&self, task_name: &str, checklist_id: i64) -> i64 {
        let (status, body) = self
            .post(
                "/items",
                serde_json::json!({ "taskName": task_name, "checklistId": checklist_id }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "seed item: {body}");
        body["id"].as_i64().expect("item id")
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

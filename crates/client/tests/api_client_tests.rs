use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, RawQuery};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use stockmaster_client::{ApiClient, ClientConfig, SessionStore};
use stockmaster_shared::{
    ApiError, LoginRequest, OperationFilters, Product, ProductFilters, User, NETWORK_ERROR_MESSAGE,
};
use tempfile::TempDir;

mod utils;

use utils::*;

// ============================================================================
// Fake REST Server
// ============================================================================

fn authorization(headers: &HeaderMap) -> String {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none")
        .to_string()
}

async fn list_products(headers: HeaderMap, RawQuery(query): RawQuery) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": query.unwrap_or_else(|| authorization(&headers)),
        "count": 1,
        "total": 1,
        "page": 1,
        "pages": 1,
        "data": [{ "_id": "p1", "name": "Bolt", "sku": "BOLT-1", "totalStock": 12.0 }],
    }))
}

async fn login(Json(body): Json<Value>) -> impl IntoResponse {
    if body["password"] == "secret" {
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "user": { "_id": "u1", "email": body["email"], "role": "inventory_manager" },
                    "token": "tok-123"
                }
            })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Invalid credentials" })),
        )
    }
}

async fn me() -> impl IntoResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "message": "Token expired" })),
    )
}

async fn warehouse(Path(id): Path<String>) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": format!("Warehouse {id} not found") })),
    )
}

async fn low_stock() -> impl IntoResponse {
    (StatusCode::BAD_GATEWAY, Html("<html><body>Bad gateway</body></html>"))
}

async fn delete_product() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn process_receipt(Path(id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": { "_id": id, "status": "done", "items": body["items"] }
    }))
}

async fn list_receipts(RawQuery(query): RawQuery) -> Json<Value> {
    Json(json!({ "success": true, "data": [], "message": query.unwrap_or_default() }))
}

async fn rest_server() -> String {
    let app = Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/{id}", delete(delete_product))
        .route("/api/products/alerts/low-stock", get(low_stock))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/warehouses/{id}", get(warehouse))
        .route("/api/receipts", get(list_receipts))
        .route("/api/receipts/{id}/process", post(process_receipt));
    format!("{}/api", serve(app).await)
}

fn client(base_url: &str) -> (ApiClient, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = ClientConfig {
        api_base_url: base_url.to_string(),
        session_dir: Some(dir.path().to_path_buf()),
        ..ClientConfig::default()
    };
    (ApiClient::new(&config), dir)
}

// ============================================================================
// Auth Header and Session
// ============================================================================

#[tokio::test]
async fn test_requests_carry_stored_token() {
    let base = rest_server().await;
    let (api, _dir) = client(&base);

    let anonymous = api.get_products(None).await.unwrap();
    assert_eq!(anonymous.message.as_deref(), Some("none"));

    api.session().set_token(Some("abc"));
    let envelope = api.get_products(None).await.unwrap();
    assert_eq!(envelope.message.as_deref(), Some("Bearer abc"));
    assert_eq!(envelope.count, Some(1));

    let products: Vec<Product> = envelope.into_data().unwrap();
    assert_eq!(products[0].sku.as_deref(), Some("BOLT-1"));
}

#[tokio::test]
async fn test_login_persists_session() {
    let base = rest_server().await;
    let (api, dir) = client(&base);

    let envelope = api
        .login(&LoginRequest {
            email: "ana@example.com".into(),
            password: "secret".into(),
        })
        .await
        .unwrap();
    assert!(envelope.success);

    // A fresh store over the same directory sees the persisted session.
    let store = SessionStore::new(dir.path());
    assert_eq!(store.token().as_deref(), Some("tok-123"));
    let user: User = store.user().unwrap();
    assert_eq!(user.id.as_deref(), Some("u1"));
    assert_eq!(api.stored_user().unwrap().email.as_deref(), Some("ana@example.com"));

    api.logout();
    assert!(!store.is_authenticated());
}

#[tokio::test]
async fn test_unauthorized_clears_session_and_runs_hook() {
    let base = rest_server().await;
    let (api, dir) = client(&base);
    let expired = Arc::new(AtomicUsize::new(0));
    let counted = expired.clone();
    let api = api.on_session_expired(move || {
        counted.fetch_add(1, Ordering::SeqCst);
    });

    api.session().set_token(Some("stale"));
    let err = api.get_current_user().await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(err.message(), "Token expired");
    assert_eq!(expired.load(Ordering::SeqCst), 1);
    assert!(SessionStore::new(dir.path()).token().is_none());
}

#[tokio::test]
async fn test_failed_login_returns_server_envelope() {
    let base = rest_server().await;
    let (api, _dir) = client(&base);

    let err = api
        .login(&LoginRequest {
            email: "ana@example.com".into(),
            password: "wrong".into(),
        })
        .await
        .unwrap_err();

    let envelope = err.envelope();
    assert!(!envelope.success);
    assert_eq!(envelope.message.as_deref(), Some("Invalid credentials"));
    assert!(api.session().token().is_none());
}

// ============================================================================
// Error Normalization
// ============================================================================

#[tokio::test]
async fn test_not_found_keeps_server_message() {
    let base = rest_server().await;
    let (api, _dir) = client(&base);

    let err = api.get_warehouse("w404").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.message(), "Warehouse w404 not found");
}

#[tokio::test]
async fn test_html_error_body_is_normalized() {
    let base = rest_server().await;
    let (api, _dir) = client(&base);

    let err = api.get_low_stock_products().await.unwrap_err();
    assert_eq!(err.status(), Some(502));
    assert_eq!(err.message(), "Request failed with status code 502");
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let base = format!("{}/api", closed_port_url().await);
    let (api, _dir) = client(&base);

    let err = api.get_warehouses().await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
    assert_eq!(err.message(), NETWORK_ERROR_MESSAGE);
    assert_eq!(err.status(), None);
}

// ============================================================================
// Services
// ============================================================================

#[tokio::test]
async fn test_product_filters_become_query_string() {
    let base = rest_server().await;
    let (api, _dir) = client(&base);

    let filters = ProductFilters {
        search: Some("hex bolt".into()),
        page: Some(2),
        ..Default::default()
    };
    let envelope = api.get_products(Some(&filters)).await.unwrap();
    assert_eq!(envelope.message.as_deref(), Some("page=2&search=hex+bolt"));
    assert_eq!(envelope.data.map(|d| d.len()), Some(1));
}

#[tokio::test]
async fn test_operation_filters_are_sent() {
    let base = rest_server().await;
    let (api, _dir) = client(&base);

    let filters = OperationFilters {
        status: Some("ready".into()),
        limit: Some(10),
        ..Default::default()
    };
    let envelope = api.get_receipts(Some(&filters)).await.unwrap();
    assert_eq!(envelope.message.as_deref(), Some("limit=10&status=ready"));

    let unfiltered = api.get_receipts(None).await.unwrap();
    assert_eq!(unfiltered.message.as_deref(), Some(""));
}

#[tokio::test]
async fn test_process_receipt_posts_items() {
    let base = rest_server().await;
    let (api, _dir) = client(&base);

    let items = [json!({ "product": "p1", "quantity": 5 })];
    let envelope = api.process_receipt("r1", &items).await.unwrap();
    let receipt = envelope.into_data().unwrap();

    assert_eq!(receipt.id.as_deref(), Some("r1"));
    assert_eq!(receipt.status.as_deref(), Some("done"));
}

#[tokio::test]
async fn test_empty_success_body_is_success_envelope() {
    let base = rest_server().await;
    let (api, _dir) = client(&base);

    let envelope = api.delete_product("p1").await.unwrap();
    assert!(envelope.success);
    assert!(envelope.data.is_none());
}

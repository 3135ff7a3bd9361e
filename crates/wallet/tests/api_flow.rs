use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::db::SqliteStore;
use common::store::AnyStore;
use common::types::Session;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use wallet::api::{router, AppState};
use wallet::service::WalletService;

async fn app_at(path: &str) -> axum::Router {
    let store = SqliteStore::open(path).await.unwrap();
    router(Arc::new(AppState::new(
        WalletService::new(AnyStore::Sqlite(store)),
        Session::local("local-user"),
        Some("k".to_string()),
    )))
}

fn request(method: &str, uri: &str, body: Option<&str>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", "Bearer k");
    match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn call(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn decimal(v: &Value) -> Decimal {
    v.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_ledger_survives_restart_and_feeds_dashboard() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wallet.db");
    let path = path.to_str().unwrap();

    {
        let app = app_at(path).await;
        let (status, _) = call(&app, request("POST", "/api/deposit", Some(r#"{"amount": 2000}"#))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = call(
            &app,
            request(
                "POST",
                "/api/invest",
                Some(r#"{"amount": 500, "project": "Qubic DeFi Index"}"#),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = call(
            &app,
            request("POST", "/api/invest", Some(r#"{"amount": 500, "project_id": 6}"#)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let app = app_at(path).await;

    let (status, wallet) = call(&app, request("GET", "/api/wallet", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&wallet["wallet"]["balance"]), Decimal::from(1000));
    assert_eq!(wallet["entries"].as_array().unwrap().len(), 3);

    let (status, allocation) = call(&app, request("GET", "/api/dashboard/allocation", None)).await;
    assert_eq!(status, StatusCode::OK);
    let slices = allocation.as_array().unwrap();
    assert_eq!(slices[0]["label"], "USDQ");
    assert_eq!(slices[0]["percent"], 50);
    let total: i64 = slices.iter().map(|s| s["percent"].as_i64().unwrap()).sum();
    assert_eq!(total, 100);

    let (status, earnings) = call(&app, request("GET", "/api/dashboard/earnings", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&earnings["initial_investment"]), Decimal::from(2000));
}

#[tokio::test]
async fn test_unauthorized_without_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wallet.db");
    let app = app_at(path.to_str().unwrap()).await;

    let req = Request::builder()
        .uri("/api/dashboard")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

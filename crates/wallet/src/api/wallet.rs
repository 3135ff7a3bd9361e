use analytics::LedgerView;
use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::api::{ApiError, AppState};
use crate::service::{parse_amount, Receipt, ServiceError};

#[derive(Deserialize)]
pub struct AmountRequest {
    /// JSON number or numeric string.
    pub amount: Value,
}

#[derive(Deserialize)]
pub struct InvestRequest {
    pub amount: Value,
    pub project: Option<String>,
    pub project_id: Option<u32>,
}

fn amount_from(value: &Value) -> Result<Decimal, ServiceError> {
    match value {
        Value::String(s) => parse_amount(s),
        Value::Number(n) => parse_amount(&n.to_string()),
        other => Err(ServiceError::Validation(format!(
            "amount must be a number, got {other}"
        ))),
    }
}

pub async fn get_wallet(State(state): State<Arc<AppState>>) -> Result<Json<LedgerView>, ApiError> {
    Ok(Json(state.current_view().await?))
}

/// Drop the cached view once the ledger may have changed.
async fn finish(
    state: &AppState,
    result: Result<Receipt, ServiceError>,
) -> Result<(StatusCode, Json<Receipt>), ApiError> {
    if matches!(result, Ok(_) | Err(ServiceError::BalanceUpdate { .. })) {
        state.invalidate().await;
    }
    Ok((StatusCode::CREATED, Json(result?)))
}

pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AmountRequest>,
) -> Result<(StatusCode, Json<Receipt>), ApiError> {
    let amount = amount_from(&req.amount)?;
    let _guard = state.mutations.lock().await;
    let view = state.current_view().await?;
    let result = state
        .service
        .deposit(&state.session, &view.wallet, amount)
        .await;
    finish(&state, result).await
}

pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AmountRequest>,
) -> Result<(StatusCode, Json<Receipt>), ApiError> {
    let amount = amount_from(&req.amount)?;
    let _guard = state.mutations.lock().await;
    let view = state.current_view().await?;
    let result = state
        .service
        .withdraw(&state.session, &view.wallet, amount)
        .await;
    finish(&state, result).await
}

pub async fn invest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InvestRequest>,
) -> Result<(StatusCode, Json<Receipt>), ApiError> {
    let amount = amount_from(&req.amount)?;
    if req.project_id.is_none() && req.project.is_none() {
        return Err(ServiceError::Validation("project or project_id is required".to_string()).into());
    }
    let _guard = state.mutations.lock().await;
    let view = state.current_view().await?;
    let result = match (req.project_id, req.project.as_deref()) {
        (Some(project_id), _) => {
            state
                .service
                .invest_in_catalog(&state.session, &view.wallet, amount, project_id)
                .await
        }
        (None, project) => {
            state
                .service
                .invest(&state.session, &view.wallet, amount, project.unwrap_or_default())
                .await
        }
    };
    finish(&state, result).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::service::WalletService;
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::Response;
    use axum::Router;
    use common::db::SqliteStore;
    use common::store::AnyStore;
    use common::types::Session;
    use rust_decimal_macros::dec;
    use std::str::FromStr;
    use tower::ServiceExt;

    async fn app() -> Router {
        let store = AnyStore::Sqlite(SqliteStore::open_memory().await.unwrap());
        router(Arc::new(AppState::new(
            WalletService::new(store),
            Session::local("u1"),
            None,
        )))
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn decimal(v: &Value) -> Decimal {
        match v {
            Value::String(s) => Decimal::from_str(s).unwrap(),
            other => Decimal::from_str(&other.to_string()).unwrap(),
        }
    }

    #[test]
    fn test_amount_from_number_and_string() {
        assert_eq!(amount_from(&serde_json::json!(12.5)).unwrap(), dec!(12.5));
        assert_eq!(amount_from(&serde_json::json!("7")).unwrap(), dec!(7));
        assert!(amount_from(&serde_json::json!(null)).is_err());
        assert!(amount_from(&serde_json::json!("abc")).is_err());
    }

    #[tokio::test]
    async fn test_deposit_withdraw_invest_flow() {
        let app = app().await;

        let response = app
            .clone()
            .oneshot(post("/api/deposit", r#"{"amount": 1000}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(decimal(&body_json(response).await["balance"]), dec!(1000));

        let response = app
            .clone()
            .oneshot(post("/api/withdraw", r#"{"amount": "100"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(post(
                "/api/invest",
                r#"{"amount": 250, "project_id": 2}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(decimal(&json["balance"]), dec!(650));
        assert_eq!(json["entry"]["details"], "Investment: USDQ Farming");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/wallet")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(decimal(&json["wallet"]["balance"]), dec!(650));
        assert_eq!(json["entries"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_overdraw_is_unprocessable() {
        let response = app()
            .await
            .oneshot(post("/api/withdraw", r#"{"amount": 5}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["kind"], "insufficient_funds");
    }

    #[tokio::test]
    async fn test_bad_amount_is_bad_request() {
        let app = app().await;
        for body in [r#"{"amount": "ten"}"#, r#"{"amount": -3}"#, r#"{"amount": 0}"#] {
            let response = app.clone().oneshot(post("/api/deposit", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        }
    }

    #[tokio::test]
    async fn test_deposit_overflowing_balance_is_bad_request() {
        let app = app().await;
        let response = app
            .clone()
            .oneshot(post("/api/deposit", r#"{"amount": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(post(
                "/api/deposit",
                r#"{"amount": "79228162514264337593543950335"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deposits_all_land_in_balance() {
        let app = app().await;

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let app = app.clone();
                tokio::spawn(async move {
                    app.oneshot(post("/api/deposit", r#"{"amount": 100}"#))
                        .await
                        .unwrap()
                        .status()
                })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), StatusCode::CREATED);
        }

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/wallet")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["entries"].as_array().unwrap().len(), 10);
        assert_eq!(decimal(&json["wallet"]["balance"]), dec!(1000));
    }

    #[tokio::test]
    async fn test_invest_needs_a_project() {
        let response = app()
            .await
            .oneshot(post("/api/invest", r#"{"amount": 5}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

pub mod dashboard;
pub mod projects;
pub mod wallet;

use analytics::{LedgerView, ReportError};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::store::AnyStore;
use common::types::Session;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::metrics::REALTIME_REFRESHES;
use crate::realtime::Change;
use crate::service::{ServiceError, WalletService};

/// Shared application state available to all handlers.
pub struct AppState {
    pub service: WalletService<AnyStore>,
    pub session: Session,
    /// Last fetched wallet and ledger. Cleared by mutations and change events.
    pub view: RwLock<Option<LedgerView>>,
    /// Held from reading the balance until the cache is dropped, so each
    /// mutation starts from the balance the previous one wrote.
    pub mutations: Mutex<()>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub api_key: Option<String>,
}

impl AppState {
    pub fn new(service: WalletService<AnyStore>, session: Session, api_key: Option<String>) -> Self {
        Self {
            service,
            session,
            view: RwLock::new(None),
            mutations: Mutex::new(()),
            started_at: chrono::Utc::now(),
            api_key,
        }
    }

    /// Cached view, fetched (and the wallet created) on a miss.
    pub async fn current_view(&self) -> Result<LedgerView, ApiError> {
        let cached = self.view.read().await.clone();
        if let Some(view) = cached {
            return Ok(view);
        }
        let wallet = self.service.load_wallet(&self.session).await?;
        let entries = self.service.ledger(&self.session, &wallet.id).await?;
        let view = LedgerView { wallet, entries };
        *self.view.write().await = Some(view.clone());
        Ok(view)
    }

    pub async fn invalidate(&self) {
        *self.view.write().await = None;
    }
}

/// Drop the cached view on every change notification.
pub async fn invalidate_on_changes(state: Arc<AppState>, mut changes: mpsc::Receiver<Change>) {
    while let Some(change) = changes.recv().await {
        metrics::counter!(REALTIME_REFRESHES, "table" => change.table.clone()).increment(1);
        debug!(table = %change.table, kind = %change.kind, "invalidating cached view");
        state.invalidate().await;
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    // Health endpoint is always public (no auth)
    let public = Router::new().route("/api/health", get(health));

    let protected = Router::new()
        .route("/api/wallet", get(wallet::get_wallet))
        .route("/api/deposit", post(wallet::deposit))
        .route("/api/withdraw", post(wallet::withdraw))
        .route("/api/invest", post(wallet::invest))
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .route("/api/dashboard/performance", get(dashboard::get_performance))
        .route("/api/dashboard/allocation", get(dashboard::get_allocation))
        .route("/api/dashboard/investments", get(dashboard::get_investments))
        .route("/api/dashboard/earnings", get(dashboard::get_earnings))
        .route("/api/report", get(dashboard::get_report))
        .route("/api/projects", get(projects::list_projects))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bearer token auth middleware. Skipped when no api_key is configured.
async fn auth_middleware(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let Some(api_key) = &state.api_key else {
        return next.run(req).await;
    };

    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match token {
        Some(token) if constant_time_eq(token.as_bytes(), api_key.as_bytes()) => {
            next.run(req).await
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    store: &'static str,
    uptime_secs: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store: state.service.store().kind(),
        uptime_secs: uptime,
    })
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

/// Handler error mapped onto a status code and a JSON body.
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    Report(ReportError),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        Self::Report(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Service(ServiceError::Validation(_)) | Self::Report(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Service(ServiceError::InsufficientFunds { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Service(ServiceError::Store(_) | ServiceError::BalanceUpdate { .. }) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Service(e) => e.kind(),
            Self::Report(_) => "validation",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Service(e) => e.to_string(),
            Self::Report(e) => e.to_string(),
        };
        (
            self.status(),
            Json(ErrorResponse {
                error: message,
                kind: self.kind(),
            }),
        )
            .into_response()
    }
}

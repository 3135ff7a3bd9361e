use anyhow::{Context, Result};
use common::backend::BackendClient;
use common::config::{Config, StoreKind};
use common::db::SqliteStore;
use common::store::AnyStore;
use common::types::Session;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use wallet::service::WalletService;
use wallet::{api, cli, metrics, realtime};

/// Store, session and optional realtime endpoint resolved from config.
struct Backend {
    store: AnyStore,
    session: Session,
    realtime_url: Option<String>,
    /// Set when this process signed in and should sign out on exit.
    sign_out_with: Option<BackendClient>,
}

async fn connect(config: &Config) -> Result<Backend> {
    match config.ledger.store {
        StoreKind::Sqlite => {
            let store = SqliteStore::open(&config.ledger.sqlite_path).await?;
            Ok(Backend {
                store: AnyStore::Sqlite(store),
                session: Session::local(&config.ledger.local_user_id),
                realtime_url: None,
                sign_out_with: None,
            })
        }
        StoreKind::Rest => {
            let client = BackendClient::new(
                &config.backend.url,
                &config.backend.anon_key,
                Duration::from_secs(config.backend.request_timeout_secs),
            )?;

            let (session, owns_session) = if let Ok(token) = std::env::var("WALLET_ACCESS_TOKEN") {
                let session = client
                    .session_from_token(&token)
                    .await
                    .context("WALLET_ACCESS_TOKEN was rejected")?;
                (session, false)
            } else {
                let email = std::env::var("WALLET_EMAIL")
                    .context("set WALLET_ACCESS_TOKEN, or WALLET_EMAIL and WALLET_PASSWORD")?;
                let password =
                    std::env::var("WALLET_PASSWORD").context("WALLET_PASSWORD is not set")?;
                let session = client
                    .sign_in_with_password(&email, &password)
                    .await
                    .context("sign-in failed")?;
                (session, true)
            };
            info!(user_id = %session.user_id, "authenticated against backend");

            let realtime_url = if config.backend.realtime {
                Some(client.realtime_url()?)
            } else {
                None
            };

            Ok(Backend {
                sign_out_with: owns_session.then(|| client.clone()),
                store: AnyStore::Rest(client),
                session,
                realtime_url,
            })
        }
    }
}

async fn serve(
    config: &Config,
    service: WalletService<AnyStore>,
    session: Session,
    realtime_url: Option<String>,
) -> Result<()> {
    metrics::install_prometheus(config.observability.prometheus_port)?;
    metrics::describe();

    let state = Arc::new(api::AppState::new(
        service,
        session,
        config.server.api_key.clone(),
    ));
    let cancel = CancellationToken::new();

    if let Some(url) = realtime_url {
        let (tx, rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(realtime::run_change_feed(
            url,
            state.session.access_token.clone(),
            tx,
            cancel.clone(),
        ));
        tokio::spawn(api::invalidate_on_changes(Arc::clone(&state), rx));
        info!("realtime change feed enabled");
    }

    if config.server.api_key.is_none() {
        warn!("server.api_key not set, API is unauthenticated");
    }

    let app = api::router(Arc::clone(&state));
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    info!(addr = %bind_addr, store = state.service.store().kind(), "starting wallet HTTP server");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown requested");
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let invocation = cli::parse_args(std::env::args()).map_err(anyhow::Error::msg)?;
    let config = match &invocation.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let (dispatch, _otel_guard) =
        common::observability::build_dispatch("wallet", &config.general.log_level);
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    let backend = connect(&config).await?;
    let session = backend.session.clone();
    let service = WalletService::new(backend.store);

    let result = if invocation.command == cli::Command::Serve {
        serve(&config, service, session.clone(), backend.realtime_url).await
    } else {
        cli::run_command(&service, &session, invocation.command).await
    };

    if let Some(client) = backend.sign_out_with {
        if let Err(e) = client.sign_out(&session).await {
            warn!(error = %e, "sign-out failed");
        }
    }

    result
}

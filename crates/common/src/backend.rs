use chrono::Utc;
use reqwest::{Method, RequestBuilder, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::StoreError;
use crate::store::LedgerStore;
use crate::types::{LedgerEntry, NewLedgerEntry, Session, WalletAccount};

/// Client for the managed backend: PostgREST tables under `/rest/v1`,
/// GoTrue auth under `/auth/v1`, realtime websocket under `/realtime/v1`.
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    anon_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct NewWallet<'a> {
    user_id: &'a str,
}

#[derive(Serialize)]
struct BalancePatch {
    balance: Decimal,
    updated_at: String,
}

impl BackendClient {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| StoreError::Http {
                endpoint: "client",
                source,
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    pub fn wallet_query_url(&self, user_id: &str) -> String {
        format!(
            "{}?select=*&user_id=eq.{}&limit=1",
            self.table_url("wallets"),
            urlencoding::encode(user_id)
        )
    }

    pub fn entries_query_url(&self, wallet_id: &str) -> String {
        format!(
            "{}?select=*&wallet_id=eq.{}&order=created_at.desc",
            self.table_url("transactions"),
            urlencoding::encode(wallet_id)
        )
    }

    /// Websocket endpoint for realtime change notifications.
    pub fn realtime_url(&self) -> Result<String, StoreError> {
        let mut url = Url::parse(&format!("{}/realtime/v1/websocket", self.base_url))
            .map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| StoreError::InvalidUrl(format!("cannot switch {} to {scheme}", self.base_url)))?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.anon_key)
            .append_pair("vsn", "1.0.0");
        Ok(url.to_string())
    }

    /// Sign in with email and password; returns the session for later calls.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, StoreError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let req = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&PasswordGrant { email, password });
        let token: TokenResponse = self.send_json("auth_token", req).await?;
        Ok(Session {
            user_id: token.user.id,
            access_token: Some(token.access_token),
        })
    }

    /// Resolve an existing access token into a session.
    pub async fn session_from_token(&self, access_token: &str) -> Result<Session, StoreError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let req = self
            .client
            .get(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);
        let user: AuthUser = self.send_json("auth_user", req).await?;
        Ok(Session {
            user_id: user.id,
            access_token: Some(access_token.to_string()),
        })
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), StoreError> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let req = self.authed(Method::POST, &url, session)?;
        self.send("auth_logout", req).await.map(drop)
    }

    fn authed(
        &self,
        method: Method,
        url: &str,
        session: &Session,
    ) -> Result<RequestBuilder, StoreError> {
        let token = session.access_token.as_deref().ok_or_else(|| {
            StoreError::Unauthenticated(format!("no access token for user {}", session.user_id))
        })?;
        Ok(self
            .client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token))
    }

    async fn send(
        &self,
        endpoint: &'static str,
        req: RequestBuilder,
    ) -> Result<reqwest::Response, StoreError> {
        let start = Instant::now();
        let res = req.send().await;
        let ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("wallet_backend_latency_ms", "endpoint" => endpoint).record(ms);

        let resp = match res {
            Ok(resp) => resp,
            Err(source) => {
                metrics::counter!("wallet_backend_requests_total", "endpoint" => endpoint, "status" => "error")
                    .increment(1);
                return Err(StoreError::Http { endpoint, source });
            }
        };

        let status = resp.status();
        if !status.is_success() {
            metrics::counter!("wallet_backend_requests_total", "endpoint" => endpoint, "status" => "error")
                .increment(1);
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        metrics::counter!("wallet_backend_requests_total", "endpoint" => endpoint, "status" => "ok")
            .increment(1);
        debug!(endpoint, status = status.as_u16(), ms, "backend request");
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        req: RequestBuilder,
    ) -> Result<T, StoreError> {
        let resp = self.send(endpoint, req).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|source| StoreError::Http { endpoint, source })?;
        serde_json::from_slice(&body).map_err(|source| StoreError::Decode { endpoint, source })
    }
}

impl LedgerStore for BackendClient {
    async fn fetch_wallet(&self, session: &Session) -> Result<Option<WalletAccount>, StoreError> {
        let url = self.wallet_query_url(&session.user_id);
        let req = self.authed(Method::GET, &url, session)?;
        let rows: Vec<WalletAccount> = self.send_json("wallets", req).await?;
        Ok(rows.into_iter().next())
    }

    async fn create_wallet(&self, session: &Session) -> Result<WalletAccount, StoreError> {
        let url = self.table_url("wallets");
        let req = self
            .authed(Method::POST, &url, session)?
            .header("Prefer", "return=representation")
            .json(&NewWallet {
                user_id: &session.user_id,
            });
        let rows: Vec<WalletAccount> = self.send_json("wallets", req).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("created wallet for {}", session.user_id)))
    }

    async fn update_balance(
        &self,
        session: &Session,
        wallet_id: &str,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        let url = format!(
            "{}?id=eq.{}",
            self.table_url("wallets"),
            urlencoding::encode(wallet_id)
        );
        let req = self
            .authed(Method::PATCH, &url, session)?
            .header("Prefer", "return=representation")
            .json(&BalancePatch {
                balance,
                updated_at: Utc::now().to_rfc3339(),
            });
        // Row-level security filters silently, so zero rows means not found.
        let rows: Vec<WalletAccount> = self.send_json("wallets", req).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("wallet {wallet_id}")));
        }
        Ok(())
    }

    async fn append_entry(
        &self,
        session: &Session,
        entry: &NewLedgerEntry,
    ) -> Result<LedgerEntry, StoreError> {
        let url = self.table_url("transactions");
        let req = self
            .authed(Method::POST, &url, session)?
            .header("Prefer", "return=representation")
            .json(entry);
        let rows: Vec<LedgerEntry> = self.send_json("transactions", req).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound("inserted transaction".to_string()))
    }

    async fn fetch_entries(
        &self,
        session: &Session,
        wallet_id: &str,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let url = self.entries_query_url(wallet_id);
        let req = self.authed(Method::GET, &url, session)?;
        self.send_json("transactions", req).await
    }
}

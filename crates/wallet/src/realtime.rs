//! Change feed from the backend's realtime websocket.
//!
//! Joins one channel per watched table and forwards every row change as a
//! [`Change`]. Every successful join is followed by [`Change::resync`], since
//! rows may have changed while the socket was down. The consumer decides
//! what to refresh.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::REALTIME_RECONNECTS;

pub const WATCHED_TABLES: [&str; 2] = ["transactions", "wallets"];
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

pub const RESYNC: &str = "RESYNC";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub table: String,
    /// `INSERT`, `UPDATE`, `DELETE`, or [`RESYNC`] after a (re)join.
    pub kind: String,
}

impl Change {
    /// Anything may have changed: emitted once the channels are joined.
    pub fn resync() -> Self {
        Self {
            table: "*".to_string(),
            kind: RESYNC.to_string(),
        }
    }
}

pub fn topic_for(table: &str) -> String {
    format!("realtime:public:{table}")
}

pub fn join_message(table: &str, access_token: Option<&str>, msg_ref: u64) -> String {
    let mut payload = json!({
        "config": {
            "postgres_changes": [
                { "event": "*", "schema": "public", "table": table }
            ]
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = Value::String(token.to_string());
    }
    json!({
        "topic": topic_for(table),
        "event": "phx_join",
        "payload": payload,
        "ref": msg_ref.to_string(),
    })
    .to_string()
}

pub fn heartbeat_message(msg_ref: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
    .to_string()
}

#[derive(Deserialize)]
struct Envelope {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
}

const ROW_EVENTS: [&str; 3] = ["INSERT", "UPDATE", "DELETE"];

/// Decode a server frame into a row change. Replies, presence and system
/// frames yield `None`.
pub fn parse_change(text: &str) -> Option<Change> {
    let env: Envelope = serde_json::from_str(text).ok()?;
    let topic_table = env.topic.strip_prefix("realtime:public:")?;

    if env.event == "postgres_changes" {
        let data = env.payload.get("data")?;
        let kind = data.get("type")?.as_str()?;
        let table = data
            .get("table")
            .and_then(Value::as_str)
            .unwrap_or(topic_table);
        return ROW_EVENTS.contains(&kind).then(|| Change {
            table: table.to_string(),
            kind: kind.to_string(),
        });
    }

    ROW_EVENTS.contains(&env.event.as_str()).then(|| Change {
        table: env
            .payload
            .get("table")
            .and_then(Value::as_str)
            .unwrap_or(topic_table)
            .to_string(),
        kind: env.event,
    })
}

pub fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// Keep a realtime subscription alive until `cancel` fires, reconnecting with
/// exponential backoff. Each change is sent on `changes`.
pub async fn run_change_feed(
    url: String,
    access_token: Option<String>,
    changes: mpsc::Sender<Change>,
    cancel: CancellationToken,
) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws_stream, _response)) => {
                info!("realtime connected");
                backoff = INITIAL_BACKOFF;
                match listen(ws_stream, access_token.as_deref(), &changes, &cancel).await {
                    Ok(()) => debug!("realtime connection closed"),
                    Err(e) => warn!(error = %e, "realtime connection lost"),
                }
            }
            Err(e) => warn!(error = %e, "failed to connect to realtime endpoint"),
        }

        if cancel.is_cancelled() || changes.is_closed() {
            break;
        }

        metrics::counter!(REALTIME_RECONNECTS).increment(1);
        debug!(delay_secs = backoff.as_secs(), "realtime reconnect scheduled");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = next_backoff(backoff);
    }

    info!("realtime feed stopped");
}

async fn listen<S>(
    mut ws_stream: tokio_tungstenite::WebSocketStream<S>,
    access_token: Option<&str>,
    changes: &mpsc::Sender<Change>,
    cancel: &CancellationToken,
) -> Result<(), tungstenite::Error>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut msg_ref = 0u64;
    for table in WATCHED_TABLES {
        msg_ref += 1;
        ws_stream
            .send(Message::Text(join_message(table, access_token, msg_ref)))
            .await?;
    }
    debug!(tables = ?WATCHED_TABLES, "joined realtime channels");
    if changes.send(Change::resync()).await.is_err() {
        let _ = ws_stream.close(None).await;
        return Ok(());
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_stream.close(None).await;
                return Ok(());
            }
            _ = heartbeat.tick() => {
                msg_ref += 1;
                ws_stream.send(Message::Text(heartbeat_message(msg_ref))).await?;
            }
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let Some(change) = parse_change(&text) else {
                            continue;
                        };
                        debug!(table = %change.table, kind = %change.kind, "realtime change");
                        if changes.send(change).await.is_err() {
                            let _ = ws_stream.close(None).await;
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Err(e)) => return Err(e),
                    _ => {}
                }
            }
        }
    }
}

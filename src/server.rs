use std::future::Future;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

use crate::broadcast::Broadcaster;
use crate::error::IngressError;
use crate::models::{kind, now_ms};

pub const READY_TEXT: &str = "Server is running. POST /log or connect via WebSocket.";

/// Shared relay state
/// Holds no log history: events are relayed and forgotten
#[derive(Clone, Default)]
pub struct AppState {
    pub broadcaster: Broadcaster,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/ws", get(push_channel))
        .route("/log", post(ingest_log))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "relay listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Health text, or the push channel when the request is an upgrade
async fn root(state: State<AppState>, ws: Option<WebSocketUpgrade>) -> Response {
    match ws {
        Some(ws) => push_channel(ws, state).await,
        None => READY_TEXT.into_response(),
    }
}

async fn push_channel(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| relay_socket(socket, state.broadcaster))
}

/// Accept one event from a producer and fan it out
/// Acknowledged once handed off, whether or not anyone is listening
async fn ingest_log(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, IngressError> {
    let log = parse_log_body(&body)?;
    info!(log = %log, "log received");

    let envelope = log_envelope(log, now_ms());
    let report = state.broadcaster.broadcast(&envelope.to_string());
    debug!(delivered = report.delivered, skipped = report.skipped, "log broadcast");

    Ok(StatusCode::OK)
}

pub fn parse_log_body(body: &[u8]) -> Result<Value, IngressError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(IngressError::MissingBody);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Null) => Err(IngressError::MissingBody),
        Ok(value) => Ok(value),
        Err(e) => Err(IngressError::Malformed(e.to_string())),
    }
}

/// `{type: "log", ...fields, ts}`: producer fields override `type`,
/// the server receive time always overrides `ts`.
/// Bodies that are not objects travel under `text`.
pub fn log_envelope(log: Value, received_at: i64) -> Value {
    let mut fields = Map::new();
    fields.insert("type".to_string(), Value::from("log"));
    match log {
        Value::Object(map) => fields.extend(map),
        other => {
            fields.insert("text".to_string(), other);
        }
    }
    fields.insert("ts".to_string(), Value::from(received_at));
    Value::Object(fields)
}

pub fn greeting() -> String {
    json!({ "type": kind::SYSTEM, "msg": "connected to server" }).to_string()
}

async fn relay_socket(socket: WebSocket, broadcaster: Broadcaster) {
    let mut subscription = broadcaster.subscribe();
    let id = subscription.id();
    let (mut sink, mut stream) = socket.split();

    if sink.send(Message::Text(greeting())).await.is_err() {
        return;
    }
    info!(subscriber = %id, subscribers = broadcaster.subscriber_count(), "websocket client connected");

    loop {
        tokio::select! {
            frame = subscription.recv() => {
                let Some(frame) = frame else { break };
                if sink.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    debug!(subscriber = %id, payload = %text, "client message");
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    drop(subscription);
    info!(subscriber = %id, "websocket client disconnected");
}

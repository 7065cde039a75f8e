use crate::state::DashboardState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const READ_DEADLINE: Duration = Duration::from_secs(60);
const OUTBOUND_QUEUE: usize = 64;

/// `/ws` upgrade handler. The origin check allows an absent `Origin` header
/// or one matching the request host; the client set is bounded.
pub async fn ws_handler(
    State(state): State<Arc<DashboardState>>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
) -> Response {
    if !origin_allowed(&headers) {
        return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
    }

    if state.client_count() >= state.config.max_clients {
        return (StatusCode::SERVICE_UNAVAILABLE, "Maximum clients reached").into_response();
    }

    ws.on_upgrade(move |socket| client_loop(state, socket))
}

pub(crate) fn origin_allowed(headers: &HeaderMap) -> bool {
    let Some(origin) = headers.get("origin").and_then(|v| v.to_str().ok()) else {
        return true;
    };
    let Some(host) = headers.get("host").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let origin_host = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
        .unwrap_or(origin);
    origin_host == host
}

async fn client_loop(state: Arc<DashboardState>, socket: WebSocket) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
    let client_id = state.register_client(outbound_tx);
    let mut stop_rx = state.stop_rx();

    let (mut sink, mut stream) = socket.split();

    // Writer: queued frames plus a periodic ping.
    let mut writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ping.tick().await;
        loop {
            tokio::select! {
                frame = outbound_rx.recv() => {
                    let Some(frame) = frame else { break };
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    // Reader: any inbound frame (pongs included) extends the idle deadline.
    loop {
        tokio::select! {
            inbound = tokio::time::timeout(READ_DEADLINE, stream.next()) => {
                match inbound {
                    Ok(Some(Ok(_))) => continue,
                    // Deadline passed, stream error, or clean close.
                    _ => break,
                }
            }
            _ = stop_rx.changed() => break,
            _ = &mut writer => break,
        }
    }

    state.remove_client(client_id);
    writer.abort();
}

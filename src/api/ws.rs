//! The persistent voting socket
//!
//! One task per connection. Outbound pushes arrive on the session's
//! channel and inbound frames are read in strict receipt order, both
//! multiplexed through one select loop so no second writer task is
//! needed. Client identity is the peer address and port at accept time;
//! it is not authentication.
use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::state::SharedState;
use crate::error::TallyError;
use crate::messages::{ClientMessage, ServerMessage};

pub async fn websocket(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_session(socket, addr, state))
}

async fn client_session(mut socket: WebSocket, addr: SocketAddr, state: SharedState) {
    let client_id = addr.to_string();
    info!(client_id, "client connected");

    let snapshot = match state.core.lock() {
        Ok(core) => core.ledger.snapshot(),
        Err(err) => {
            error!(client_id, err = format!("{:?}", err), "vote core lock poisoned");
            return;
        }
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = state.registry.register(&client_id, tx.clone(), snapshot);

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                // channel closes only if the session is deregistered elsewhere
                let Some(msg) = outbound else { break };
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(err) => {
                        error!(client_id, err = format!("{:?}", err), "failed to encode message");
                        continue;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&state, &client_id, &tx, &text);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // axum answers pings itself; ignore other frame types
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(client_id, err = format!("{:?}", err), "socket error");
                        break;
                    }
                }
            }
        }
    }

    state.registry.deregister(session);
    info!(client_id, "client disconnected");
}

/// Parse one inbound frame and run it through the vote pipeline. An
/// accepted vote is broadcast to every session after the core lock is
/// released; a rejection goes back to the requester only.
fn handle_frame(
    state: &SharedState,
    client_id: &str,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    text: &str,
) {
    let option_ids = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Vote { option_ids }) => option_ids,
        Err(err) => {
            // malformed frame: no history, no limiter consumption
            debug!(client_id, err = format!("{}", err), "malformed request");
            let rejection = TallyError::MalformedRequest(err.to_string());
            let _ = tx.send(ServerMessage::rejection(&rejection));
            return;
        }
    };

    let outcome = match state.core.lock() {
        Ok(mut core) => core.handle_vote(client_id, &option_ids),
        Err(err) => Err(TallyError::Concurrency(format!(
            "vote core lock poisoned: {:?}",
            err
        ))),
    };

    match outcome {
        Ok(snapshot) => state.registry.broadcast(ServerMessage::Update { poll: snapshot }),
        Err(err) => {
            let _ = tx.send(ServerMessage::rejection(&err));
        }
    }
}

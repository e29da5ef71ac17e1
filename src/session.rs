//! C11 — transport adapter (§4.10).
//!
//! `Session` is the abstraction [`crate::dispatcher::SessionDispatcher`] actually programs
//! against, so the core logic never touches `warp` directly. `WsSession` is the only concrete
//! implementation: a `warp::ws::WebSocket` split into sink/stream halves and driven by two tasks
//! per connection, mirroring the teacher's `main.rs` `ws.on_upgrade` + `mpsc` hand-off shape and
//! `room.rs`'s `BroadcastStream::new(...).map(...)` pattern for turning a broadcast receiver into
//! a forwarding stream.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};
use warp::ws::{Message, WebSocket};

use crate::ids::SessionId;
use crate::protocol::{Ack, BroadcastEvent, ClientRequest};

#[async_trait]
pub trait Session: Send + Sync {
    fn session_id(&self) -> SessionId;
    async fn send_ack(&self, ack: Ack);
    async fn send_event(&self, event: BroadcastEvent);

    /// Spawns a task that forwards a conference's room broadcasts to this session. Must be called
    /// synchronously as part of a successful `joinConference`, before the ack reaches the caller —
    /// `broadcast::Receiver` only sees messages sent after it subscribes, so a session that
    /// subscribes later can silently miss a broadcast racing the join (§3).
    fn subscribe_room(&self, room_rx: tokio::sync::broadcast::Receiver<BroadcastEvent>);
}

/// The `warp::ws::WebSocket` transport. Outbound messages (acks and room broadcasts) are
/// funneled through a single `mpsc` channel so the two concerns never race on the socket sink.
#[derive(Clone)]
pub struct WsSession {
    id: SessionId,
    outbound: mpsc::Sender<Message>,
}

#[async_trait]
impl Session for WsSession {
    fn session_id(&self) -> SessionId {
        self.id
    }

    async fn send_ack(&self, ack: Ack) {
        send_json(&self.outbound, &ack).await;
    }

    async fn send_event(&self, event: BroadcastEvent) {
        send_json(&self.outbound, &event).await;
    }

    fn subscribe_room(&self, room_rx: tokio::sync::broadcast::Receiver<BroadcastEvent>) {
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            let mut room = BroadcastStream::new(room_rx);
            while let Some(event) = room.next().await {
                match event {
                    Ok(event) => send_json(&outbound, &event).await,
                    Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
                        log::warn!("session lagged behind room broadcast by {} message(s)", skipped);
                    }
                }
            }
        });
    }
}

async fn send_json(outbound: &mpsc::Sender<Message>, value: &impl serde::Serialize) {
    match serde_json::to_string(value) {
        Ok(text) => {
            if outbound.send(Message::text(text)).await.is_err() {
                log::debug!("outbound channel closed before send");
            }
        }
        Err(err) => log::error!("failed to serialize outbound message: {}", err),
    }
}

/// Splits the socket into sink/stream halves and spawns the outbound forwarding task. Returns
/// the constructed [`WsSession`] and a stream of parsed inbound requests the caller drives until
/// it ends (disconnect). Call [`Session::subscribe_room`] once the session joins a conference.
pub fn wrap(websocket: WebSocket) -> (WsSession, impl futures::Stream<Item = ClientRequest>) {
    let (mut ws_tx, ws_rx) = websocket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel::<Message>(64);

    tokio::spawn(async move {
        let mut outbound = ReceiverStream::new(outbound_rx);
        while let Some(message) = outbound.next().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    let session = WsSession {
        id: SessionId::new(),
        outbound: outbound_tx,
    };

    let requests = ws_rx.filter_map(|msg| async move {
        let msg = msg.ok()?;
        if !msg.is_text() {
            return None;
        }
        match serde_json::from_str::<ClientRequest>(msg.to_str().ok()?) {
            Ok(request) => Some(request),
            Err(err) => {
                log::warn!("dropping malformed client request: {}", err);
                None
            }
        }
    });

    (session, requests)
}

//! WebSocket transport: connection acceptance, the `auth` handshake, and
//! the per-connection frame dispatch loop.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use blob_core::{Key, ServiceError};
use blob_registry::ConnId;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};

use crate::protocol::{
    InboundFrame, OutboundEvent, parse_auth_token, parse_known_version, parse_ref_payload,
    parse_set_payload,
};
use crate::session::Session;
use crate::state::{AppState, PeerHandle};

/// Accepts connections on `listener`, spawning one task per connection,
/// until `shutdown` fires.
pub async fn accept_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        tracing::warn!(%err, "failed to accept connection");
                        continue;
                    }
                };
                let state = state.clone();
                tokio::spawn(handle_connection(stream, addr, state));
            }
            _ = shutdown.changed() => {
                tracing::info!("listener stopped accepting new connections");
                break;
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, state: Arc<AppState>) {
    let real_ip: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let captured = real_ip.clone();
    let callback = move |req: &Request, response: Response| {
        if let Some(value) = req
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
        {
            *captured.lock().unwrap() = Some(value.to_string());
        }
        Ok(response)
    };

    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(err) => {
            tracing::warn!(%err, %addr, "websocket upgrade failed");
            return;
        }
    };

    let ip = real_ip
        .lock()
        .unwrap()
        .clone()
        .unwrap_or_else(|| addr.ip().to_string());

    let (mut sink, mut stream) = ws_stream.split();
    let conn_id = state.next_conn_id();
    let (peer_tx, mut peer_rx) = mpsc::unbounded_channel::<OutboundEvent>();

    let Some(Ok(first)) = stream.next().await else {
        return;
    };
    let Some(text) = as_text(first) else {
        return;
    };
    let mut session = match authenticate(&state, &ip, &text).await {
        Ok((id, session)) => {
            let ack = json!({ "ack": id, "data": { "bucket": session.bucket.as_str() } });
            if sink.send(Message::text(ack.to_string())).await.is_err() {
                return;
            }
            session
        }
        Err(()) => {
            tracing::warn!(conn_id, %addr, "handshake failed, refusing connection");
            return;
        }
    };

    tracing::info!(conn_id, bucket = %session.bucket, "connection authenticated");

    loop {
        tokio::select! {
            inbound = stream.next() => {
                let Some(message) = inbound else { break };
                let Some(message) = message.ok() else { break };
                let Some(text) = as_text(message) else { continue };
                let frame: InboundFrame = match serde_json::from_str(&text) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::warn!(conn_id, %err, "could not parse inbound frame, closing");
                        break;
                    }
                };

                match dispatch(&state, &mut session, conn_id, &peer_tx, frame).await {
                    DispatchOutcome::Ack(ack) => {
                        if sink.send(Message::text(ack.to_string())).await.is_err() {
                            break;
                        }
                    }
                    DispatchOutcome::AckAndFanOut(ack, key) => {
                        if sink.send(Message::text(ack.to_string())).await.is_err() {
                            break;
                        }
                        for handle in state.subs.peers(&key, conn_id) {
                            let _ = handle.send(OutboundEvent::Changed);
                        }
                    }
                    DispatchOutcome::Close => break,
                }
            }
            event = peer_rx.recv() => {
                let Some(event) = event else { continue };
                let frame = serde_json::to_string(&event.to_frame())
                    .expect("EventFrame always serializes");
                if sink.send(Message::text(frame)).await.is_err() {
                    break;
                }
            }
        }
    }

    session.disconnect(conn_id, &state.subs);
    tracing::info!(conn_id, "connection closed");
}

/// The first frame on a connection must be `{"event": "auth", "id": ...,
/// "data": {"token": "..."}}`. Any deviation refuses the connection
/// outright, per the access-denial contract: the caller never learns
/// which check failed.
async fn authenticate(
    state: &AppState,
    ip: &str,
    text: &str,
) -> Result<(u64, Session), ()> {
    let frame: InboundFrame = serde_json::from_str(text).map_err(|_| ())?;
    if frame.event != "auth" {
        return Err(());
    }
    let id = frame.id.ok_or(())?;
    let token = parse_auth_token(&frame.data).map_err(|_| ())?;
    let bucket = state.verifier.verify(token).map_err(|_| ())?;
    Ok((id, Session::new(bucket, ip.to_string())))
}

enum DispatchOutcome {
    Ack(Value),
    AckAndFanOut(Value, Key),
    Close,
}

async fn dispatch(
    state: &AppState,
    session: &mut Session,
    conn_id: ConnId,
    peer_tx: &PeerHandle,
    frame: InboundFrame,
) -> DispatchOutcome {
    let InboundFrame { event, id, data } = frame;

    let Some(id) = id else {
        tracing::warn!(conn_id, %event, "frame missing ack id, closing connection");
        return DispatchOutcome::Close;
    };

    let _permit = state.gate.enter().await;

    let (reply, fan_out_key): (Value, Option<Key>) = match event.as_str() {
        "now" => (session.now(), None),
        "ref" => {
            match parse_ref_payload(&data).and_then(|raw| {
                session.set_ref(conn_id, peer_tx, &state.subs, raw)
            }) {
                Ok(()) => (json!({}), None),
                Err(err) => (error_payload(&err), None),
            }
        }
        "get" => match parse_known_version(&data) {
            Ok(known) => match session.get(state.store.as_ref(), &state.key_locks, known).await {
                Ok(value) => (value, None),
                Err(err) => (error_payload(&err), None),
            },
            Err(err) => (error_payload(&err), None),
        },
        "set" => match parse_set_payload(&data) {
            Ok((text, version)) => match session
                .set(state.store.as_ref(), &state.key_locks, text, version)
                .await
            {
                Ok(outcome) => (outcome.ack, outcome.fan_out_key),
                Err(err) => (error_payload(&err), None),
            },
            Err(err) => (error_payload(&err), None),
        },
        other => {
            tracing::warn!(conn_id, event = other, "unknown event");
            (json!({ "error": "unknown event" }), None)
        }
    };

    let ack = json!({ "ack": id, "data": reply });
    match fan_out_key {
        Some(key) => DispatchOutcome::AckAndFanOut(ack, key),
        None => DispatchOutcome::Ack(ack),
    }
}

fn error_payload(err: &ServiceError) -> Value {
    json!({ "error": err.client_message() })
}

fn as_text(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text.to_string()),
        _ => None,
    }
}

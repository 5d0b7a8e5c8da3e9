use crate::error::RelayError;
use crate::metrics::{counters, gauges, histograms};
use crate::registry::ConnHandle;
use crate::server::ServerState;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use relay_common::types::ENDPOINT_PATH;
use relay_common::{ClientFrame, ClientId, ServerFrame};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsRecv = SplitStream<WebSocketStream<TcpStream>>;

/// Frames buffered towards a connection before senders start to stall.
const DELIVERY_BUFFER: usize = 256;

pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), RelayError> {
    let ws_config = WebSocketConfig {
        max_message_size: Some(state.config.max_message_size),
        max_frame_size: Some(state.config.max_message_size),
        ..WebSocketConfig::default()
    };

    let ws_stream = tokio_tungstenite::accept_hdr_async_with_config(
        stream,
        |req: &Request, resp: Response| {
            if req.uri().path() == ENDPOINT_PATH {
                Ok(resp)
            } else {
                debug!(path = %req.uri().path(), "rejecting upgrade on unknown path");
                let mut not_found = ErrorResponse::new(Some("not found".to_owned()));
                *not_found.status_mut() = StatusCode::NOT_FOUND;
                Err(not_found)
            }
        },
        Some(ws_config),
    )
    .await
    .map_err(RelayError::WebSocket)?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (deliver_tx, mut deliver_rx) = mpsc::channel::<String>(DELIVERY_BUFFER);
    let connected_at = Instant::now();

    gauges::inc_connections_active();
    debug!(peer = %peer_addr, "websocket established");

    // Identity this connection most recently registered under. Used for
    // exactly-once cleanup on teardown, whatever path ends the loop.
    let mut bound_uuid: Option<ClientId> = None;

    let result = run_message_loop(
        &mut ws_tx,
        &mut ws_rx,
        &mut deliver_rx,
        &state,
        &deliver_tx,
        connected_at,
        &mut bound_uuid,
    )
    .await;

    if let Some(uuid) = bound_uuid {
        state.registry.unregister(&uuid, connected_at);
    }
    gauges::dec_connections_active();

    result
}

/// Drive the select loop for one connection: inbound frames, frames
/// routed here by other connections, and transport keepalive pings.
async fn run_message_loop(
    ws_tx: &mut WsSink,
    ws_rx: &mut WsRecv,
    deliver_rx: &mut mpsc::Receiver<String>,
    state: &ServerState,
    deliver_tx: &mpsc::Sender<String>,
    connected_at: Instant,
    bound_uuid: &mut Option<ClientId>,
) -> Result<(), RelayError> {
    let mut ping_interval = interval(Duration::from_secs(state.config.ping_interval));

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(raw))) => {
                        let start = Instant::now();
                        process_frame(&raw, state, ws_tx, deliver_tx, connected_at, bound_uuid)
                            .await?;
                        histograms::dispatch_seconds(start.elapsed().as_secs_f64());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_tx.send(Message::Pong(data)).await {
                            debug!("failed to send pong: {}", e);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Err(e)) => return Err(RelayError::WebSocket(e)),
                    // binary frames are not part of the protocol
                    _ => {}
                }
            }
            Some(text) = deliver_rx.recv() => {
                ws_tx.send(Message::Text(text)).await.map_err(RelayError::WebSocket)?;
            }
            _ = ping_interval.tick() => {
                if let Err(e) = ws_tx.send(Message::Ping(Vec::new())).await {
                    debug!("failed to send keepalive ping: {}", e);
                }
            }
        }
    }
}

/// Dispatch one inbound text frame.
///
/// Unparseable input is discarded without closing the connection; only
/// failures writing to this connection's own socket propagate.
async fn process_frame(
    raw: &str,
    state: &ServerState,
    ws_tx: &mut WsSink,
    deliver_tx: &mpsc::Sender<String>,
    connected_at: Instant,
    bound_uuid: &mut Option<ClientId>,
) -> Result<(), RelayError> {
    let Some(frame) = ClientFrame::parse(raw) else {
        counters::frames_dropped_total("unparseable");
        debug!("discarding unparseable frame");
        return Ok(());
    };
    let kind = frame.kind();

    match frame {
        ClientFrame::Register { uuid, public_key } => {
            let handle = ConnHandle {
                tx: deliver_tx.clone(),
                connected_at,
            };
            state.registry.register(&uuid, handle, public_key);
            counters::registrations_total();
            let ack = ServerFrame::Registered { uuid: uuid.clone() };
            *bound_uuid = Some(uuid);
            send_direct(ws_tx, &ack).await?;
        }
        ClientFrame::GetPublicKey { target, from } => {
            // an empty cached key counts as a miss: the owner registered
            // without supplying key material
            let cached = state
                .registry
                .public_key(&target)
                .filter(|key| !key.is_empty());
            let reply = match cached {
                Some(public_key) => ServerFrame::PublicKeyResponse { target, public_key },
                None => ServerFrame::key_not_found(&target),
            };
            // Routed to the reported `from`, not this socket: a lookup
            // may be requested on behalf of another identity.
            state.registry.send_to(&from, reply.to_text()).await;
        }
        ClientFrame::Message { to, from: _ } => {
            if state.registry.send_to(&to, raw.to_owned()).await {
                counters::frames_relayed_total(kind);
            } else {
                counters::frames_dropped_total("offline");
                // unregistered senders get silent drops
                if bound_uuid.is_some() {
                    send_direct(ws_tx, &ServerFrame::recipient_offline(&to)).await?;
                }
            }
        }
        ClientFrame::WebrtcOffer { to } => {
            if state.registry.send_to(&to, raw.to_owned()).await {
                counters::frames_relayed_total(kind);
            } else {
                counters::frames_dropped_total("offline");
                if bound_uuid.is_some() {
                    send_direct(ws_tx, &ServerFrame::callee_offline(&to)).await?;
                }
            }
        }
        ClientFrame::FileChunk { to }
        | ClientFrame::WebrtcAnswer { to }
        | ClientFrame::WebrtcIce { to } => {
            // fire-and-forget kinds: no failure notice in any case
            if state.registry.send_to(&to, raw.to_owned()).await {
                counters::frames_relayed_total(kind);
            } else {
                counters::frames_dropped_total("offline");
            }
        }
        ClientFrame::Status { from } => {
            state.registry.broadcast_except(&from, raw).await;
            counters::frames_relayed_total(kind);
        }
    }

    Ok(())
}

/// Reply on this connection's own socket (registration acks and
/// failure notices). Routed traffic goes through the registry instead.
async fn send_direct(ws_tx: &mut WsSink, frame: &ServerFrame) -> Result<(), RelayError> {
    ws_tx
        .send(Message::Text(frame.to_text()))
        .await
        .map_err(RelayError::WebSocket)
}

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use relay_server::config::ServerConfig;
use relay_server::registry::Registry;
use relay_server::server::ServerState;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub fn test_config(listen: SocketAddr) -> ServerConfig {
    ServerConfig {
        listen,
        probe_addr: "127.0.0.1:0".parse().unwrap(),
        max_conns: 1000,
        max_message_size: 1 << 20,
        ping_interval: 30,
    }
}

pub struct TestClient {
    pub ws_tx: SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>,
    pub ws_rx: SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl TestClient {
    /// Open a WebSocket to the relay endpoint without registering.
    pub async fn connect(addr: &SocketAddr) -> Self {
        let url = format!("ws://{addr}/ws");
        let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        let (ws_tx, ws_rx) = ws.split();
        Self { ws_tx, ws_rx }
    }

    /// Connect, register under `uuid`, and consume the `registered` ack.
    pub async fn register(addr: &SocketAddr, uuid: &str, public_key: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client
            .send_json(&json!({
                "type": "register",
                "uuid": uuid,
                "public_key": public_key,
            }))
            .await;
        let ack = client.recv_json().await;
        assert_eq!(ack["type"], "registered");
        assert_eq!(ack["uuid"], uuid);
        client
    }

    pub async fn send_text(&mut self, raw: &str) {
        self.ws_tx
            .send(Message::Text(raw.to_string()))
            .await
            .unwrap();
    }

    pub async fn send_json(&mut self, value: &Value) {
        self.send_text(&value.to_string()).await;
    }

    /// Receive the next text frame as JSON, skipping keepalive frames.
    pub async fn recv_json(&mut self) -> Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), self.ws_rx.next())
                .await
                .expect("timeout waiting for frame")
                .unwrap()
                .unwrap();
            match msg {
                Message::Text(raw) => return serde_json::from_str(&raw).unwrap(),
                Message::Ping(_) | Message::Pong(_) => {}
                other => panic!("expected text frame, got {other:?}"),
            }
        }
    }

    pub async fn recv_json_timeout(&mut self, timeout: Duration) -> Option<Value> {
        tokio::time::timeout(timeout, self.recv_json()).await.ok()
    }

    /// Assert that nothing arrives within `timeout`.
    pub async fn expect_silence(&mut self, timeout: Duration) {
        if let Some(frame) = self.recv_json_timeout(timeout).await {
            panic!("expected silence, got {frame}");
        }
    }

    /// Close the connection and give the server a moment to tear down.
    pub async fn close(mut self) {
        self.ws_tx.send(Message::Close(None)).await.unwrap();
        drop(self.ws_tx);
        drop(self.ws_rx);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

pub async fn start_server() -> (SocketAddr, Arc<ServerState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(ServerState {
        registry: Registry::new(),
        config: test_config(addr),
        active_connections: AtomicUsize::new(0),
    });

    let state_clone = state.clone();
    tokio::spawn(async move {
        if let Err(e) = relay_server::run(listener, state_clone).await {
            eprintln!("server error in test: {e}");
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, state)
}

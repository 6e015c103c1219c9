//! WebSocket harness: runs the timeline server on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use quill_cli::commands::serve::{serve_on, ServerState};

/// Client side of one WebSocket connection.
pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a test waits for a reply before failing.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A running server bound to 127.0.0.1 on a free port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<ServerState>>,
    shutdown: Arc<broadcast::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Binds port 0 and starts accepting connections.
    pub async fn start(state: ServerState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let state = Arc::new(Mutex::new(state));
        let (shutdown, _) = broadcast::channel::<()>(1);
        let shutdown = Arc::new(shutdown);

        let handle = tokio::spawn(serve_on(
            listener,
            Arc::clone(&state),
            Arc::clone(&shutdown),
        ));

        Self {
            addr,
            state,
            shutdown,
            handle,
        }
    }

    /// Opens a new client connection.
    pub async fn connect(&self) -> Client {
        let url = format!("ws://{}", self.addr);
        let (ws, _) = connect_async(&url)
            .await
            .expect("Failed to connect to test server");
        ws
    }

    /// Signals shutdown and waits for the accept loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        timeout(RESPONSE_TIMEOUT, self.handle)
            .await
            .expect("Server did not shut down")
            .expect("Server task panicked");
    }
}

/// Sends one JSON request and waits for the text reply.
pub async fn request(client: &mut Client, body: Value) -> Value {
    client
        .send(Message::Text(body.to_string()))
        .await
        .expect("Failed to send request");

    loop {
        let msg = timeout(RESPONSE_TIMEOUT, client.next())
            .await
            .expect("Timed out waiting for response")
            .expect("Connection closed")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Response is not JSON");
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected message: {:?}", other),
        }
    }
}

//! WebSocket timeline server for editor clients.
//!
//! Every operation of the timeline store is exposed as a JSON request. All
//! requests go through one lock, so writes are applied one at a time in
//! arrival order.
//!
//! ## Protocol
//!
//! Requests are JSON objects with a `type` field:
//!
//! - `create_project`
//!   ```json
//!   {"type": "create_project", "name": "Demo", "tempo_bpm": 120, "time_signature": "4/4"}
//!   ```
//!
//! - `create_or_select_pattern`: bar click on a track
//!   ```json
//!   {"type": "create_or_select_pattern", "track_id": "<uuid>", "bar": 2}
//!   ```
//!
//! - `replace_notes`: save a whole grid
//!   ```json
//!   {"type": "replace_notes", "pattern_id": "<uuid>", "notes": [{"step_index": 0, "pitch": 36, "velocity": 100}]}
//!   ```
//!
//! See [`TimelineRequest`] for the full list. Responses use the
//! [`JsonOutput`](crate::commands::json_output::JsonOutput) envelope.

mod handler;
mod types;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio_tungstenite::tungstenite::Message;

pub use handler::{dispatch, handle_request, process_message, ServerState};
pub use types::TimelineRequest;

use super::CommandContext;

/// Run the WebSocket timeline server.
///
/// `host` and `port` override the `[server]` section of the configuration.
///
/// # Returns
/// Exit code: 0 on clean shutdown, 1 on error
pub fn run(ctx: &CommandContext, host: Option<String>, port: Option<u16>) -> Result<ExitCode> {
    let host = host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = port.unwrap_or(ctx.config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", host, port))?;

    let store = ctx.load_store()?;
    let state = ServerState::new(store, Some(ctx.store_path.clone()));

    // Build tokio runtime
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(async move { run_server(addr, state, ctx.store_path.clone()).await })
}

/// Run the WebSocket server (async entry point).
async fn run_server(addr: SocketAddr, state: ServerState, store_path: PathBuf) -> Result<ExitCode> {
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    eprintln!("Timeline server listening on ws://{}", addr);
    eprintln!("Store: {}", store_path.display());
    eprintln!("Press Ctrl+C to shutdown");

    let state = Arc::new(Mutex::new(state));

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_tx = Arc::new(shutdown_tx);

    // Set up SIGINT handler
    let shutdown_tx_clone = Arc::clone(&shutdown_tx);
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            eprintln!("\nShutting down...");
            let _ = shutdown_tx_clone.send(());
        }
    });

    serve_on(listener, state, shutdown_tx).await;
    eprintln!("Server shutdown complete");

    Ok(ExitCode::SUCCESS)
}

/// Accepts connections on `listener` until `shutdown` fires.
///
/// Each connection runs in its own task; all of them share `state`.
pub async fn serve_on(
    listener: TcpListener,
    state: Arc<Mutex<ServerState>>,
    shutdown: Arc<broadcast::Sender<()>>,
) {
    let mut stop = shutdown.subscribe();

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    log::warn!("accept error: {}", e);
                    continue;
                }
            },
            _ = stop.recv() => break,
        };

        log::info!("client {} connected", peer);
        tokio::spawn(handle_connection(
            stream,
            peer,
            Arc::clone(&state),
            shutdown.subscribe(),
        ));
    }
}

/// Serves timeline requests on one socket until the client leaves or the
/// server stops.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<Mutex<ServerState>>,
    mut stop: broadcast::Receiver<()>,
) {
    let socket = match tokio_tungstenite::accept_async(stream).await {
        Ok(socket) => socket,
        Err(e) => {
            log::warn!("WebSocket handshake with {} failed: {}", peer, e);
            return;
        }
    };
    let (mut sink, mut incoming) = socket.split();

    loop {
        let msg = tokio::select! {
            next = incoming.next() => match next {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    log::warn!("read from {} failed: {}", peer, e);
                    break;
                }
                // Client hung up.
                None => break,
            },
            _ = stop.recv() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        };

        let Some(reply) = handler::process_message(msg, &state).await else {
            continue;
        };
        if let Err(e) = sink.send(Message::Text(reply)).await {
            log::warn!("reply to {} failed: {}", peer, e);
            break;
        }
    }

    log::info!("client {} disconnected", peer);
}

//! TCP and optional WebSocket acceptors. Each accepted connection spawns
//! its own session task; a per-listener error is fatal (the process
//! returns it), but an individual session's errors never are.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use crate::session::{self, ServerContext};
use crate::ws::WsBinary;

pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    TcpListener::bind((host, port)).await.with_context(|| format!("bind listener on {host}:{port}"))
}

/// Run the TCP acceptor loop forever (until an accept error).
pub async fn serve_tcp(listener: TcpListener, ctx: Arc<ServerContext>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await.context("accept TCP connection")?;
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tracing::info!(%peer, "session accepted");
            if let Err(err) = session::run(stream, ctx).await {
                tracing::warn!(%peer, error = %err, "session ended with error");
            } else {
                tracing::info!(%peer, "session ended");
            }
        });
    }
}

/// Run the WebSocket acceptor loop forever (until an accept error).
/// Performs a permissive handshake (no subprotocol requirement) and feeds
/// binary frames through [`WsBinary`] so the session pipeline is unchanged.
pub async fn serve_ws(listener: TcpListener, ctx: Arc<ServerContext>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await.context("accept WebSocket connection")?;
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let ws_stream = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(err) => {
                    tracing::warn!(%peer, error = %err, "WebSocket handshake failed");
                    return;
                }
            };
            tracing::info!(%peer, "WebSocket session accepted");
            if let Err(err) = session::run(WsBinary::new(ws_stream), ctx).await {
                tracing::warn!(%peer, error = %err, "session ended with error");
            } else {
                tracing::info!(%peer, "session ended");
            }
        });
    }
}

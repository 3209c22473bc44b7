//! One accepted connection's full lifecycle: handshake, then a read loop
//! (parsing client messages) alongside a multiplexer task (owning session
//! state and pushing frames), torn down together on either side's exit.

pub mod events;
pub mod handshake;
pub mod multiplexer;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};

use crate::capture::FrameSource;
use crate::encodings::EncoderRegistry;
use crate::input::Injector;
use crate::security::SecurityRegistry;
use crate::wire::{spawn_writer, DynReadHalf, WireReader};

/// Everything a session needs that's shared server-wide (immutable after
/// construction) or is a per-session factory.
pub struct ServerContext {
    pub security: Arc<SecurityRegistry>,
    pub encoders: Arc<EncoderRegistry>,
    pub width: u16,
    pub height: u16,
    pub server_name: String,
    /// Each session owns its own capture producer (no multi-client fan-out
    /// of a single capture), so this builds a fresh one per session.
    pub frame_source_factory: Arc<dyn Fn() -> Arc<dyn FrameSource> + Send + Sync>,
    pub injector: Arc<dyn Injector>,
    /// Client message-type codes the event registry has enabled. A message
    /// of a known type whose code isn't in this set is parsed (to keep the
    /// stream aligned) but dropped rather than acted on.
    pub enabled_event_codes: std::collections::HashSet<u8>,
}

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Drive one client connection end-to-end. Returns once the session ends,
/// for any reason (clean disconnect, handshake failure, fatal I/O error).
pub async fn run<C>(stream: C, ctx: Arc<ServerContext>) -> Result<()>
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = WireReader::new(Box::new(read_half) as DynReadHalf);
    let (writer, writer_handle) = spawn_writer(write_half);

    handshake::run(&mut reader, &writer, &ctx.security, ctx.width, ctx.height, &ctx.server_name)
        .await
        .context("handshake")?;

    let frame_source = (ctx.frame_source_factory)();
    frame_source.start(ctx.width, ctx.height).await.context("start frame source")?;

    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (stop_tx, stop_rx) = watch::channel(false);

    let mut mux_handle = tokio::spawn(multiplexer::run(
        events_rx,
        stop_rx,
        writer.clone(),
        ctx.encoders.clone(),
        frame_source.clone(),
        ctx.injector.clone(),
    ));
    drop(writer);

    // Race the read loop against the multiplexer task so a fatal multiplexer
    // exit (e.g. a `SetEncodings` with no server-side match) cancels the read
    // loop immediately, instead of leaving it blocked on the next client byte.
    let read_result = tokio::select! {
        result = read_loop(&mut reader, events_tx, &ctx.enabled_event_codes) => result,
        join_result = &mut mux_handle => join_result.context("join multiplexer task")?,
    };

    let _ = stop_tx.send(true);
    if !mux_handle.is_finished() {
        let _ = mux_handle.await;
    }
    let _ = frame_source.close().await;
    writer_handle.await.context("join writer task")?.context("writer task")?;

    read_result
}

/// Parse client messages until disconnect or a fatal framing error.
/// Unrecognised message-type bytes are logged and skipped — tolerated
/// forward-compatibility, matching the session's error-handling policy.
async fn read_loop(
    reader: &mut WireReader<DynReadHalf>,
    events_tx: mpsc::Sender<events::ClientMessage>,
    enabled_event_codes: &std::collections::HashSet<u8>,
) -> Result<()> {
    loop {
        let message_type = match reader.read_u8().await {
            Ok(b) => b,
            Err(_) => return Ok(()), // client disconnected
        };
        match events::read_message(reader, message_type).await? {
            Some(msg) => {
                if !enabled_event_codes.contains(&message_type) {
                    tracing::debug!(message_type, "event type disabled by configuration, dropping");
                    continue;
                }
                if events_tx.send(msg).await.is_err() {
                    return Ok(()); // multiplexer gone
                }
            }
            None => tracing::warn!(message_type, "unsupported command type from client"),
        }
    }
}

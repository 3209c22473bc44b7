//! The per-session event multiplexer: owns the mutable session state
//! (pixel format, chosen encoder, held keys) exclusively, and is the single
//! `tokio::select!` fan-in point for parsed client messages, OS-injection
//! effects, and the periodic frame-push tick. Owning all of it in one task
//! is how `PixelFormat`/encoder reads (by the frame emitter) and writes (by
//! `SetPixelFormat`/`SetEncodings`) get serialized without a mutex.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::time::interval;

use super::events::ClientMessage;
use crate::capture::FrameSource;
use crate::encodings::{write_rectangle, Encoder, EncoderRegistry, RectGeometry};
use crate::input::Injector;
use crate::pixel_format::PixelFormat;
use crate::wire::WireWriter;

pub const TICK_PERIOD: Duration = Duration::from_millis(100);

struct State {
    pixel_format: PixelFormat,
    client_codes: Vec<i32>,
    encoder: Arc<dyn Encoder>,
    held_keys: Vec<u32>,
    update_since_last_tick: bool,
    /// RFC 6143 forbids a client from claiming `incremental=1` before it has
    /// ever seen a full update; this session enforces that regardless of
    /// what the client actually sends for its first request.
    sent_first_update: bool,
}

impl State {
    fn new(default_encoder: Arc<dyn Encoder>) -> Self {
        Self {
            pixel_format: PixelFormat::default_session(),
            client_codes: Vec::new(),
            encoder: default_encoder,
            held_keys: Vec::new(),
            update_since_last_tick: false,
            sent_first_update: false,
        }
    }
}

/// Run the multiplexer until the events channel closes (session shutdown)
/// or a fatal write error occurs.
pub async fn run(
    mut events_rx: mpsc::Receiver<ClientMessage>,
    mut stop_rx: watch::Receiver<bool>,
    writer: WireWriter,
    encoder_registry: Arc<EncoderRegistry>,
    frame_source: Arc<dyn FrameSource>,
    injector: Arc<dyn Injector>,
) -> Result<()> {
    let default_encoder = encoder_registry
        .by_code(0)
        .or_else(|| encoder_registry.enabled().first().cloned())
        .context("no encoders enabled on this server")?;
    let mut state = State::new(default_encoder);
    let mut ticker = interval(TICK_PERIOD);

    loop {
        tokio::select! {
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    return Ok(());
                }
            }
            msg = events_rx.recv() => {
                match msg {
                    Some(msg) => handle_message(msg, &mut state, &encoder_registry, &frame_source, &injector, &writer).await?,
                    None => return Ok(()), // read loop closed, session over
                }
            }
            _ = ticker.tick() => {
                if !state.update_since_last_tick {
                    push_full_frame(&frame_source, &state, &writer).await?;
                    state.sent_first_update = true;
                }
                state.update_since_last_tick = false;
            }
        }
    }
}

async fn handle_message(
    msg: ClientMessage,
    state: &mut State,
    encoder_registry: &EncoderRegistry,
    frame_source: &Arc<dyn FrameSource>,
    injector: &Arc<dyn Injector>,
    writer: &WireWriter,
) -> Result<()> {
    match msg {
        ClientMessage::SetPixelFormat(format) => {
            state.pixel_format = format;
        }
        ClientMessage::SetEncodings(codes) => {
            state.client_codes = codes.clone();
            if codes.is_empty() {
                tracing::warn!("SetEncodings with an empty list; defaulting to Raw");
                state.encoder = encoder_registry
                    .by_code(0)
                    .context("Raw encoder not enabled, cannot default")?;
            } else {
                state.encoder = encoder_registry
                    .select(&codes)
                    .with_context(|| format!("no enabled encoder matches client list {codes:?}"))?;
            }
        }
        ClientMessage::FramebufferUpdateRequest { incremental, x, y, width, height } => {
            let incremental = incremental && state.sent_first_update;
            if incremental {
                push_clipped_frame(frame_source, state, writer, x, y, width, height).await?;
            } else {
                push_full_frame(frame_source, state, writer).await?;
            }
            state.sent_first_update = true;
            state.update_since_last_tick = true;
        }
        ClientMessage::KeyEvent { down, keysym } => {
            if down {
                if !state.held_keys.contains(&keysym) {
                    state.held_keys.push(keysym);
                }
            } else {
                state.held_keys.retain(|&k| k != keysym);
            }
            injector.key_tap(&state.held_keys).await.context("inject key chord")?;
        }
        ClientMessage::PointerEvent { button_mask, x, y } => {
            injector.move_cursor(x, y).await.context("inject pointer move")?;
            let buttons = crate::input::decode_button_mask(button_mask);
            injector.set_buttons(&buttons).await.context("inject button state")?;
        }
        ClientMessage::ClientCutText(text) => {
            injector.write_clipboard(&text).await.context("inject clipboard text")?;
        }
    }
    Ok(())
}

fn framebuffer_update_header(rectangle_count: u16) -> Vec<u8> {
    let mut out = vec![0u8, 0u8];
    out.extend_from_slice(&rectangle_count.to_be_bytes());
    out
}

async fn push_full_frame(frame_source: &Arc<dyn FrameSource>, state: &State, writer: &WireWriter) -> Result<()> {
    let frame = frame_source.pull_frame().await.context("pull frame for full update")?;
    let geom = RectGeometry { x: 0, y: 0, width: frame.width, height: frame.height };
    send_rectangle(&frame.data, frame.width, state, geom, writer).await
}

async fn push_clipped_frame(
    frame_source: &Arc<dyn FrameSource>,
    state: &State,
    writer: &WireWriter,
    x: u16,
    y: u16,
    width: u16,
    height: u16,
) -> Result<()> {
    let frame = frame_source.pull_frame().await.context("pull frame for incremental update")?;
    let x = x.min(frame.width);
    let y = y.min(frame.height);
    let width = width.min(frame.width.saturating_sub(x));
    let height = height.min(frame.height.saturating_sub(y));
    let geom = RectGeometry { x, y, width, height };
    send_rectangle(&frame.data, frame.width, state, geom, writer).await
}

async fn send_rectangle(
    frame_data: &[u8],
    frame_width: u16,
    state: &State,
    geom: RectGeometry,
    writer: &WireWriter,
) -> Result<()> {
    let mut out = framebuffer_update_header(1);
    if let Err(err) = write_rectangle(state.encoder.as_ref(), frame_data, frame_width, &state.pixel_format, geom, &mut out) {
        tracing::warn!(error = %err, "encoder failed, dropping rectangle for this update");
        return Ok(());
    }
    writer.dispatch(out).await.context("dispatch FramebufferUpdate")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encodings::RawEncoder;

    #[test]
    fn held_keys_insert_and_remove_preserve_order_without_duplicates() {
        let mut state = State::new(Arc::new(RawEncoder));
        state.held_keys.push(1);
        if !state.held_keys.contains(&2) {
            state.held_keys.push(2);
        }
        if !state.held_keys.contains(&1) {
            state.held_keys.push(1); // duplicate, should be skipped by caller logic
        }
        assert_eq!(state.held_keys, vec![1, 2]);
        state.held_keys.retain(|&k| k != 1);
        assert_eq!(state.held_keys, vec![2]);
    }

    #[test]
    fn framebuffer_update_header_is_four_bytes_with_count() {
        let header = framebuffer_update_header(1);
        assert_eq!(header, vec![0, 0, 0, 1]);
    }

    struct StubFrameSource;

    #[async_trait::async_trait]
    impl FrameSource for StubFrameSource {
        async fn start(&self, _width: u16, _height: u16) -> Result<()> {
            Ok(())
        }
        async fn pull_frame(&self) -> Result<crate::capture::RgbaFrame> {
            Ok(crate::capture::RgbaFrame { width: 4, height: 4, data: Arc::new(vec![0u8; 4 * 4 * 4]) })
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    struct NoopInjector;

    #[async_trait::async_trait]
    impl Injector for NoopInjector {
        async fn move_cursor(&self, _x: u16, _y: u16) -> Result<()> {
            Ok(())
        }
        async fn key_tap(&self, _chord: &[u32]) -> Result<()> {
            Ok(())
        }
        async fn set_buttons(&self, _buttons: &crate::input::ButtonState) -> Result<()> {
            Ok(())
        }
        async fn write_clipboard(&self, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_update_request_is_forced_non_incremental() {
        let (client, server) = tokio::io::duplex(4096);
        let (_read_half, write_half) = tokio::io::split(server);
        let (writer, _handle) = crate::wire::spawn_writer(write_half);
        drop(client);

        let encoder_registry = EncoderRegistry::new(vec![Arc::new(RawEncoder)]);
        let frame_source: Arc<dyn FrameSource> = Arc::new(StubFrameSource);
        let injector: Arc<dyn Injector> = Arc::new(NoopInjector);

        let mut state = State::new(encoder_registry.by_code(0).unwrap());
        assert!(!state.sent_first_update);

        handle_message(
            ClientMessage::FramebufferUpdateRequest { incremental: true, x: 0, y: 0, width: 4, height: 4 },
            &mut state,
            &encoder_registry,
            &frame_source,
            &injector,
            &writer,
        )
        .await
        .unwrap();

        assert!(state.sent_first_update, "first request should mark the session as having sent an update");
    }
}

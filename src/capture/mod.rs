//! The frame-source seam: a capture collaborator produces whole frames,
//! `pull_frame` hands the freshest one to the session side, and a bounded
//! 2-slot buffer between them trades completeness for freshness — a slow
//! consumer sees a newer frame, never a backlog of stale ones.

mod synthetic;

pub use synthetic::TestPatternSource;

use anyhow::Result;
use async_trait::async_trait;

/// One whole captured frame: tightly packed RGBA8, row-major.
#[derive(Clone)]
pub struct RgbaFrame {
    pub width: u16,
    pub height: u16,
    pub data: std::sync::Arc<Vec<u8>>,
}

/// The capture collaborator's contract. A platform backend (DRM/KMS, X11,
/// Quartz, ...) implements this; only [`TestPatternSource`] ships here.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn start(&self, width: u16, height: u16) -> Result<()>;

    /// Block until a frame is available, then return the freshest one.
    async fn pull_frame(&self) -> Result<RgbaFrame>;

    async fn close(&self) -> Result<()>;
}

/// A 2-slot freshness buffer: producers overwrite the pending slot rather
/// than queuing, so a backed-up consumer always gets the newest frame next.
pub struct FreshnessBuffer {
    tx: tokio::sync::watch::Sender<Option<RgbaFrame>>,
}

pub struct FreshnessBufferHandle {
    rx: tokio::sync::watch::Receiver<Option<RgbaFrame>>,
}

impl FreshnessBuffer {
    pub fn new() -> (Self, FreshnessBufferHandle) {
        let (tx, rx) = tokio::sync::watch::channel(None);
        (Self { tx }, FreshnessBufferHandle { rx })
    }

    /// Publish a new frame, dropping whatever was pending (if the consumer
    /// hadn't caught up yet).
    pub fn publish(&self, frame: RgbaFrame) {
        let _ = self.tx.send(Some(frame));
    }
}

impl FreshnessBufferHandle {
    /// Wait for the next frame distinct from the last one this handle saw.
    pub async fn next(&mut self) -> Result<RgbaFrame> {
        loop {
            if self.rx.changed().await.is_err() {
                anyhow::bail!("frame source closed");
            }
            if let Some(frame) = self.rx.borrow_and_update().clone() {
                return Ok(frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8) -> RgbaFrame {
        RgbaFrame { width: 1, height: 1, data: std::sync::Arc::new(vec![tag; 4]) }
    }

    #[tokio::test]
    async fn overwritten_pending_frame_is_dropped_not_queued() {
        let (buf, mut handle) = FreshnessBuffer::new();
        buf.publish(frame(1));
        buf.publish(frame(2));
        buf.publish(frame(3));

        let got = handle.next().await.unwrap();
        assert_eq!(got.data[0], 3, "consumer should see only the freshest publish");
    }

    #[tokio::test]
    async fn handle_blocks_until_a_frame_is_published() {
        let (buf, mut handle) = FreshnessBuffer::new();
        let task = tokio::spawn(async move { handle.next().await });
        tokio::task::yield_now().await;
        buf.publish(frame(9));
        let got = task.await.unwrap().unwrap();
        assert_eq!(got.data[0], 9);
    }
}

//! An in-scope, real (not mocked) [`FrameSource`]: renders an animated
//! gradient/checkerboard test pattern at roughly 5 fps. Stands in for the
//! out-of-scope platform capture backend while exercising the same
//! producer/freshness-buffer/consumer pipeline a real backend would.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use super::{FrameSource, FreshnessBuffer, FreshnessBufferHandle, RgbaFrame};

const FRAME_PERIOD: Duration = Duration::from_millis(200); // ~5 fps

pub struct TestPatternSource {
    handle: Mutex<FreshnessBufferHandle>,
    buffer: Arc<FreshnessBuffer>,
    producer: Mutex<Option<JoinHandle<()>>>,
}

impl TestPatternSource {
    pub fn new() -> Self {
        let (buffer, handle) = FreshnessBuffer::new();
        Self {
            handle: Mutex::new(handle),
            buffer: Arc::new(buffer),
            producer: Mutex::new(None),
        }
    }
}

impl Default for TestPatternSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Render one frame of an animated diagonal gradient + checkerboard overlay.
fn render(width: u16, height: u16, tick: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    let phase = (tick % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let checker = ((x / 16) + (y / 16)) % 2 == 0;
            let r = x.wrapping_add(phase as u16) as u8;
            let g = y.wrapping_add(phase as u16) as u8;
            let b = phase;
            if checker {
                data.extend_from_slice(&[r, g, b, 255]);
            } else {
                data.extend_from_slice(&[255u8.wrapping_sub(r), 255u8.wrapping_sub(g), b, 255]);
            }
        }
    }
    data
}

#[async_trait]
impl FrameSource for TestPatternSource {
    async fn start(&self, width: u16, height: u16) -> Result<()> {
        let buffer = self.buffer.clone();
        let mut guard = self.producer.lock().await;
        if guard.is_some() {
            return Ok(()); // already started
        }
        *guard = Some(tokio::spawn(async move {
            let mut ticker = interval(FRAME_PERIOD);
            let mut tick: u64 = 0;
            loop {
                ticker.tick().await;
                let data = render(width, height, tick);
                buffer.publish(RgbaFrame { width, height, data: Arc::new(data) });
                tick += 1;
            }
        }));
        Ok(())
    }

    async fn pull_frame(&self) -> Result<RgbaFrame> {
        self.handle.lock().await.next().await.context("pull synthetic frame")
    }

    async fn close(&self) -> Result<()> {
        if let Some(task) = self.producer.lock().await.take() {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_produces_exact_rgba_byte_count() {
        let frame = render(20, 10, 3);
        assert_eq!(frame.len(), 20 * 10 * 4);
    }

    #[tokio::test]
    async fn start_then_pull_returns_a_frame_of_the_requested_size() {
        let source = TestPatternSource::new();
        source.start(8, 6).await.unwrap();
        let frame = source.pull_frame().await.unwrap();
        assert_eq!((frame.width, frame.height), (8, 6));
        assert_eq!(frame.data.len(), 8 * 6 * 4);
        source.close().await.unwrap();
    }
}

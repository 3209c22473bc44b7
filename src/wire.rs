//! Framed, big-endian read/write over a byte stream, with an asynchronous
//! send queue decoupling producers from socket latency.
//!
//! All multi-byte integers on the wire are big-endian per RFB. Every
//! server-to-client write after the handshake goes through [`WireWriter`];
//! nothing else touches the socket for writing.

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Bounded capacity of the outbound write queue. `dispatch` blocks once full
/// rather than dropping (freshness applies to frames, not protocol messages).
pub const WRITE_QUEUE_CAPACITY: usize = 100;

/// Read half of a session's transport, boxed so the same session and
/// security-handler code serves any transport (raw TCP, WebSocket-binary)
/// without being generic over it.
pub type DynReadHalf = Box<dyn AsyncRead + Unpin + Send>;

/// Buffered reader half of a session's wire connection.
pub struct WireReader<R> {
    inner: BufReader<R>,
}

impl<R: AsyncRead + Unpin> WireReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
        }
    }

    pub async fn read_u8(&mut self) -> Result<u8> {
        self.inner.read_u8().await.context("read u8")
    }

    pub async fn read_u16(&mut self) -> Result<u16> {
        self.inner.read_u16().await.context("read u16")
    }

    pub async fn read_u32(&mut self) -> Result<u32> {
        self.inner.read_u32().await.context("read u32")
    }

    pub async fn read_i32(&mut self) -> Result<i32> {
        self.inner.read_i32().await.context("read i32")
    }

    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).await.context("read exact")?;
        Ok(())
    }

    pub async fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Discard `size` bytes of protocol padding.
    pub async fn read_padding(&mut self, size: usize) -> Result<()> {
        let mut discard = [0u8; 16];
        let mut remaining = size;
        while remaining > 0 {
            let chunk = remaining.min(discard.len());
            self.inner
                .read_exact(&mut discard[..chunk])
                .await
                .context("read padding")?;
            remaining -= chunk;
        }
        Ok(())
    }
}

/// Handle producers use to enqueue already-serialized outbound messages.
/// Cloning shares the same queue; the writer task exits once every clone is
/// dropped and the queue has drained.
#[derive(Clone)]
pub struct WireWriter {
    tx: mpsc::Sender<Vec<u8>>,
}

impl WireWriter {
    /// Enqueue a message. Blocks (does not drop) once the queue is full.
    pub async fn dispatch(&self, msg: Vec<u8>) -> Result<()> {
        self.tx
            .send(msg)
            .await
            .context("outbound queue closed")
    }
}

/// Spawn the dedicated writer task that drains the outbound queue and
/// flushes the socket after each message. Returns a handle to enqueue
/// messages and the task's join handle; dropping every [`WireWriter`] clone
/// lets the task drain remaining writes and exit.
pub fn spawn_writer<W>(writer: W) -> (WireWriter, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(WRITE_QUEUE_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut bw = BufWriter::new(writer);
        while let Some(msg) = rx.recv().await {
            bw.write_all(&msg).await.context("write queued message")?;
            bw.flush().await.context("flush after write")?;
        }
        Ok(())
    });
    (WireWriter { tx }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn read_primitives_are_big_endian() {
        let (mut client, server) = duplex(64);
        client.write_all(&[0x01, 0x02, 0x03, 0xAA, 0xBB, 0xCC, 0xDD]).await.unwrap();
        let mut r = WireReader::new(server);
        assert_eq!(r.read_u8().await.unwrap(), 0x01);
        assert_eq!(r.read_u16().await.unwrap(), 0x0203);
        assert_eq!(r.read_u32().await.unwrap(), 0xAABBCCDD);
    }

    #[tokio::test]
    async fn read_padding_discards_bytes() {
        let (mut client, server) = duplex(64);
        client.write_all(&[0, 0, 0, 42]).await.unwrap();
        let mut r = WireReader::new(server);
        r.read_padding(3).await.unwrap();
        assert_eq!(r.read_u8().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn dispatch_flushes_each_message_in_order() {
        let (client, mut server) = duplex(4096);
        let (writer, handle) = spawn_writer(client);
        writer.dispatch(vec![1, 2, 3]).await.unwrap();
        writer.dispatch(vec![4, 5]).await.unwrap();
        drop(writer);
        handle.await.unwrap().unwrap();

        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5]);
    }
}

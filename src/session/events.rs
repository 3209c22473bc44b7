//! Client-to-server message parsing (RFB message-type byte + body).

use anyhow::{Context, Result};

use crate::pixel_format::PixelFormat;
use crate::wire::{DynReadHalf, WireReader};

/// One parsed client message, independent of how the multiplexer acts on it.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    SetPixelFormat(PixelFormat),
    SetEncodings(Vec<i32>),
    FramebufferUpdateRequest { incremental: bool, x: u16, y: u16, width: u16, height: u16 },
    KeyEvent { down: bool, keysym: u32 },
    PointerEvent { button_mask: u8, x: u16, y: u16 },
    ClientCutText(String),
}

/// Read and parse one message body, given its already-consumed type byte.
/// Returns `Ok(None)` for an unrecognised type byte — the spec's
/// log-and-skip policy (the caller logs; body layout is unknowable for an
/// unregistered extension, so the stream position afterward is undefined,
/// matching the original implementation's behaviour).
pub async fn read_message(reader: &mut WireReader<DynReadHalf>, message_type: u8) -> Result<Option<ClientMessage>> {
    match message_type {
        0 => {
            reader.read_padding(3).await.context("SetPixelFormat padding")?;
            let mut buf = [0u8; 16];
            reader.read_exact(&mut buf).await.context("SetPixelFormat body")?;
            Ok(Some(ClientMessage::SetPixelFormat(PixelFormat::from_wire_bytes(&buf))))
        }
        2 => {
            reader.read_padding(1).await.context("SetEncodings padding")?;
            let count = reader.read_u16().await.context("SetEncodings count")?;
            let mut codes = Vec::with_capacity(count as usize);
            for _ in 0..count {
                codes.push(reader.read_i32().await.context("SetEncodings code")?);
            }
            Ok(Some(ClientMessage::SetEncodings(codes)))
        }
        3 => {
            let incremental = reader.read_u8().await.context("FramebufferUpdateRequest incremental")? != 0;
            let x = reader.read_u16().await.context("FramebufferUpdateRequest x")?;
            let y = reader.read_u16().await.context("FramebufferUpdateRequest y")?;
            let width = reader.read_u16().await.context("FramebufferUpdateRequest width")?;
            let height = reader.read_u16().await.context("FramebufferUpdateRequest height")?;
            Ok(Some(ClientMessage::FramebufferUpdateRequest { incremental, x, y, width, height }))
        }
        4 => {
            let down = reader.read_u8().await.context("KeyEvent down")? != 0;
            reader.read_padding(2).await.context("KeyEvent padding")?;
            let keysym = reader.read_u32().await.context("KeyEvent keysym")?;
            Ok(Some(ClientMessage::KeyEvent { down, keysym }))
        }
        5 => {
            let button_mask = reader.read_u8().await.context("PointerEvent button mask")?;
            let x = reader.read_u16().await.context("PointerEvent x")?;
            let y = reader.read_u16().await.context("PointerEvent y")?;
            Ok(Some(ClientMessage::PointerEvent { button_mask, x, y }))
        }
        6 => {
            reader.read_padding(3).await.context("ClientCutText padding")?;
            let len = reader.read_u32().await.context("ClientCutText length")?;
            let bytes = reader.read_vec(len as usize).await.context("ClientCutText body")?;
            let text = String::from_utf8(bytes).context("ClientCutText is not UTF-8")?;
            Ok(Some(ClientMessage::ClientCutText(text)))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt};

    async fn parse(message_type: u8, body: &[u8]) -> Result<Option<ClientMessage>> {
        let (mut client, server) = duplex(256);
        client.write_all(body).await.unwrap();
        drop(client);
        let mut reader = WireReader::new(Box::new(server) as DynReadHalf);
        read_message(&mut reader, message_type).await
    }

    #[tokio::test]
    async fn key_event_parses_down_flag_and_keysym() {
        let mut body = vec![1, 0, 0];
        body.extend_from_slice(&0xff0du32.to_be_bytes());
        let msg = parse(4, &body).await.unwrap().unwrap();
        match msg {
            ClientMessage::KeyEvent { down, keysym } => {
                assert!(down);
                assert_eq!(keysym, 0xff0d);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn set_encodings_reads_n_signed_codes() {
        let mut body = vec![0, 0, 2];
        body.extend_from_slice(&7i32.to_be_bytes());
        body.extend_from_slice(&(-260i32).to_be_bytes());
        let msg = parse(2, &body).await.unwrap().unwrap();
        match msg {
            ClientMessage::SetEncodings(codes) => assert_eq!(codes, vec![7, -260]),
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn unknown_message_type_returns_none() {
        assert!(parse(200, &[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn client_cut_text_reads_utf8_payload() {
        let mut body = vec![0, 0, 0];
        body.extend_from_slice(&5u32.to_be_bytes());
        body.extend_from_slice(b"hello");
        let msg = parse(6, &body).await.unwrap().unwrap();
        match msg {
            ClientMessage::ClientCutText(text) => assert_eq!(text, "hello"),
            _ => panic!("wrong variant"),
        }
    }
}

//! Version negotiation, security negotiation, ClientInit/ServerInit.
//!
//! RFB 3.3 is explicitly unsupported (spec Non-goal) — only 3.7 and 3.8
//! banners are accepted.

use anyhow::{bail, Context, Result};

use crate::pixel_format::PixelFormat;
use crate::security::SecurityRegistry;
use crate::wire::{DynReadHalf, WireReader, WireWriter};

pub struct HandshakeOutcome {
    pub rfb_minor: u16,
    pub chosen_security_code: i32,
}

/// Fixed Tight encoding-capability table advertised in the ServerInit
/// extension — independent of which encoders the session can actually
/// select; CopyRect (1) is listed here even though no encoder implements it.
const ENCODING_CAPS: [(i32, &[u8; 4], &[u8; 8]); 3] = [
    (0, b"STDV", b"RAW_____"),
    (1, b"STDV", b"COPYRECT"),
    (7, b"TGHT", b"TIGHT___"),
];

async fn negotiate_version(reader: &mut WireReader<DynReadHalf>, writer: &WireWriter) -> Result<u16> {
    writer
        .dispatch(b"RFB 003.008\n".to_vec())
        .await
        .context("send protocol version banner")?;

    let banner = reader.read_vec(12).await.context("read client version banner")?;
    match banner.as_slice() {
        b"RFB 003.007\n" => Ok(7),
        b"RFB 003.008\n" => Ok(8),
        other => {
            let text = String::from_utf8_lossy(other);
            bail!("unsupported client protocol version: {text:?}")
        }
    }
}

async fn negotiate_security(
    reader: &mut WireReader<DynReadHalf>,
    writer: &WireWriter,
    security: &SecurityRegistry,
    rfb_minor: u16,
) -> Result<i32> {
    let codes: Vec<u8> = security.enabled().iter().map(|h| h.code() as u8).collect();
    let mut msg = Vec::with_capacity(1 + codes.len());
    msg.push(codes.len() as u8);
    msg.extend_from_slice(&codes);
    writer.dispatch(msg).await.context("send security type list")?;

    let chosen = reader.read_u8().await.context("read security type selection")?;
    let handler = match security.by_code(chosen as i32) {
        Some(h) => h,
        None => {
            writer.dispatch(1u32.to_be_bytes().to_vec()).await.context("send security failure")?;
            bail!("client selected unsupported security type {chosen}");
        }
    };

    let ok = handler.authenticate(reader, writer).await.context("run security sub-protocol")?;
    if !ok {
        writer.dispatch(1u32.to_be_bytes().to_vec()).await.context("send security failure")?;
        bail!("security handshake failed for type {chosen}");
    }
    if rfb_minor >= 8 {
        writer.dispatch(0u32.to_be_bytes().to_vec()).await.context("send security success")?;
    }
    Ok(chosen as i32)
}

fn encode_tight_server_init_extension(out: &mut Vec<u8>) {
    out.extend_from_slice(&0u16.to_be_bytes()); // server messages
    out.extend_from_slice(&0u16.to_be_bytes()); // client messages
    out.extend_from_slice(&(ENCODING_CAPS.len() as u16).to_be_bytes());
    out.extend_from_slice(&[0, 0]); // padding
    for (code, vendor, signature) in ENCODING_CAPS.iter() {
        out.extend_from_slice(&code.to_be_bytes());
        out.extend_from_slice(*vendor);
        out.extend_from_slice(*signature);
    }
}

/// Run the full handshake: version, security, ClientInit, ServerInit. On
/// success the session's message loop may begin.
pub async fn run(
    reader: &mut WireReader<DynReadHalf>,
    writer: &WireWriter,
    security: &SecurityRegistry,
    width: u16,
    height: u16,
    server_name: &str,
) -> Result<HandshakeOutcome> {
    let rfb_minor = negotiate_version(reader, writer).await?;
    tracing::info!(rfb_minor, "client version negotiated");

    let chosen_security_code = negotiate_security(reader, writer, security, rfb_minor).await?;
    tracing::info!(chosen_security_code, "security negotiated");

    let _shared_flag = reader.read_u8().await.context("read ClientInit shared-flag")?;

    let mut init = Vec::new();
    init.extend_from_slice(&width.to_be_bytes());
    init.extend_from_slice(&height.to_be_bytes());
    init.extend_from_slice(&PixelFormat::default_session().to_wire_bytes());
    init.extend_from_slice(&(server_name.len() as i32).to_be_bytes());
    init.extend_from_slice(server_name.as_bytes());
    if chosen_security_code == 16 {
        encode_tight_server_init_extension(&mut init);
    }
    writer.dispatch(init).await.context("send ServerInit")?;

    Ok(HandshakeOutcome { rfb_minor, chosen_security_code })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::NoneHandler;
    use crate::wire::spawn_writer;
    use std::sync::Arc;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn no_auth_3_8_handshake_matches_seed_scenario() {
        let (mut client, server) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let mut reader = WireReader::new(Box::new(server_read) as crate::wire::DynReadHalf);
        let (writer, _handle) = spawn_writer(server_write);

        client.write_all(b"RFB 003.008\n").await.unwrap();
        let security = SecurityRegistry::new(vec![Arc::new(NoneHandler)]);

        let run = tokio::spawn(async move {
            run(&mut reader, &writer, &security, 640, 480, "gsvnc").await
        });

        let mut banner = [0u8; 12];
        client.read_exact(&mut banner).await.unwrap();
        assert_eq!(&banner, b"RFB 003.008\n");

        let mut sec_list = [0u8; 2];
        client.read_exact(&mut sec_list).await.unwrap();
        assert_eq!(sec_list, [1, 1]); // one type, None=1

        client.write_all(&[1]).await.unwrap();

        let mut status = [0u8; 4];
        client.read_exact(&mut status).await.unwrap();
        assert_eq!(status, [0, 0, 0, 0]);

        client.write_all(&[1]).await.unwrap(); // ClientInit shared-flag

        let mut server_init = vec![0u8; 2 + 2 + 16 + 4 + 5];
        client.read_exact(&mut server_init).await.unwrap();
        assert_eq!(&server_init[0..2], &640u16.to_be_bytes());
        assert_eq!(&server_init[2..4], &480u16.to_be_bytes());
        assert_eq!(&server_init[server_init.len() - 5..], b"gsvnc");

        let outcome = run.await.unwrap().unwrap();
        assert_eq!(outcome.rfb_minor, 8);
        assert_eq!(outcome.chosen_security_code, 1);
    }

    #[tokio::test]
    async fn unsupported_security_selection_fails_closed() {
        let (mut client, server) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let mut reader = WireReader::new(Box::new(server_read) as crate::wire::DynReadHalf);
        let (writer, _handle) = spawn_writer(server_write);

        client.write_all(b"RFB 003.007\n").await.unwrap();
        let security = SecurityRegistry::new(vec![Arc::new(NoneHandler)]);

        let run = tokio::spawn(async move {
            run(&mut reader, &writer, &security, 640, 480, "gsvnc").await
        });

        let mut banner = [0u8; 12];
        client.read_exact(&mut banner).await.unwrap();
        let mut sec_list = [0u8; 2];
        client.read_exact(&mut sec_list).await.unwrap();

        client.write_all(&[99]).await.unwrap();

        let mut status = [0u8; 4];
        client.read_exact(&mut status).await.unwrap();
        assert_eq!(status, [0, 0, 0, 1]);

        assert!(run.await.unwrap().is_err());
    }
}

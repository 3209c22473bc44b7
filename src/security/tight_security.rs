//! Security type 16: TightSecurity. A two-stage sub-negotiation — tunnel
//! type, then inner authentication type — each advertised to the client as
//! a table of `{code, vendor, signature}` capabilities before the client
//! picks one.
//!
//! Only the no-tunnel tunnel type is offered; real tunnelling (e.g. SSH)
//! is out of scope. The inner auth capability table is built from whatever
//! [`SecurityHandler`]s the server has enabled (other than TightSecurity
//! itself), resolved back to a concrete handler through a lookup closure so
//! this handler never has to hold an `Arc` back to the registry that
//! constructed it.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use super::SecurityHandler;
use crate::wire::{DynReadHalf, WireReader, WireWriter};

/// One row of a Tight capability table: a 4-byte code, a 4-ASCII-byte
/// vendor, an 8-ASCII-byte signature.
struct Capability {
    code: i32,
    vendor: &'static [u8; 4],
    signature: &'static [u8; 8],
}

const NO_TUNNEL: Capability = Capability {
    code: 0,
    vendor: b"TGHT",
    signature: b"NOTUNNEL",
};

/// Vendor/signature for each auth code we know how to advertise. Unknown
/// codes are skipped rather than guessed at.
fn capability_for_auth_code(code: i32) -> Option<Capability> {
    match code {
        1 => Some(Capability {
            code: 1,
            vendor: b"STDV",
            signature: b"NOAUTH__",
        }),
        2 => Some(Capability {
            code: 2,
            vendor: b"STDV",
            signature: b"VNCAUTH_",
        }),
        _ => None,
    }
}

fn encode_capability_table(caps: &[Capability]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + caps.len() * 16);
    out.extend_from_slice(&(caps.len() as u32).to_be_bytes());
    for cap in caps {
        out.extend_from_slice(&cap.code.to_be_bytes());
        out.extend_from_slice(cap.vendor);
        out.extend_from_slice(cap.signature);
    }
    out
}

pub struct TightSecurityHandler<F>
where
    F: Fn(i32) -> Option<std::sync::Arc<dyn SecurityHandler>> + Send + Sync,
{
    inner_codes: Vec<i32>,
    lookup: F,
}

impl<F> TightSecurityHandler<F>
where
    F: Fn(i32) -> Option<std::sync::Arc<dyn SecurityHandler>> + Send + Sync,
{
    /// `inner_codes` lists the server's other enabled security codes, in
    /// advertisement order; `lookup` resolves a chosen code back to its
    /// handler.
    pub fn new(inner_codes: Vec<i32>, lookup: F) -> Self {
        Self { inner_codes, lookup }
    }
}

#[async_trait]
impl<F> SecurityHandler for TightSecurityHandler<F>
where
    F: Fn(i32) -> Option<std::sync::Arc<dyn SecurityHandler>> + Send + Sync,
{
    fn code(&self) -> i32 {
        16
    }

    async fn authenticate(
        &self,
        reader: &mut WireReader<DynReadHalf>,
        writer: &WireWriter,
    ) -> Result<bool> {
        // Tunnel sub-negotiation: only "no tunnel" is ever offered.
        writer
            .dispatch(encode_capability_table(&[NO_TUNNEL]))
            .await
            .context("send tight tunnel capabilities")?;
        let requested_tunnel = reader.read_i32().await.context("read tight tunnel selection")?;
        if requested_tunnel != 0 {
            bail!("client requested unsupported tight tunnel type: {requested_tunnel}");
        }

        // Auth sub-negotiation.
        let auth_caps: Vec<Capability> = self
            .inner_codes
            .iter()
            .filter_map(|&code| capability_for_auth_code(code))
            .collect();
        writer
            .dispatch(encode_capability_table(&auth_caps))
            .await
            .context("send tight auth capabilities")?;

        let requested_auth = reader.read_i32().await.context("read tight auth selection")?;
        let handler = (self.lookup)(requested_auth)
            .with_context(|| format!("client requested unadvertised tight auth type: {requested_auth}"))?;
        handler.authenticate(reader, writer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_table_encodes_count_then_sixteen_bytes_per_entry() {
        let encoded = encode_capability_table(&[NO_TUNNEL]);
        assert_eq!(encoded.len(), 4 + 16);
        assert_eq!(&encoded[0..4], &1u32.to_be_bytes());
        assert_eq!(&encoded[4..8], &0i32.to_be_bytes());
        assert_eq!(&encoded[8..12], b"TGHT");
        assert_eq!(&encoded[12..20], b"NOTUNNEL");
    }

    #[test]
    fn unknown_auth_codes_are_silently_excluded_from_the_table() {
        let caps: Vec<Capability> = [1, 2, 99]
            .iter()
            .filter_map(|&c| capability_for_auth_code(c))
            .collect();
        assert_eq!(caps.len(), 2);
    }
}

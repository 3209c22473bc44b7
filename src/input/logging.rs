use anyhow::Result;
use async_trait::async_trait;

use super::{keysym_name, ButtonState, Injector};

/// Stands in for a real OS-injection backend: performs the same keysym
/// lookup/validation a real one would, and logs the resulting action
/// instead of touching a device.
pub struct LoggingInjector;

#[async_trait]
impl Injector for LoggingInjector {
    async fn move_cursor(&self, x: u16, y: u16) -> Result<()> {
        tracing::debug!(x, y, "pointer move");
        Ok(())
    }

    async fn key_tap(&self, chord: &[u32]) -> Result<()> {
        let mut names = Vec::with_capacity(chord.len());
        for &keysym in chord {
            match keysym_name(keysym) {
                Some(name) => names.push(name),
                None => {
                    tracing::debug!(keysym = format!("0x{keysym:04x}"), "unknown keysym, dropped");
                }
            }
        }
        if !names.is_empty() {
            tracing::debug!(chord = ?names, "key chord");
        }
        Ok(())
    }

    async fn set_buttons(&self, buttons: &ButtonState) -> Result<()> {
        tracing::debug!(?buttons, "button state");
        Ok(())
    }

    async fn write_clipboard(&self, text: &str) -> Result<()> {
        tracing::debug!(bytes = text.len(), "clipboard write");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_keysyms_are_dropped_not_errors() {
        let injector = LoggingInjector;
        // A held chord mixing a known and an unknown keysym should still
        // succeed; the unknown one is simply logged and skipped.
        assert!(injector.key_tap(&[0x0061, 0xdead_beef]).await.is_ok());
    }
}

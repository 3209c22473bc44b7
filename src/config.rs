use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;

#[derive(Parser, Debug)]
#[command(name = "rfbd", about = "An RFB (VNC) server")]
pub struct Config {
    /// RFB listen address
    #[arg(long, default_value = "0.0.0.0")]
    pub listen: String,

    /// RFB listen port
    #[arg(long, default_value_t = 5900)]
    pub port: u16,

    /// Enable the WebSocket-framed listener alongside raw TCP
    #[arg(long, default_value_t = false)]
    pub ws_enabled: bool,

    /// WebSocket listen address
    #[arg(long, default_value = "0.0.0.0")]
    pub ws_listen: String,

    /// WebSocket listen port
    #[arg(long, default_value_t = 5901)]
    pub ws_port: u16,

    /// Framebuffer resolution, "WxH" or "auto"
    #[arg(long, default_value = "auto")]
    pub resolution: String,

    /// Enabled security type codes (1=None, 2=VNCAuth, 16=TightSecurity)
    #[arg(long = "security", value_delimiter = ',', default_value = "1,2,16")]
    pub security_codes: Vec<i32>,

    /// Enabled encoding codes (0=Raw, 7=Tight-JPEG, -260=Tight-PNG)
    #[arg(long = "encodings", value_delimiter = ',', default_value = "0,7,-260")]
    pub encoding_codes: Vec<i32>,

    /// Enabled client message-type codes
    #[arg(long = "events", value_delimiter = ',', default_value = "0,2,3,4,5,6")]
    pub event_codes: Vec<u8>,

    /// VNC password for VNCAuth/TightSecurity. Generated randomly if
    /// VNCAuth is enabled and neither this nor --password-file is given.
    #[arg(long)]
    pub password: Option<String>,

    /// Path to a file containing the VNC password (first line, trimmed)
    #[arg(long)]
    pub password_file: Option<String>,
}

/// "WxH" parses to `Some((w,h))`; "auto" (the default) to `None`, meaning
/// the frame source's native size should be used.
pub fn parse_resolution(spec: &str) -> Result<Option<(u16, u16)>> {
    if spec.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }
    let (w, h) = spec
        .split_once('x')
        .or_else(|| spec.split_once('X'))
        .with_context(|| format!("resolution must be \"WxH\" or \"auto\", got {spec:?}"))?;
    let width: u16 = w.parse().with_context(|| format!("invalid width in resolution {spec:?}"))?;
    let height: u16 = h.parse().with_context(|| format!("invalid height in resolution {spec:?}"))?;
    Ok(Some((width, height)))
}

const GENERATED_PASSWORD_LEN: usize = 8;
const PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_PASSWORD_LEN)
        .map(|_| PASSWORD_ALPHABET[rng.random_range(0..PASSWORD_ALPHABET.len())] as char)
        .collect()
}

impl Config {
    /// Resolve the effective VNC password: explicit flag, then file, then
    /// (only if VNCAuth is enabled) a freshly generated one logged at info.
    pub fn resolve_password(&self) -> Result<Option<String>> {
        if let Some(pw) = &self.password {
            return Ok(Some(pw.clone()));
        }
        if let Some(path) = &self.password_file {
            let contents = std::fs::read_to_string(path).with_context(|| format!("read password file {path}"))?;
            let password = contents.lines().next().unwrap_or("").trim().to_string();
            return Ok(Some(password));
        }
        if self.security_codes.contains(&2) {
            let password = generate_password();
            tracing::info!(password, "generated random VNC password");
            return Ok(Some(password));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_resolution_is_none() {
        assert_eq!(parse_resolution("auto").unwrap(), None);
        assert_eq!(parse_resolution("AUTO").unwrap(), None);
    }

    #[test]
    fn wxh_resolution_parses_both_dimensions() {
        assert_eq!(parse_resolution("1280x720").unwrap(), Some((1280, 720)));
    }

    #[test]
    fn malformed_resolution_is_an_error() {
        assert!(parse_resolution("nonsense").is_err());
    }

    #[test]
    fn generated_password_has_the_expected_length_and_alphabet() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LEN);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}

mod capture;
mod config;
mod encodings;
mod input;
mod listener;
mod pixel_format;
mod security;
mod session;
mod wire;
mod ws;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use capture::{FrameSource, TestPatternSource};
use config::Config;
use encodings::{EncoderRegistry, RawEncoder, TightJpegEncoder, TightPngEncoder};
use input::{Injector, LoggingInjector};
use security::{NoneHandler, SecurityHandler, SecurityRegistry, TightSecurityHandler, VncAuthHandler};
use session::ServerContext;

const DEFAULT_WIDTH: u16 = 1280;
const DEFAULT_HEIGHT: u16 = 800;
const SERVER_NAME: &str = "rfbd";

fn build_security_registry(codes: &[i32], password: Option<&str>) -> Result<SecurityRegistry> {
    let mut handlers: Vec<Arc<dyn SecurityHandler>> = Vec::new();
    let mut inner_codes = Vec::new();

    for &code in codes {
        match code {
            1 => {
                handlers.push(Arc::new(NoneHandler));
                inner_codes.push(1);
            }
            2 => {
                let password = password.context("VNCAuth (security code 2) enabled but no password resolved")?;
                handlers.push(Arc::new(VncAuthHandler::new(password.to_string())));
                inner_codes.push(2);
            }
            16 => {} // wired below, after we know the other inner codes
            other => tracing::warn!(code = other, "ignoring unknown security code"),
        }
    }

    if codes.contains(&16) {
        let lookup_codes = inner_codes.clone();
        let registry_so_far = SecurityRegistry::new(handlers.clone());
        let lookup = move |code: i32| -> Option<Arc<dyn SecurityHandler>> {
            if lookup_codes.contains(&code) {
                registry_so_far.by_code(code)
            } else {
                None
            }
        };
        handlers.push(Arc::new(TightSecurityHandler::new(inner_codes, lookup)));
    }

    Ok(SecurityRegistry::new(handlers))
}

fn build_encoder_registry(codes: &[i32]) -> EncoderRegistry {
    let mut encoders: Vec<Arc<dyn encodings::Encoder>> = Vec::new();
    for &code in codes {
        match code {
            0 => encoders.push(Arc::new(RawEncoder)),
            7 => encoders.push(Arc::new(TightJpegEncoder::default())),
            -260 => encoders.push(Arc::new(TightPngEncoder)),
            other => tracing::warn!(code = other, "ignoring unknown encoding code"),
        }
    }
    EncoderRegistry::new(encoders)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::parse();
    let password = config.resolve_password()?;
    let (width, height) = config::parse_resolution(&config.resolution)?.unwrap_or((DEFAULT_WIDTH, DEFAULT_HEIGHT));

    let security = Arc::new(build_security_registry(&config.security_codes, password.as_deref())?);
    let encoders = Arc::new(build_encoder_registry(&config.encoding_codes));
    let enabled_event_codes: HashSet<u8> = config.event_codes.iter().copied().collect();

    let injector: Arc<dyn Injector> = Arc::new(LoggingInjector);
    let frame_source_factory: Arc<dyn Fn() -> Arc<dyn FrameSource> + Send + Sync> =
        Arc::new(|| Arc::new(TestPatternSource::new()) as Arc<dyn FrameSource>);

    let ctx = Arc::new(ServerContext {
        security,
        encoders,
        width,
        height,
        server_name: SERVER_NAME.to_string(),
        frame_source_factory,
        injector,
        enabled_event_codes,
    });

    let tcp_listener = listener::bind(&config.listen, config.port).await?;
    tracing::info!(listen = %config.listen, port = config.port, "RFB TCP listener ready");
    let mut tcp_handle = tokio::spawn(listener::serve_tcp(tcp_listener, ctx.clone()));

    let mut ws_handle = if config.ws_enabled {
        let ws_listener = listener::bind(&config.ws_listen, config.ws_port).await?;
        tracing::info!(listen = %config.ws_listen, port = config.ws_port, "RFB WebSocket listener ready");
        Some(tokio::spawn(listener::serve_ws(ws_listener, ctx.clone())))
    } else {
        None
    };

    // A listener error is fatal for that listener and for the process: both
    // accept loops only return on an `accept()` failure.
    match &mut ws_handle {
        Some(ws_handle) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                }
                result = &mut tcp_handle => {
                    result.context("join TCP listener task")??;
                }
                result = ws_handle => {
                    result.context("join WebSocket listener task")??;
                }
            }
        }
        None => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                }
                result = &mut tcp_handle => {
                    result.context("join TCP listener task")??;
                }
            }
        }
    }

    if !tcp_handle.is_finished() {
        tcp_handle.abort();
    }
    if let Some(handle) = ws_handle {
        if !handle.is_finished() {
            handle.abort();
        }
    }

    Ok(())
}

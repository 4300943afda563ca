//! Capture-send binary
//!
//! Captures the default input device and streams raw PCM frames to a
//! receiver over UDP.
//!
//! Usage: `sender [remote-addr] [config.toml]`

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use udp_audio_link::audio::list_devices;
use udp_audio_link::config::AppConfig;
use udp_audio_link::session::start_send;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(2) {
        Some(path) => AppConfig::load(Path::new(&path))?,
        None => AppConfig::default(),
    };

    let remote: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.remote_addr.clone())
        .parse()?;

    println!("\n=== Available Audio Devices ===");
    for device in list_devices() {
        let kind = match (device.is_input, device.is_output) {
            (true, true) => "Input/Output",
            (true, false) => "Input",
            (false, true) => "Output",
            _ => "Unknown",
        };
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {} ({kind}){default_marker}", device.name);
    }
    println!();

    tracing::info!(
        "sending {} Hz, {} ch, {}-byte frames to {remote}",
        config.session.sample_rate,
        config.session.channels,
        config.session.frame_bytes(),
    );

    let handle = start_send(remote, config.session)?;

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    ticker.tick().await; // first tick is immediate
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                if !handle.is_running() {
                    break;
                }
                let stats = handle.stats();
                tracing::info!(
                    "sent {} frames, {} send failures",
                    stats.frames_sent,
                    stats.send_failures,
                );
            }
        }
    }

    handle.stop()?;
    Ok(())
}

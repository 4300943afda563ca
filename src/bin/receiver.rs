//! Receive-playback binary
//!
//! Listens for raw PCM frames over UDP and plays them on the default
//! output device, substituting silence when the network falls behind.
//!
//! Usage: `receiver [port] [config.toml]`

use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use udp_audio_link::audio::list_devices;
use udp_audio_link::config::AppConfig;
use udp_audio_link::session::start_receive;

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

    let port: u16 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => config.listen_port,
    };

    println!("\n=== Available Output Devices ===");
    for device in list_devices() {
        if device.is_output {
            let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
            println!("  {}{default_marker}", device.name);
        }
    }
    println!();

    tracing::info!(
        "listening on port {port} for {} Hz, {} ch, {}-byte frames",
        config.session.sample_rate,
        config.session.channels,
        config.session.frame_bytes(),
    );

    let handle = start_receive(port, config.session)?;

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
                    "received {} datagrams, played {} frames ({} silence), {} dropped, {} buffered",
                    stats.datagrams_received,
                    stats.frames_played,
                    stats.silence_frames,
                    stats.frames_dropped,
                    stats.buffered,
                );
            }
        }
    }

    handle.stop()?;
    Ok(())
}

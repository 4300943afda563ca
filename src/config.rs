//! Session and application configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Error, Result};

/// Audio format parameters for one session.
///
/// Immutable for the lifetime of a session. The wire format carries no
/// negotiation handshake, so both ends must agree on these values up front:
/// the frame byte size derived here is the exact payload size of every
/// datagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Sample width in bytes; only 16-bit PCM is supported
    pub bytes_per_sample: u16,
    /// Frame length in samples per channel
    pub frame_samples: usize,
    /// Jitter buffer capacity in frames (receive sessions only)
    pub jitter_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            bytes_per_sample: BYTES_PER_SAMPLE,
            frame_samples: DEFAULT_FRAME_SAMPLES,
            jitter_capacity: DEFAULT_JITTER_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Size in bytes of one audio frame, and of one UDP payload.
    pub fn frame_bytes(&self) -> usize {
        self.frame_samples * self.channels as usize * self.bytes_per_sample as usize
    }

    /// Wall-clock duration of one frame at the configured sample rate.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_nanos(self.frame_samples as u64 * 1_000_000_000 / self.sample_rate as u64)
    }

    /// Reject configurations the device and wire layers cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 || self.channels == 0 || self.frame_samples == 0 {
            return Err(Error::Config(
                "sample rate, channels and frame length must be non-zero".into(),
            ));
        }
        if self.bytes_per_sample != BYTES_PER_SAMPLE {
            return Err(Error::Config(format!(
                "only {}-bit samples are supported",
                BYTES_PER_SAMPLE * 8
            )));
        }
        if self.jitter_capacity == 0 {
            return Err(Error::Config("jitter buffer capacity must be non-zero".into()));
        }
        if self.frame_bytes() > MAX_DATAGRAM_SIZE {
            return Err(Error::Config(format!(
                "frame of {} bytes exceeds the maximum datagram size",
                self.frame_bytes()
            )));
        }
        Ok(())
    }
}

/// Configuration for the sender/receiver binaries, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Audio format shared by both directions
    pub session: SessionConfig,
    /// Where the sender ships datagrams
    pub remote_addr: String,
    /// Where the receiver listens
    pub listen_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            remote_addr: format!("127.0.0.1:{DEFAULT_UDP_PORT}"),
            listen_port: DEFAULT_UDP_PORT,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))
    }
}

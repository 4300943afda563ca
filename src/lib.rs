//! # UDP Audio Link
//!
//! Point-to-point raw PCM audio transport over UDP.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────── SENDER ─────────────────────┐
//! │  ┌────────────┐   ┌──────────────┐   ┌───────┐  │
//! │  │ Microphone │──▶│ Frame Packer │──▶│ UDP   │  │   one frame =
//! │  │ (cpal)     │   │ (fixed size) │   │ send  │──┼─▶ one datagram,
//! │  └────────────┘   └──────────────┘   └───────┘  │   no header
//! └──────────────────────────────────────────────────┘
//!                          │ UDP
//!                          ▼
//! ┌─────────────────── RECEIVER ────────────────────┐
//! │  ┌──────────┐   ┌───────────────┐   ┌────────┐  │
//! │  │ Listener │──▶│ Jitter Buffer │──▶│Playback│  │
//! │  │ thread   │   │ (bounded FIFO)│   │ thread │  │
//! │  └──────────┘   └───────────────┘   └────────┘  │
//! │                  drop-on-full       silence on  │
//! │                                     underrun    │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! A session is started with [`start_send`] or [`start_receive`] and torn
//! down with [`SessionHandle::stop`]. The two directions share no state, so
//! one process may run either or both.
//!
//! ## Known limitation
//!
//! Datagrams carry no sequence number or timestamp. Frames reordered or
//! duplicated by the network are played back exactly as they arrive; the
//! protocol cannot detect either condition.

pub mod audio;
pub mod config;
pub mod error;
pub mod network;
pub mod session;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use session::{start_receive, start_send, SessionHandle, StatsSnapshot};

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// Default sample rate for audio transport
    pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

    /// Default channel count (mono)
    pub const DEFAULT_CHANNELS: u16 = 1;

    /// Bytes per sample (16-bit PCM)
    pub const BYTES_PER_SAMPLE: u16 = 2;

    /// Default frame length in samples per channel
    pub const DEFAULT_FRAME_SAMPLES: usize = 128;

    /// Default UDP port for audio transport
    pub const DEFAULT_UDP_PORT: u16 = 50_007;

    /// Default jitter buffer capacity (in frames)
    pub const DEFAULT_JITTER_CAPACITY: usize = 100;

    /// Maximum accepted datagram size, larger than any sane frame so a
    /// misconfigured peer never causes silent truncation
    pub const MAX_DATAGRAM_SIZE: usize = 16 * 1024;

    /// How long the listener waits for jitter buffer space before
    /// discarding an incoming frame
    pub const ENQUEUE_TIMEOUT: Duration = Duration::from_millis(100);

    /// How long playback waits for a real frame before substituting
    /// silence; longer than [`ENQUEUE_TIMEOUT`] so real audio is favored
    pub const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(200);

    /// Poll interval on blocking socket/channel receives so every loop
    /// observes cancellation within one iteration
    pub const RECV_POLL_TIMEOUT: Duration = Duration::from_millis(100);

    /// Capacity of the capture-to-send frame channel
    pub const CAPTURE_CHANNEL_FRAMES: usize = 32;

    /// Capacity of the playback feed channel; small so the playback loop
    /// is paced by the output device
    pub const PLAYBACK_FEED_FRAMES: usize = 4;

    /// Kernel receive buffer requested on the listener socket
    pub const SOCKET_RECV_BUFFER: usize = 256 * 1024;
}

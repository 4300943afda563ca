//! Session control surface: start, observe, stop
//!
//! A session owns its loops' threads and nothing else; each loop owns its
//! device stream and/or socket and releases them on every exit path. All
//! loops share one cancellation flag and observe it within one bounded
//! timeout, so [`SessionHandle::stop`] returns promptly.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::bounded;

use crate::audio::buffer::JitterBuffer;
use crate::audio::capture::CaptureStream;
use crate::audio::playback::{self, PlaybackStream};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::network::{receiver, sender, udp};

/// How long session startup waits for the device thread to come up.
const START_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-session counters. Transient conditions land here instead of
/// becoming errors.
#[derive(Debug, Default)]
pub struct SessionStats {
    pub(crate) frames_sent: AtomicU64,
    pub(crate) send_failures: AtomicU64,
    pub(crate) datagrams_received: AtomicU64,
    pub(crate) frames_dropped: AtomicU64,
    pub(crate) frames_played: AtomicU64,
    pub(crate) silence_frames: AtomicU64,
}

/// Point-in-time copy of a session's counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSnapshot {
    /// Datagrams successfully handed to the network
    pub frames_sent: u64,
    /// Individual datagram sends that failed (frame lost, loop continued)
    pub send_failures: u64,
    /// Datagrams accepted by the listener
    pub datagrams_received: u64,
    /// Datagrams discarded because the jitter buffer stayed full
    pub frames_dropped: u64,
    /// Frames delivered to the output device, real or silent
    pub frames_played: u64,
    /// Silence substitutions on underrun
    pub silence_frames: u64,
    /// Frames currently held by the jitter buffer
    pub buffered: usize,
}

/// Handle to a running send or receive session.
///
/// Dropping the handle stops the session; [`stop`](Self::stop) does the
/// same and additionally reports any fatal error the session died with.
pub struct SessionHandle {
    name: &'static str,
    cancel: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    stats: Arc<SessionStats>,
    buffer: Option<Arc<JitterBuffer>>,
    fatal: Arc<Mutex<Option<Error>>>,
}

impl SessionHandle {
    /// Whether the session's loops are still running.
    pub fn is_running(&self) -> bool {
        !self.cancel.load(Ordering::SeqCst)
    }

    /// Snapshot of the session's counters.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_sent: self.stats.frames_sent.load(Ordering::Relaxed),
            send_failures: self.stats.send_failures.load(Ordering::Relaxed),
            datagrams_received: self.stats.datagrams_received.load(Ordering::Relaxed),
            frames_dropped: self.stats.frames_dropped.load(Ordering::Relaxed),
            frames_played: self.stats.frames_played.load(Ordering::Relaxed),
            silence_frames: self.stats.silence_frames.load(Ordering::Relaxed),
            buffered: self.buffer.as_ref().map(|b| b.len()).unwrap_or(0),
        }
    }

    /// Stop the session and surface any fatal error it exited with.
    ///
    /// Signals cancellation, joins every loop and returns once all owned
    /// resources have been released.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.cancel.store(true, Ordering::SeqCst);
        if !self.threads.is_empty() {
            for handle in self.threads.drain(..) {
                let _ = handle.join();
            }
            tracing::info!("{} session stopped", self.name);
        }
        match take_fatal(&self.fatal) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn store_fatal(slot: &Mutex<Option<Error>>, err: Error) {
    let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    // only the first fatal error is reported
    guard.get_or_insert(err);
}

fn take_fatal(slot: &Mutex<Option<Error>>) -> Option<Error> {
    slot.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
}

/// Start a capture-send session streaming to `remote`.
///
/// Returns once the capture device is open and the loop is running, or
/// with the device/socket error that prevented startup.
pub fn start_send(remote: SocketAddr, config: SessionConfig) -> Result<SessionHandle> {
    config.validate()?;
    let socket = udp::send_socket()?;

    let cancel = Arc::new(AtomicBool::new(false));
    let stats = Arc::new(SessionStats::default());
    let fatal = Arc::new(Mutex::new(None));
    let (ready_tx, ready_rx) = bounded::<std::result::Result<(), Error>>(1);

    let worker = {
        let cancel = Arc::clone(&cancel);
        let stats = Arc::clone(&stats);
        let fatal = Arc::clone(&fatal);
        let config = config.clone();
        thread::Builder::new()
            .name("capture-send".into())
            .spawn(move || {
                // the cpal stream is not Send, so it lives and dies here
                let capture = match CaptureStream::open(&config) {
                    Ok(capture) => {
                        let _ = ready_tx.send(Ok(()));
                        capture
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                };

                if let Err(e) = sender::send_loop(
                    &socket,
                    remote,
                    capture.frames(),
                    capture.errors(),
                    &cancel,
                    &stats,
                ) {
                    tracing::error!("capture-send loop failed: {e}");
                    store_fatal(&fatal, e);
                }
                cancel.store(true, Ordering::SeqCst);
                // capture stream and socket released here
            })?
    };

    await_ready(ready_rx, &cancel, vec![worker]).map(|threads| {
        tracing::info!("send session running, remote {remote}");
        SessionHandle {
            name: "send",
            cancel,
            threads,
            stats,
            buffer: None,
            fatal,
        }
    })
}

/// Start a receive-playback session on `local_port`.
///
/// Binds the socket and opens the output device before returning, so a
/// bind or device failure surfaces here and never from a running session.
pub fn start_receive(local_port: u16, config: SessionConfig) -> Result<SessionHandle> {
    config.validate()?;
    let socket = udp::listen_socket(local_port)?;

    let cancel = Arc::new(AtomicBool::new(false));
    let stats = Arc::new(SessionStats::default());
    let fatal = Arc::new(Mutex::new(None));
    let buffer = Arc::new(JitterBuffer::new(config.jitter_capacity));

    let listener = {
        let buffer = Arc::clone(&buffer);
        let cancel = Arc::clone(&cancel);
        let stats = Arc::clone(&stats);
        let fatal = Arc::clone(&fatal);
        thread::Builder::new().name("listener".into()).spawn(move || {
            if let Err(e) = receiver::listen_loop(&socket, &buffer, &cancel, &stats) {
                tracing::error!("listener loop failed: {e}");
                store_fatal(&fatal, e);
            }
            cancel.store(true, Ordering::SeqCst);
            // socket released here
        })?
    };

    let (ready_tx, ready_rx) = bounded::<std::result::Result<(), Error>>(1);
    let player = {
        let buffer = Arc::clone(&buffer);
        let cancel = Arc::clone(&cancel);
        let stats = Arc::clone(&stats);
        let fatal = Arc::clone(&fatal);
        let config = config.clone();
        thread::Builder::new().name("playback".into()).spawn(move || {
            let stream = match PlaybackStream::open(&config) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
            };

            if let Err(e) = playback::playback_loop(
                stream.feed(),
                stream.errors(),
                &buffer,
                &config,
                &cancel,
                &stats,
            ) {
                tracing::error!("playback loop failed: {e}");
                store_fatal(&fatal, e);
            }
            cancel.store(true, Ordering::SeqCst);
            // playback stream released here
        })?
    };

    await_ready(ready_rx, &cancel, vec![listener, player]).map(|threads| {
        tracing::info!(
            "receive session running, port {local_port}, jitter capacity {}",
            config.jitter_capacity
        );
        SessionHandle {
            name: "receive",
            cancel,
            threads,
            stats,
            buffer: Some(buffer),
            fatal,
        }
    })
}

/// Wait for the device thread's startup report; on failure stop and join
/// everything spawned so far so no resource outlives the error.
fn await_ready(
    ready_rx: crossbeam_channel::Receiver<std::result::Result<(), Error>>,
    cancel: &AtomicBool,
    threads: Vec<JoinHandle<()>>,
) -> Result<Vec<JoinHandle<()>>> {
    let outcome = match ready_rx.recv_timeout(START_TIMEOUT) {
        Ok(Ok(())) => return Ok(threads),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(Error::Config("session thread did not start in time".into())),
    };
    cancel.store(true, Ordering::SeqCst);
    for handle in threads {
        let _ = handle.join();
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_snapshot_reads_all_counters() {
        let stats = SessionStats::default();
        stats.frames_sent.store(7, Ordering::Relaxed);
        stats.silence_frames.store(3, Ordering::Relaxed);

        let handle = SessionHandle {
            name: "send",
            cancel: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
            stats: Arc::new(stats),
            buffer: None,
            fatal: Arc::new(Mutex::new(None)),
        };

        let snapshot = handle.stats();
        assert_eq!(snapshot.frames_sent, 7);
        assert_eq!(snapshot.silence_frames, 3);
        assert_eq!(snapshot.buffered, 0);
        assert!(handle.is_running());
    }

    #[test]
    fn stop_surfaces_the_fatal_error_once() {
        let fatal = Arc::new(Mutex::new(None));
        store_fatal(&fatal, Error::Config("first".into()));
        store_fatal(&fatal, Error::Config("second".into()));

        let handle = SessionHandle {
            name: "receive",
            cancel: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
            stats: Arc::new(SessionStats::default()),
            buffer: None,
            fatal,
        };

        match handle.stop() {
            Err(Error::Config(msg)) => assert_eq!(msg, "first"),
            other => panic!("expected the first stored error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_config_is_rejected_before_any_resource_exists() {
        let config = SessionConfig {
            bytes_per_sample: 3,
            ..SessionConfig::default()
        };
        let result = start_send("127.0.0.1:50007".parse().unwrap(), config);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

//! Bounded jitter buffer between the listener and playback loops
//!
//! Single producer (listener), single consumer (playback). Both ends are
//! timeout-aware: the producer drops the incoming frame when the buffer
//! stays full past its timeout, the consumer reports an underrun when no
//! frame arrives in time. Arrival order is playback order; there is no
//! reordering or deduplication.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};

/// Bounded FIFO of audio frames absorbing network arrival jitter.
pub struct JitterBuffer {
    tx: Sender<Bytes>,
    rx: Receiver<Bytes>,
    capacity: usize,
    dropped: AtomicU64,
    underruns: AtomicU64,
}

impl JitterBuffer {
    /// Create a buffer holding at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            capacity,
            dropped: AtomicU64::new(0),
            underruns: AtomicU64::new(0),
        }
    }

    /// Enqueue a frame, waiting up to `timeout` for space.
    ///
    /// On a buffer full for the whole timeout the NEW frame is discarded,
    /// never an already-buffered one, and `false` is returned. Existing
    /// contents and their order are untouched.
    pub fn push(&self, frame: Bytes, timeout: Duration) -> bool {
        match self.tx.send_timeout(frame, timeout) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Dequeue the oldest frame, waiting up to `timeout` for one to arrive.
    ///
    /// `None` signals an underrun; the caller substitutes silence.
    pub fn pop(&self, timeout: Duration) -> Option<Bytes> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(_) => {
                self.underruns.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Dequeue without waiting and without counting an underrun.
    pub fn try_pop(&self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    /// Current number of buffered frames
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the buffer holds no frames
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Configured capacity in frames
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames discarded because the buffer was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Dequeue timeouts observed by the consumer
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

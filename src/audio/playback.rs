//! Audio playback with silence substitution
//!
//! The playback loop keeps the output device continuously fed: every cycle
//! it dequeues one frame from the jitter buffer, or produces one frame of
//! silence when none arrives within the dequeue timeout. The device always
//! receives exactly one frame-equivalent of data per cycle, real or silent.
//!
//! The cpal output callback drains a small bounded feed channel; the loop
//! blocks on that channel, so the device cadence paces the loop.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SampleRate, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};

use crate::audio::buffer::JitterBuffer;
use crate::audio::device;
use crate::config::SessionConfig;
use crate::constants::{DEQUEUE_TIMEOUT, PLAYBACK_FEED_FRAMES};
use crate::error::{DeviceError, Error};
use crate::session::SessionStats;

/// Running playback stream on the default output device.
///
/// Not `Send`; lives on the playback thread that created it.
pub struct PlaybackStream {
    _stream: cpal::Stream,
    feed: Sender<Bytes>,
    errors: Receiver<DeviceError>,
}

impl PlaybackStream {
    /// Open and start the default output device at the session's format.
    pub fn open(config: &SessionConfig) -> Result<Self, DeviceError> {
        let device = device::default_output()?;
        let native = device
            .default_output_config()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (feed_tx, feed_rx) = bounded(PLAYBACK_FEED_FRAMES);
        let (error_tx, error_rx) = bounded(4);

        let stream = match native.sample_format() {
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, feed_rx, error_tx),
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, feed_rx, error_tx),
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, feed_rx, error_tx),
            other => return Err(DeviceError::UnsupportedFormat(format!("{other:?}"))),
        }?;

        stream.play().map_err(|e| DeviceError::Stream(e.to_string()))?;
        tracing::info!("playback stream running at {} Hz", config.sample_rate);

        Ok(Self {
            _stream: stream,
            feed: feed_tx,
            errors: error_rx,
        })
    }

    /// Channel the playback loop feeds frames into
    pub fn feed(&self) -> &Sender<Bytes> {
        &self.feed
    }

    /// Runtime stream faults; any message here is fatal to the session
    pub fn errors(&self) -> &Receiver<DeviceError> {
        &self.errors
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    feed: Receiver<Bytes>,
    error_tx: Sender<DeviceError>,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample + FromSample<i16>,
{
    let mut current = Bytes::new();
    let mut offset = 0usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for slot in data.iter_mut() {
                    if offset + 2 > current.len() {
                        if let Ok(next) = feed.try_recv() {
                            current = next;
                            offset = 0;
                        }
                    }
                    let value = if offset + 2 <= current.len() {
                        let v = i16::from_le_bytes([current[offset], current[offset + 1]]);
                        offset += 2;
                        v
                    } else {
                        0 // feed momentarily dry
                    };
                    *slot = T::from_sample(value);
                }
            },
            move |err| {
                let _ = error_tx.try_send(DeviceError::Stream(err.to_string()));
            },
            None,
        )
        .map_err(|e| DeviceError::Stream(e.to_string()))
}

/// Drive one receive session's playback until cancelled or a fatal fault.
///
/// Every iteration produces exactly one frame for the device: a real one
/// from the jitter buffer, or `frame_bytes()` of silence on underrun.
pub(crate) fn playback_loop(
    feed: &Sender<Bytes>,
    device_errors: &Receiver<DeviceError>,
    buffer: &JitterBuffer,
    config: &SessionConfig,
    cancel: &AtomicBool,
    stats: &SessionStats,
) -> Result<(), Error> {
    let silence = Bytes::from(vec![0u8; config.frame_bytes()]);

    while !cancel.load(Ordering::SeqCst) {
        if let Ok(err) = device_errors.try_recv() {
            return Err(err.into());
        }

        let mut frame = match buffer.pop(DEQUEUE_TIMEOUT) {
            Some(frame) => frame,
            None => {
                stats.silence_frames.fetch_add(1, Ordering::Relaxed);
                silence.clone()
            }
        };

        // paced by the output device via the bounded feed channel
        loop {
            match feed.send_timeout(frame, DEQUEUE_TIMEOUT) {
                Ok(()) => {
                    stats.frames_played.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                Err(SendTimeoutError::Timeout(returned)) => {
                    if cancel.load(Ordering::SeqCst) {
                        return Ok(());
                    }
                    frame = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    return Err(DeviceError::Stream("output feed disconnected".into()).into());
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn real_frames_pass_through_in_order_then_silence() {
        let config = SessionConfig::default();
        let buffer = Arc::new(JitterBuffer::new(8));
        let cancel = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(SessionStats::default());
        let (feed_tx, feed_rx) = bounded(PLAYBACK_FEED_FRAMES);
        let (_error_tx, error_rx) = bounded(1);

        let first = Bytes::from(vec![0x11u8; config.frame_bytes()]);
        let second = Bytes::from(vec![0x22u8; config.frame_bytes()]);
        assert!(buffer.push(first.clone(), Duration::ZERO));
        assert!(buffer.push(second.clone(), Duration::ZERO));

        let worker = {
            let buffer = buffer.clone();
            let cancel = cancel.clone();
            let stats = stats.clone();
            let config = config.clone();
            thread::spawn(move || {
                playback_loop(&feed_tx, &error_rx, &buffer, &config, &cancel, &stats)
            })
        };

        assert_eq!(feed_rx.recv_timeout(Duration::from_secs(1)).unwrap(), first);
        assert_eq!(feed_rx.recv_timeout(Duration::from_secs(1)).unwrap(), second);

        // buffer now empty: the next frame must be silence of frame size
        let substituted = feed_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(substituted.len(), config.frame_bytes());
        assert!(substituted.iter().all(|&b| b == 0));

        cancel.store(true, Ordering::SeqCst);
        worker.join().unwrap().unwrap();
        assert!(stats.silence_frames.load(Ordering::Relaxed) >= 1);
        assert!(stats.frames_played.load(Ordering::Relaxed) >= 3);
    }

    #[test]
    fn device_fault_is_fatal() {
        let config = SessionConfig::default();
        let buffer = JitterBuffer::new(2);
        let cancel = AtomicBool::new(false);
        let stats = SessionStats::default();
        let (feed_tx, _feed_rx) = bounded(PLAYBACK_FEED_FRAMES);
        let (error_tx, error_rx) = bounded(1);

        error_tx
            .send(DeviceError::Stream("underlying device lost".into()))
            .unwrap();

        let result = playback_loop(&feed_tx, &error_rx, &buffer, &config, &cancel, &stats);
        assert!(matches!(result, Err(Error::Device(_))));
    }
}

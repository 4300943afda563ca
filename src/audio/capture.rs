//! Audio capture and frame packing
//!
//! The cpal input stream delivers device-sized buffers to a realtime
//! callback; a [`FramePacker`] re-cuts them into fixed wire-size frames and
//! hands those to the capture-send loop through a bounded channel. The
//! callback never blocks: if the send loop falls behind, complete frames
//! are dropped at the channel rather than stalling capture.

use bytes::{BufMut, Bytes, BytesMut};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SampleRate, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::audio::device;
use crate::config::SessionConfig;
use crate::constants::CAPTURE_CHANNEL_FRAMES;
use crate::error::DeviceError;

/// Running capture stream on the default input device.
///
/// Must stay on the thread that created it (`cpal::Stream` is not `Send`);
/// the frame and error channels are the only parts that cross threads.
pub struct CaptureStream {
    _stream: cpal::Stream,
    frames: Receiver<Bytes>,
    errors: Receiver<DeviceError>,
}

impl CaptureStream {
    /// Open and start the default input device at the session's format.
    pub fn open(config: &SessionConfig) -> Result<Self, DeviceError> {
        let device = device::default_input()?;
        let native = device
            .default_input_config()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (frame_tx, frame_rx) = bounded(CAPTURE_CHANNEL_FRAMES);
        let (error_tx, error_rx) = bounded(4);
        let packer = FramePacker::new(config.frame_bytes(), frame_tx);

        let stream = match native.sample_format() {
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, packer, error_tx),
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, packer, error_tx),
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, packer, error_tx),
            other => return Err(DeviceError::UnsupportedFormat(format!("{other:?}"))),
        }?;

        stream.play().map_err(|e| DeviceError::Stream(e.to_string()))?;
        tracing::info!("capture stream running at {} Hz", config.sample_rate);

        Ok(Self {
            _stream: stream,
            frames: frame_rx,
            errors: error_rx,
        })
    }

    /// Fixed-size frames at the device's natural cadence
    pub fn frames(&self) -> &Receiver<Bytes> {
        &self.frames
    }

    /// Runtime stream faults; any message here is fatal to the session
    pub fn errors(&self) -> &Receiver<DeviceError> {
        &self.errors
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut packer: FramePacker,
    error_tx: Sender<DeviceError>,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                packer.extend(data);
            },
            move |err| {
                let _ = error_tx.try_send(DeviceError::Stream(err.to_string()));
            },
            None,
        )
        .map_err(|e| DeviceError::Stream(e.to_string()))
}

/// Accumulates samples and emits frames of exactly `frame_bytes` bytes of
/// little-endian 16-bit PCM.
pub(crate) struct FramePacker {
    frame_bytes: usize,
    pending: BytesMut,
    tx: Sender<Bytes>,
}

impl FramePacker {
    pub(crate) fn new(frame_bytes: usize, tx: Sender<Bytes>) -> Self {
        Self {
            frame_bytes,
            pending: BytesMut::with_capacity(frame_bytes * 2),
            tx,
        }
    }

    pub(crate) fn extend<T>(&mut self, samples: &[T])
    where
        T: Copy,
        i16: FromSample<T>,
    {
        for &sample in samples {
            self.pending.put_i16_le(i16::from_sample(sample));
        }
        while self.pending.len() >= self.frame_bytes {
            let frame = self.pending.split_to(self.frame_bytes).freeze();
            // drop rather than block: this runs on the realtime callback
            let _ = self.tx.try_send(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packer_emits_exact_frames() {
        let (tx, rx) = bounded(8);
        let mut packer = FramePacker::new(8, tx); // 4 samples per frame

        packer.extend(&[1i16, 2, 3]);
        assert!(rx.try_recv().is_err());

        packer.extend(&[4i16, 5]);
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.len(), 8);
        assert_eq!(&frame[..], &[1, 0, 2, 0, 3, 0, 4, 0]);

        // the leftover sample stays pending
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn packer_splits_large_buffers() {
        let (tx, rx) = bounded(8);
        let mut packer = FramePacker::new(4, tx);

        packer.extend(&[0i16; 10]);
        assert_eq!(rx.try_iter().count(), 5);
    }

    #[test]
    fn packer_converts_f32_input() {
        let (tx, rx) = bounded(8);
        let mut packer = FramePacker::new(4, tx);

        packer.extend(&[0.0f32, 1.0]);
        let frame = rx.try_recv().unwrap();
        let first = i16::from_le_bytes([frame[0], frame[1]]);
        let second = i16::from_le_bytes([frame[2], frame[3]]);
        assert_eq!(first, 0);
        assert!(second > i16::MAX - 2);
    }
}

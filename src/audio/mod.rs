//! Audio subsystem: devices, capture, playback and jitter buffering

pub mod buffer;
pub mod capture;
pub mod device;
pub mod playback;

pub use buffer::JitterBuffer;
pub use capture::CaptureStream;
pub use device::{list_devices, DeviceInfo};
pub use playback::PlaybackStream;

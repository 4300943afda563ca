//! Audio device enumeration and lookup
//!
//! Sessions always use the host's default devices; enumeration exists so
//! the binaries can report what the host exposes.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::DeviceError;

/// Summary of one host audio device
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_input: bool,
    pub is_output: bool,
    pub is_default: bool,
}

/// List all audio devices the default host exposes.
pub fn list_devices() -> Vec<DeviceInfo> {
    let host = cpal::default_host();
    let mut devices: Vec<DeviceInfo> = Vec::new();

    let default_input = host.default_input_device().and_then(|d| d.name().ok());
    let default_output = host.default_output_device().and_then(|d| d.name().ok());

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device.name() {
                let is_default = default_input.as_ref() == Some(&name);
                devices.push(DeviceInfo {
                    name,
                    is_input: true,
                    is_output: false,
                    is_default,
                });
            }
        }
    }

    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let Ok(name) = device.name() {
                let is_default = default_output.as_ref() == Some(&name);
                // devices that are both input and output show up once
                if let Some(existing) = devices.iter_mut().find(|d| d.name == name) {
                    existing.is_output = true;
                    existing.is_default |= is_default;
                } else {
                    devices.push(DeviceInfo {
                        name,
                        is_input: false,
                        is_output: true,
                        is_default,
                    });
                }
            }
        }
    }

    devices
}

/// Default capture device, or [`DeviceError::NotFound`].
pub fn default_input() -> Result<cpal::Device, DeviceError> {
    cpal::default_host()
        .default_input_device()
        .ok_or_else(|| DeviceError::NotFound("no default input device".into()))
}

/// Default playback device, or [`DeviceError::NotFound`].
pub fn default_output() -> Result<cpal::Device, DeviceError> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| DeviceError::NotFound("no default output device".into()))
}

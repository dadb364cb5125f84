//! Audio output device selection

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::{Error, Result};

/// An output device as shown by `--list-devices`
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

fn output_devices(host: &cpal::Host) -> Result<impl Iterator<Item = cpal::Device>> {
    host.output_devices()
        .map_err(|e| Error::Audio(format!("Failed to enumerate output devices: {}", e)))
}

/// Every named output device of the default host
pub fn list_output_devices() -> Result<Vec<AudioDeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    Ok(output_devices(&host)?
        .filter_map(|device| device.name().ok())
        .map(|name| AudioDeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
        })
        .collect())
}

/// Output device called `name`, or the host's default device
pub fn get_output_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    let Some(wanted) = name else {
        return host
            .default_output_device()
            .ok_or_else(|| Error::Audio("No default output device".to_string()));
    };

    output_devices(&host)?
        .find(|device| device.name().map_or(false, |n| n == wanted))
        .ok_or_else(|| Error::Audio(format!("Output device '{}' not found", wanted)))
}

/// Stream config for a device: its default rate, at most two channels
pub fn get_output_config(device: &cpal::Device) -> Result<cpal::StreamConfig> {
    let default_config = device
        .default_output_config()
        .map_err(|e| Error::Audio(format!("No usable output config: {}", e)))?;

    let config = cpal::StreamConfig {
        channels: default_config.channels().min(2),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    log::debug!(
        "Output config for {}: {:?}",
        device.name().unwrap_or_else(|_| "unknown device".to_string()),
        config
    );
    Ok(config)
}

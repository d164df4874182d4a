//! Audio device enumeration and selection
//!
//! Enumerates devices from ALL available cpal hosts so users can pick
//! hardware regardless of which backend (ALSA, JACK, WASAPI, ...) owns
//! it. Device ids are positions in this enumeration; id −1 selects the
//! default host's default input device.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{HostId, SampleRate, SupportedBufferSize};

use super::config::DEFAULT_DEVICE_ID;
use super::error::{AudioError, AudioResult};

/// Human-readable name for a host id.
fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

/// Information about one audio device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Position in the enumeration; pass to `input_device`.
    pub id: i32,
    /// Device name as reported by the system.
    pub name: String,
    /// Host backend name (e.g., "ALSA", "JACK").
    pub host: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    /// Default sample rate in Hz (input config preferred).
    pub default_sample_rate: f64,
    /// Smallest/largest supported input buffer expressed as latency (ms).
    pub default_low_input_latency_ms: f32,
    pub default_high_input_latency_ms: f32,
    pub is_default_input: bool,
    pub is_default_output: bool,
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:>3}] [{}] {} (in: {}, out: {}, {:.0} Hz{}{})",
            self.id,
            self.host,
            self.name,
            self.max_input_channels,
            self.max_output_channels,
            self.default_sample_rate,
            if self.is_default_input { ", default input" } else { "" },
            if self.is_default_output { ", default output" } else { "" },
        )
    }
}

/// Buffer-frame extremes expressed as milliseconds at the given rate.
fn latency_range_ms(buffer_size: &SupportedBufferSize, sample_rate: SampleRate) -> (f32, f32) {
    match buffer_size {
        SupportedBufferSize::Range { min, max } => {
            let rate = sample_rate.0 as f32;
            (*min as f32 / rate * 1000.0, *max as f32 / rate * 1000.0)
        }
        SupportedBufferSize::Unknown => (0.0, 0.0),
    }
}

fn describe(device: &cpal::Device, id: i32, host: &str) -> Option<DeviceInfo> {
    let name = device.name().ok()?;

    let max_input_channels = device
        .supported_input_configs()
        .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0);
    let max_output_channels = device
        .supported_output_configs()
        .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0);

    let input_default = device.default_input_config().ok();
    let output_default = device.default_output_config().ok();

    let default_sample_rate = input_default
        .as_ref()
        .map(|c| c.sample_rate().0 as f64)
        .or_else(|| output_default.as_ref().map(|c| c.sample_rate().0 as f64))
        .unwrap_or(0.0);

    let (low_ms, high_ms) = input_default
        .as_ref()
        .map(|c| latency_range_ms(c.buffer_size(), c.sample_rate()))
        .unwrap_or((0.0, 0.0));

    Some(DeviceInfo {
        id,
        name,
        host: host.to_string(),
        max_input_channels,
        max_output_channels,
        default_sample_rate,
        default_low_input_latency_ms: low_ms,
        default_high_input_latency_ms: high_ms,
        // Filled in by the enumeration pass.
        is_default_input: false,
        is_default_output: false,
    })
}

/// Enumerate every device from every available host, in a stable order.
fn enumerate() -> AudioResult<Vec<(cpal::Device, DeviceInfo)>> {
    let mut all: Vec<(cpal::Device, DeviceInfo)> = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("device: could not initialize host {:?}: {}", host_id, e);
                continue;
            }
        };
        let host_label = host_name(host_id);

        let default_input_name = host.default_input_device().and_then(|d| d.name().ok());
        let default_output_name = host.default_output_device().and_then(|d| d.name().ok());

        let devices = match host.devices() {
            Ok(d) => d,
            Err(e) => {
                log::debug!("device: could not enumerate {:?}: {}", host_id, e);
                continue;
            }
        };

        for device in devices {
            let id = all.len() as i32;
            if let Some(mut info) = describe(&device, id, &host_label) {
                info.is_default_input = default_input_name.as_ref() == Some(&info.name);
                info.is_default_output = default_output_name.as_ref() == Some(&info.name);
                all.push((device, info));
            }
        }
    }

    if all.is_empty() {
        return Err(AudioError::NoDevices);
    }
    Ok(all)
}

/// All devices on the host system.
pub fn host_devices() -> AudioResult<Vec<DeviceInfo>> {
    let devices = enumerate()?;
    log::info!("device: enumerated {} audio devices", devices.len());
    Ok(devices.into_iter().map(|(_, info)| info).collect())
}

/// Resolve an input device by id.
///
/// Id −1 selects the default host's default input device. Other ids
/// index the `host_devices` enumeration; the device must offer at least
/// one input channel.
pub fn input_device(id: i32) -> AudioResult<(cpal::Device, DeviceInfo)> {
    if id == DEFAULT_DEVICE_ID {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioError::NoDefaultDevice("no default input device".to_string()))?;
        let info = describe(&device, DEFAULT_DEVICE_ID, &host_name(host.id()))
            .ok_or_else(|| AudioError::NoDefaultDevice("unnamed default device".to_string()))?;
        if info.max_input_channels == 0 {
            return Err(AudioError::NoInputChannels(info.name));
        }
        return Ok((device, info));
    }

    let mut devices = enumerate()?;
    if id < 0 || id as usize >= devices.len() {
        return Err(AudioError::DeviceNotFound(format!(
            "id {} (valid: 0..{}, or {} for default)",
            id,
            devices.len() - 1,
            DEFAULT_DEVICE_ID
        )));
    }

    let (device, info) = devices.swap_remove(id as usize);
    if info.max_input_channels == 0 {
        return Err(AudioError::NoInputChannels(info.name));
    }
    Ok((device, info))
}

//! Audio playback via the cpal backend.
//!
//! # Design constraints
//!
//! The cpal output callback runs on an OS audio thread at elevated priority.
//! It delivers pending handshakes and then asks the [`QuantumPump`] for
//! exactly the samples the device wants. Nothing on that path allocates,
//! locks or logs.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms. `AudioOutput` must be created
//! and dropped on the same thread; the engine opens it on a dedicated thread.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, Stream, StreamConfig,
};
use serde::{Deserialize, Serialize};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

#[cfg(feature = "audio-cpal")]
use super::pump::{PumpConfig, QuantumPump};
#[cfg(feature = "audio-cpal")]
use crate::error::SamplelineError;
use crate::{
    error::Result,
    render::{MailboxReceiver, RenderProcessor},
};

/// Metadata about an audio output device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    pub render_rate: u32,
    pub quantum_frames: usize,
    /// Exact device name; `None` or an unknown name selects the default.
    pub device: Option<String>,
}

/// Handle to an active playback stream.
///
/// **Not `Send`**: create and drop on the same OS thread.
pub struct AudioOutput {
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Cleared by [`AudioOutput::stop`]; the callback then plays silence.
    running: Arc<AtomicBool>,
    pub sample_rate: u32,
    pub channels: u16,
    pub device_name: String,
}

#[cfg(feature = "audio-cpal")]
fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[cfg(feature = "audio-cpal")]
fn to_u16(sample: f32) -> u16 {
    ((sample.clamp(-1.0, 1.0) + 1.0) * 0.5 * u16::MAX as f32) as u16
}

#[cfg(feature = "audio-cpal")]
impl AudioOutput {
    /// Open an output device and start rendering `processor` into it.
    ///
    /// # Errors
    /// - `SamplelineError::NoDefaultOutputDevice` when no device exists.
    /// - `SamplelineError::AudioDevice` when the device config cannot be read.
    /// - `SamplelineError::AudioStream` when cpal fails to build or play the
    ///   stream, or the sample format is unsupported.
    pub fn open(
        processor: Box<dyn RenderProcessor>,
        mailbox: MailboxReceiver,
        options: &OutputOptions,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let mut selected = None;

        if let Some(preferred) = options.device.as_deref() {
            match host.output_devices() {
                Ok(mut devices) => {
                    selected = devices.find(|device| {
                        device.name().map(|name| name == preferred).unwrap_or(false)
                    });
                    if selected.is_none() {
                        warn!(device = preferred, "preferred output device not found, falling back");
                    }
                }
                Err(e) => warn!("failed to list output devices while resolving preference: {e}"),
            }
        }

        let device = match selected {
            Some(device) => device,
            None => host
                .default_output_device()
                .ok_or(SamplelineError::NoDefaultOutputDevice)?,
        };
        let device_name = device.name().unwrap_or_default();

        let supported = device
            .default_output_config()
            .map_err(|e| SamplelineError::AudioDevice(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let config: StreamConfig = supported.config();

        info!(
            device = device_name.as_str(),
            sample_rate,
            channels,
            format = ?supported.sample_format(),
            "opening output device"
        );

        let pump = QuantumPump::new(
            processor,
            PumpConfig {
                quantum_frames: options.quantum_frames,
                render_rate: options.render_rate,
                device_rate: sample_rate,
            },
        )?
        .with_mailbox(mailbox);

        let ch = channels as usize;
        let err_fn = |err: cpal::StreamError| error!("audio stream error: {err}");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                let mut pump = pump;
                let running = Arc::clone(&running);
                device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        if running.load(Ordering::Relaxed) {
                            pump.fill_interleaved(data, ch, |s| s);
                        } else {
                            data.fill(0.0);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::I16 => {
                let mut pump = pump;
                let running = Arc::clone(&running);
                device.build_output_stream(
                    &config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        if running.load(Ordering::Relaxed) {
                            pump.fill_interleaved(data, ch, to_i16);
                        } else {
                            data.fill(0);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::U16 => {
                let mut pump = pump;
                let running = Arc::clone(&running);
                device.build_output_stream(
                    &config,
                    move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                        if running.load(Ordering::Relaxed) {
                            pump.fill_interleaved(data, ch, to_u16);
                        } else {
                            data.fill(to_u16(0.0));
                        }
                    },
                    err_fn,
                    None,
                )
            }
            fmt => {
                return Err(SamplelineError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| SamplelineError::AudioStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| SamplelineError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            sample_rate,
            channels,
            device_name,
        })
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioOutput {
    pub fn open(
        _processor: Box<dyn RenderProcessor>,
        _mailbox: MailboxReceiver,
        _options: &OutputOptions,
        _running: Arc<AtomicBool>,
    ) -> Result<Self> {
        Err(crate::error::SamplelineError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }
}

impl AudioOutput {
    /// Signal the callback to play silence from its next invocation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// List the output devices the default host exposes.
///
/// Returns an empty `Vec` when enumeration fails.
#[cfg(feature = "audio-cpal")]
pub fn list_output_devices() -> Vec<DeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    match host.output_devices() {
        Ok(devices) => devices
            .enumerate()
            .map(|(idx, device)| {
                let name = device
                    .name()
                    .unwrap_or_else(|_| format!("Output Device {}", idx + 1));
                let is_default = default_name.as_deref() == Some(name.as_str());
                DeviceInfo { name, is_default }
            })
            .collect(),
        Err(e) => {
            warn!("failed to enumerate output devices: {e}");
            Vec::new()
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_output_devices() -> Vec<DeviceInfo> {
    Vec::new()
}

#[cfg(all(test, feature = "audio-cpal"))]
mod tests {
    use super::*;

    #[test]
    fn integer_conversions_clamp_and_center() {
        assert_eq!(to_i16(0.0), 0);
        assert_eq!(to_i16(2.0), i16::MAX);
        assert_eq!(to_i16(-2.0), -i16::MAX);
        assert_eq!(to_u16(-1.0), 0);
        assert_eq!(to_u16(1.0), u16::MAX);
        assert!((to_u16(0.0) as i32 - 32767).abs() <= 1);
    }
}

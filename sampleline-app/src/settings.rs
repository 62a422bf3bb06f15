//! Persistent application settings (JSON file in the app data directory).

use std::fs;
use std::path::{Path, PathBuf};

use sampleline_core::{source::Waveform, EngineConfig};
use sampleline_relay::RelayConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub output_device: Option<String>,
    pub sample_rate: u32,
    pub quantum_frames: usize,
    pub ring_capacity: usize,
    pub latency_samples: usize,
    pub producer_batch: usize,
    pub tone: ToneSettings,
    pub relay_enabled: bool,
    pub relay: RelayConfig,
    /// Seconds between diagnostics log lines. 0 disables them.
    pub diagnostics_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct ToneSettings {
    pub waveform: Waveform,
    pub frequency: f32,
    pub amplitude: f32,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            waveform: Waveform::Square,
            frequency: 440.0,
            amplitude: 0.25,
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            output_device: engine.output_device,
            sample_rate: engine.sample_rate,
            quantum_frames: engine.quantum_frames,
            ring_capacity: engine.ring_capacity,
            latency_samples: engine.latency_samples,
            producer_batch: engine.producer_batch,
            tone: ToneSettings::default(),
            relay_enabled: true,
            relay: RelayConfig::default(),
            diagnostics_interval_secs: 10,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        let engine = self.to_engine_config();
        self.output_device = engine.output_device;
        self.sample_rate = engine.sample_rate;
        self.quantum_frames = engine.quantum_frames;
        self.ring_capacity = engine.ring_capacity;
        self.latency_samples = engine.latency_samples;
        self.producer_batch = engine.producer_batch;

        let nyquist = self.sample_rate as f32 / 2.0;
        self.tone.frequency = if self.tone.frequency.is_finite() {
            self.tone.frequency.clamp(1.0, nyquist)
        } else {
            ToneSettings::default().frequency
        };
        self.tone.amplitude = if self.tone.amplitude.is_finite() {
            self.tone.amplitude.clamp(0.0, 1.0)
        } else {
            ToneSettings::default().amplitude
        };

        self.relay.allowed_prefixes = normalize_prefixes(&self.relay.allowed_prefixes);
        self.relay.trusted_origin = self.relay.trusted_origin.trim().to_string();
        self.diagnostics_interval_secs = self.diagnostics_interval_secs.min(3600);
    }

    /// Override fields from `SAMPLELINE_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(device) = lookup("SAMPLELINE_OUTPUT_DEVICE") {
            self.output_device = Some(device);
        }
        if let Some(rate) = parse_var(&lookup, "SAMPLELINE_SAMPLE_RATE") {
            self.sample_rate = rate;
        }
        if let Some(latency) = parse_var(&lookup, "SAMPLELINE_LATENCY_SAMPLES") {
            self.latency_samples = latency;
        }
        if let Some(frequency) = parse_var(&lookup, "SAMPLELINE_TONE_HZ") {
            self.tone.frequency = frequency;
        }
        if let Some(addr) = parse_var(&lookup, "SAMPLELINE_RELAY_ADDR") {
            self.relay.bind_addr = addr;
        }
        if let Some(raw) = lookup("SAMPLELINE_RELAY") {
            self.relay_enabled = !matches!(raw.trim(), "0" | "false" | "off");
        }
        self.normalize();
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            sample_rate: self.sample_rate,
            quantum_frames: self.quantum_frames,
            ring_capacity: self.ring_capacity,
            latency_samples: self.latency_samples,
            producer_batch: self.producer_batch,
            output_device: self.output_device.clone(),
        }
        .normalized()
    }

    pub fn to_relay_config(&self) -> RelayConfig {
        self.relay.clone()
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = raw.as_str(), "ignoring unparsable override");
            None
        }
    }
}

fn normalize_prefixes(prefixes: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for prefix in prefixes {
        let prefix = prefix.trim();
        if prefix.is_empty() || out.iter().any(|p| p == prefix) {
            continue;
        }
        out.push(prefix.to_string());
    }
    out
}

pub fn default_settings_path() -> PathBuf {
    if let Some(path) = std::env::var_os("SAMPLELINE_SETTINGS") {
        return PathBuf::from(path);
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Sampleline")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("sampleline")
            .join("settings.json")
    }
}

/// Read settings from `path`. A missing or malformed file yields defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<AppSettings>(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), "settings file unreadable, using defaults: {e}");
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    };
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

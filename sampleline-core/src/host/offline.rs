//! Headless driver: runs a processor as fast as possible with no device.
//!
//! Used for WAV rendering and for deterministic tests of the full
//! handshake-then-render path.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;

use crate::{
    error::Result,
    render::{MailboxReceiver, RenderProcessor},
};

use super::pump::{PumpConfig, QuantumPump};

pub struct OfflineDriver {
    pump: QuantumPump,
    sample_rate: u32,
    quantum_frames: usize,
}

impl OfflineDriver {
    pub fn new(
        processor: Box<dyn RenderProcessor>,
        sample_rate: u32,
        quantum_frames: usize,
    ) -> Result<Self> {
        let pump = QuantumPump::new(processor, PumpConfig::native(sample_rate, quantum_frames))?;
        let quantum_frames = pump.config().quantum_frames;
        Ok(Self {
            pump,
            sample_rate,
            quantum_frames,
        })
    }

    pub fn with_mailbox(mut self, mailbox: MailboxReceiver) -> Self {
        self.pump = self.pump.with_mailbox(mailbox);
        self
    }

    /// Render `quanta` consecutive quanta into one buffer.
    pub fn render_quanta(&mut self, quanta: usize) -> Vec<f32> {
        let mut out = vec![0f32; quanta * self.quantum_frames];
        for quantum in out.chunks_mut(self.quantum_frames) {
            self.pump.fill(quantum);
        }
        out
    }

    /// Render `quanta` quanta to a mono 32-bit float WAV at the render rate.
    /// Returns the number of samples written.
    pub fn render_to_wav(&mut self, path: &Path, quanta: usize) -> Result<usize> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(path, spec)?;

        let mut buffer = vec![0f32; self.quantum_frames];
        let mut written = 0usize;
        for _ in 0..quanta {
            buffer.fill(0.0);
            self.pump.fill(&mut buffer);
            for sample in &buffer {
                writer.write_sample(*sample)?;
            }
            written += buffer.len();
        }
        writer.finalize()?;

        info!(path = %path.display(), samples = written, "offline render written");
        Ok(written)
    }

    pub fn processor_state(&self) -> &'static str {
        self.pump.processor_state()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn quantum_frames(&self) -> usize {
        self.quantum_frames
    }
}

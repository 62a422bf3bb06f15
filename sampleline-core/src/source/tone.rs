//! Fixed-frequency test tone.
//!
//! A square wave is what a PSG tone channel emits with the envelope off, so
//! it is the default.

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use super::SampleSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Waveform {
    #[default]
    Square,
    Sine,
}

#[derive(Debug, Clone)]
pub struct ToneSource {
    waveform: Waveform,
    frequency: f32,
    /// Clamped to [0, 1].
    amplitude: f32,
    sample_rate: u32,
    /// Position in the current period, [0, 1).
    phase: f32,
}

impl ToneSource {
    pub fn new(waveform: Waveform, frequency: f32, amplitude: f32, sample_rate: u32) -> Self {
        Self {
            waveform,
            frequency: frequency.max(0.0),
            amplitude: amplitude.clamp(0.0, 1.0),
            sample_rate: sample_rate.max(1),
            phase: 0.0,
        }
    }

    pub fn square(frequency: f32, amplitude: f32, sample_rate: u32) -> Self {
        Self::new(Waveform::Square, frequency, amplitude, sample_rate)
    }

    pub fn sine(frequency: f32, amplitude: f32, sample_rate: u32) -> Self {
        Self::new(Waveform::Sine, frequency, amplitude, sample_rate)
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    fn sample_at(&self, phase: f32) -> f32 {
        let raw = match self.waveform {
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sine => (phase * TAU).sin(),
        };
        raw * self.amplitude
    }
}

impl SampleSource for ToneSource {
    fn next_block(&mut self, out: &mut [f32]) {
        let step = self.frequency / self.sample_rate as f32;
        for sample in out.iter_mut() {
            *sample = self.sample_at(self.phase);
            self.phase = (self.phase + step).fract();
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

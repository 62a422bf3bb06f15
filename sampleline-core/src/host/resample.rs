//! Render-rate to device-rate conversion using a rubato `FastFixedIn`
//! resampler.
//!
//! The renderer always produces quanta at the emulated chip's rate (22 050 Hz
//! by default) while output devices usually run at 44.1 or 48 kHz. The
//! converter runs inside the device callback, so every buffer is allocated in
//! [`RateConverter::new`] and [`RateConverter::process_chunk`] only calls
//! rubato's `process_into_buffer`.
//!
//! When both rates match there is no rubato session at all and chunks pass
//! straight through.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::info;

use crate::error::{Result, SamplelineError};

/// Converts fixed-size mono chunks from one sample rate to another.
pub struct RateConverter {
    /// `None` in passthrough mode.
    resampler: Option<FastFixedIn<f32>>,
    /// `[1][output_frames_max]`.
    output: Vec<Vec<f32>>,
    chunk_size: usize,
}

impl RateConverter {
    /// # Errors
    /// `SamplelineError::AudioStream` if rubato rejects the ratio.
    pub fn new(render_rate: u32, device_rate: u32, chunk_size: usize) -> Result<Self> {
        if render_rate == device_rate {
            return Ok(Self {
                resampler: None,
                output: Vec::new(),
                chunk_size,
            });
        }

        let ratio = device_rate as f64 / render_rate as f64;
        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0,
            PolynomialDegree::Cubic,
            chunk_size,
            1,
        )
        .map_err(|e| SamplelineError::AudioStream(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        info!(
            render_rate,
            device_rate, chunk_size, max_out, "output resampling enabled"
        );

        Ok(Self {
            resampler: Some(resampler),
            output: vec![vec![0f32; max_out]; 1],
            chunk_size,
        })
    }

    /// Convert one chunk of exactly `chunk_size` samples.
    ///
    /// Returns the converted samples; in passthrough mode that is `input`
    /// itself. A rubato failure yields an empty slice.
    pub fn process_chunk<'a>(&'a mut self, input: &'a [f32]) -> &'a [f32] {
        let Some(resampler) = self.resampler.as_mut() else {
            return input;
        };

        match resampler.process_into_buffer(&[input], &mut self.output, None) {
            Ok((_consumed, produced)) => &self.output[0][..produced],
            Err(_) => &[],
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Upper bound on the samples one `process_chunk` call returns.
    pub fn output_frames_max(&self) -> usize {
        match &self.resampler {
            Some(resampler) => resampler.output_frames_max(),
            None => self.chunk_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_returns_input() {
        let mut rc = RateConverter::new(22_050, 22_050, 128).unwrap();
        assert!(rc.is_passthrough());
        let chunk: Vec<f32> = (0..128).map(|i| i as f32 / 128.0).collect();
        assert_eq!(rc.process_chunk(&chunk), chunk.as_slice());
        assert_eq!(rc.output_frames_max(), 128);
    }

    #[test]
    fn upsampling_roughly_doubles_length() {
        let mut rc = RateConverter::new(22_050, 44_100, 128).unwrap();
        assert!(!rc.is_passthrough());

        let chunk = vec![0.0f32; 128];
        let mut total = 0usize;
        for _ in 0..16 {
            total += rc.process_chunk(&chunk).len();
        }
        let expected = 16 * 256;
        assert!(
            (total as isize - expected as isize).unsigned_abs() <= 64,
            "total={total} expected≈{expected}"
        );
    }
}

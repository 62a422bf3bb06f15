//! `--render-wav`: run the producer and the renderer without an audio device
//! and write what the renderer emits to a WAV file.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use sampleline_core::{
    engine::producer::prime_samples,
    region::MAX_CAPACITY,
    render::mailbox,
    source::SampleSource,
    Handshake, OfflineDriver, ProcessorOptions, ProcessorRegistry, SharedRegion, Writer,
    SOUND_RENDERER,
};
use tracing::info;

use crate::settings::AppSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfflineSummary {
    pub primed: usize,
    pub generated: usize,
    pub written: usize,
}

/// Render `seconds` of `source` through the full handshake and ring path.
///
/// The ring is primed with the same silence the live engine uses, so the
/// file starts with the configured latency before the tone.
pub fn render_wav(
    settings: &AppSettings,
    mut source: Box<dyn SampleSource>,
    seconds: f32,
    path: &Path,
) -> anyhow::Result<OfflineSummary> {
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("--seconds must be a positive number");
    }
    let config = settings.to_engine_config();
    let generated = (seconds * config.sample_rate as f32).round() as usize;
    let primed = prime_samples(&config);
    let total = primed + generated;
    if total >= MAX_CAPACITY {
        bail!("{seconds}s at {} Hz does not fit in one region", config.sample_rate);
    }

    let region = SharedRegion::with_usable_capacity(total)?;
    let mut writer = Writer::new(Arc::clone(&region))?;
    writer.push_silence(primed)?;

    let mut block = vec![0f32; config.producer_batch];
    let mut remaining = generated;
    while remaining > 0 {
        let len = remaining.min(block.len());
        source.next_block(&mut block[..len]);
        writer.push(&block[..len])?;
        remaining -= len;
    }
    drop(writer);

    let options = ProcessorOptions::default();
    let processor = ProcessorRegistry::bootstrap().create(SOUND_RENDERER, &options)?;
    let (mut port, receiver) = mailbox(1);
    port.post(Handshake::new(region))
        .map_err(|_| anyhow::anyhow!("handshake mailbox full"))?;

    let mut driver = OfflineDriver::new(processor, config.sample_rate, config.quantum_frames)?
        .with_mailbox(receiver);
    let quanta = total.div_ceil(driver.quantum_frames());
    let written = driver
        .render_to_wav(path, quanta)
        .with_context(|| format!("writing {}", path.display()))?;

    let render = options.diagnostics.snapshot();
    info!(
        primed,
        generated,
        written,
        underrun = render.underrun_samples,
        "offline render complete"
    );
    Ok(OfflineSummary {
        primed,
        generated,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sampleline_core::ToneSource;

    #[test]
    fn writes_primed_silence_then_tone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let settings = AppSettings::default();
        let tone = ToneSource::square(441.0, 0.5, settings.sample_rate);

        let summary = render_wav(&settings, Box::new(tone), 0.1, &path).unwrap();
        assert_eq!(summary.primed, 3_072 - 22_050 / 60);
        assert_eq!(summary.generated, 2_205);
        assert!(summary.written >= summary.primed + summary.generated);
        assert_eq!(summary.written % 128, 0);

        let mut reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), summary.written);
        assert!(samples[..summary.primed].iter().all(|s| *s == 0.0));
        assert_eq!(samples[summary.primed], 0.5);
        let tail = summary.primed + summary.generated;
        assert!(samples[tail..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn rejects_non_positive_duration() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings::default();
        for seconds in [0.0, -1.0, f32::NAN] {
            let tone = ToneSource::square(441.0, 0.5, settings.sample_rate);
            assert!(render_wav(&settings, Box::new(tone), seconds, &dir.path().join("x.wav")).is_err());
        }
    }
}

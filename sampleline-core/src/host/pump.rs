use crate::{
    error::Result,
    render::{MailboxReceiver, RenderProcessor},
};

use super::resample::RateConverter;

/// Render quantum in samples, as fixed by the audio runtime contract.
pub const DEFAULT_QUANTUM_FRAMES: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpConfig {
    pub quantum_frames: usize,
    /// Rate the processor renders at.
    pub render_rate: u32,
    /// Rate the device buffers are consumed at.
    pub device_rate: u32,
}

impl PumpConfig {
    /// A pump that renders straight to the output without resampling.
    pub fn native(render_rate: u32, quantum_frames: usize) -> Self {
        Self {
            quantum_frames,
            render_rate,
            device_rate: render_rate,
        }
    }
}

/// Adapts a [`RenderProcessor`] to device buffers of any size.
///
/// The processor is always driven in whole quanta of `quantum_frames` mono
/// samples; each quantum buffer is zeroed before `process` is called. The
/// rendered (and, if needed, resampled) samples are then handed out one frame
/// at a time and fanned out to every device channel.
///
/// All buffers are allocated in [`QuantumPump::new`].
pub struct QuantumPump {
    processor: Box<dyn RenderProcessor>,
    mailbox: Option<MailboxReceiver>,
    quantum: Vec<f32>,
    converter: RateConverter,
    pending: Vec<f32>,
    pending_pos: usize,
    pending_len: usize,
    active: bool,
    config: PumpConfig,
}

impl QuantumPump {
    pub fn new(processor: Box<dyn RenderProcessor>, config: PumpConfig) -> Result<Self> {
        let quantum_frames = config.quantum_frames.max(1);
        let converter = RateConverter::new(config.render_rate, config.device_rate, quantum_frames)?;
        let pending = vec![0f32; converter.output_frames_max().max(quantum_frames)];

        Ok(Self {
            processor,
            mailbox: None,
            quantum: vec![0f32; quantum_frames],
            converter,
            pending,
            pending_pos: 0,
            pending_len: 0,
            active: true,
            config: PumpConfig {
                quantum_frames,
                ..config
            },
        })
    }

    /// Deliver control messages from `mailbox` before every fill.
    pub fn with_mailbox(mut self, mailbox: MailboxReceiver) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    /// Fill a mono buffer at the device rate.
    pub fn fill(&mut self, out: &mut [f32]) {
        self.fill_interleaved(out, 1, |sample| sample);
    }

    /// Fill an interleaved buffer of `channels` channels, converting each
    /// sample with `convert`.
    pub fn fill_interleaved<T, F>(&mut self, out: &mut [T], channels: usize, convert: F)
    where
        T: Copy,
        F: Fn(f32) -> T,
    {
        if let Some(mailbox) = self.mailbox.as_mut() {
            mailbox.deliver(self.processor.as_mut());
        }

        for frame in out.chunks_mut(channels.max(1)) {
            let value = convert(self.next_sample());
            frame.fill(value);
        }
    }

    fn next_sample(&mut self) -> f32 {
        if self.pending_pos == self.pending_len {
            self.render_quantum();
        }
        if self.pending_pos == self.pending_len {
            return 0.0;
        }
        let sample = self.pending[self.pending_pos];
        self.pending_pos += 1;
        sample
    }

    fn render_quantum(&mut self) {
        self.quantum.fill(0.0);
        if self.active {
            self.active = self.processor.process(&mut self.quantum);
        }

        let converted = self.converter.process_chunk(&self.quantum);
        let len = converted.len().min(self.pending.len());
        self.pending[..len].copy_from_slice(&converted[..len]);
        self.pending_pos = 0;
        self.pending_len = len;
    }

    /// `false` once the processor asked to stop; the pump then renders
    /// silence.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn processor_state(&self) -> &'static str {
        self.processor.state_name()
    }

    pub fn config(&self) -> PumpConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::render::{Handshake, HandshakeOutcome};

    /// Writes a per-quantum counter so output order can be checked.
    struct Counter {
        quanta: Arc<AtomicUsize>,
        stop_after: usize,
    }

    impl RenderProcessor for Counter {
        fn on_message(&mut self, message: Handshake) -> HandshakeOutcome {
            HandshakeOutcome::Ignored(message)
        }

        fn process(&mut self, output: &mut [f32]) -> bool {
            assert!(output.iter().all(|s| *s == 0.0), "quantum not zeroed");
            let n = self.quanta.fetch_add(1, Ordering::Relaxed) + 1;
            output.fill(n as f32);
            n < self.stop_after
        }

        fn state_name(&self) -> &'static str {
            "counter"
        }
    }

    fn pump(stop_after: usize) -> (QuantumPump, Arc<AtomicUsize>) {
        let quanta = Arc::new(AtomicUsize::new(0));
        let processor = Box::new(Counter {
            quanta: Arc::clone(&quanta),
            stop_after,
        });
        let pump = QuantumPump::new(processor, PumpConfig::native(22_050, 4)).unwrap();
        (pump, quanta)
    }

    #[test]
    fn odd_buffer_sizes_consume_whole_quanta_in_order() {
        let (mut pump, quanta) = pump(usize::MAX);
        let mut a = [0f32; 3];
        let mut b = [0f32; 6];
        pump.fill(&mut a);
        pump.fill(&mut b);
        assert_eq!(a, [1.0, 1.0, 1.0]);
        assert_eq!(b, [1.0, 2.0, 2.0, 2.0, 2.0, 3.0]);
        assert_eq!(quanta.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn mono_is_fanned_out_to_every_channel() {
        let (mut pump, _) = pump(usize::MAX);
        let mut out = [0i16; 8];
        pump.fill_interleaved(&mut out, 2, |s| (s * 100.0) as i16);
        assert_eq!(out, [100; 8]);
    }

    #[test]
    fn processor_returning_false_goes_silent() {
        let (mut pump, quanta) = pump(1);
        let mut out = [0f32; 8];
        pump.fill(&mut out);
        assert!(!pump.is_active());
        assert_eq!(out, [1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(quanta.load(Ordering::Relaxed), 1);
        assert_eq!(pump.processor_state(), "counter");
    }

    /// Renders a constant level and counts quanta.
    struct Level {
        quanta: Arc<AtomicUsize>,
    }

    impl RenderProcessor for Level {
        fn on_message(&mut self, message: Handshake) -> HandshakeOutcome {
            HandshakeOutcome::Ignored(message)
        }

        fn process(&mut self, output: &mut [f32]) -> bool {
            self.quanta.fetch_add(1, Ordering::Relaxed);
            output.fill(0.5);
            true
        }

        fn state_name(&self) -> &'static str {
            "level"
        }
    }

    #[test]
    fn resampling_pump_stretches_quanta_to_the_device_rate() {
        let quanta = Arc::new(AtomicUsize::new(0));
        let processor = Box::new(Level {
            quanta: Arc::clone(&quanta),
        });
        let config = PumpConfig {
            quantum_frames: 128,
            render_rate: 22_050,
            device_rate: 48_000,
        };
        let mut pump = QuantumPump::new(processor, config).unwrap();

        // 20 device buffers of 10 ms each.
        let mut played = Vec::with_capacity(20 * 480);
        let mut out = [0f32; 480];
        for _ in 0..20 {
            pump.fill(&mut out);
            played.extend_from_slice(&out);
        }

        // Skip the resampler's warm-up, then the level must come through.
        for (i, sample) in played.iter().enumerate().skip(960) {
            assert!((sample - 0.5).abs() < 1e-3, "sample {i} = {sample}");
        }
        // 9600 device samples need about 9600 / (128 * 48000 / 22050) quanta.
        let rendered = quanta.load(Ordering::Relaxed);
        assert!((34..=37).contains(&rendered), "rendered {rendered} quanta");
    }
}

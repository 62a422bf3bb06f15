//! Paced producer loop feeding the shared ring.
//!
//! ## Loop
//!
//! ```text
//! prime ring with (latency - rate/60) zero samples
//! loop while running:
//!     due = elapsed wall time × sample_rate
//!     while generated < due:
//!         source.next_block(batch) → writer.push(batch)
//!         short push → count the dropped tail as overrun
//!     stop if the consumer bound and then detached
//!     sleep a fraction of one batch
//! ```
//!
//! While playback is paused nothing is written. After a resume the loop
//! waits until the renderer has flushed what it wrote earlier, then primes
//! again and restarts its pacing clock.
//!
//! The writer is dropped when the loop returns, which is how the consumer
//! side learns the producer has gone.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::EngineConfig;
use crate::{render::PlaybackControl, ring::Writer, source::SampleSource};

#[derive(Debug, Default)]
pub struct ProducerDiagnostics {
    pub primed_samples: AtomicU64,
    pub batches: AtomicU64,
    pub samples_generated: AtomicU64,
    pub samples_written: AtomicU64,
    pub overrun_samples: AtomicU64,
    pub write_errors: AtomicU64,
}

impl ProducerDiagnostics {
    pub fn reset(&self) {
        self.primed_samples.store(0, Ordering::Relaxed);
        self.batches.store(0, Ordering::Relaxed);
        self.samples_generated.store(0, Ordering::Relaxed);
        self.samples_written.store(0, Ordering::Relaxed);
        self.overrun_samples.store(0, Ordering::Relaxed);
        self.write_errors.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProducerSnapshot {
        ProducerSnapshot {
            primed_samples: self.primed_samples.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            samples_generated: self.samples_generated.load(Ordering::Relaxed),
            samples_written: self.samples_written.load(Ordering::Relaxed),
            overrun_samples: self.overrun_samples.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerSnapshot {
    pub primed_samples: u64,
    pub batches: u64,
    pub samples_generated: u64,
    pub samples_written: u64,
    pub overrun_samples: u64,
    pub write_errors: u64,
}

/// All context the producer needs, passed as one struct so the thread
/// closure stays tidy.
pub struct ProducerContext {
    pub config: EngineConfig,
    pub source: Box<dyn SampleSource>,
    pub writer: Writer,
    pub running: Arc<AtomicBool>,
    pub control: Arc<PlaybackControl>,
    pub diagnostics: Arc<ProducerDiagnostics>,
}

/// Silence queued before the first batch so the consumer starts with
/// `latency_samples` of headroom minus one 60 Hz frame.
pub fn prime_samples(config: &EngineConfig) -> usize {
    config
        .latency_samples
        .saturating_sub(config.sample_rate as usize / 60)
}

/// Run the producer until `running` clears or the consumer detaches.
pub fn run(mut ctx: ProducerContext) {
    let batch_len = ctx.config.producer_batch.max(1);
    let sample_rate = ctx.config.sample_rate.max(1) as f64;
    let idle = Duration::from_secs_f64((batch_len as f64 / sample_rate / 4.0).min(0.005));

    let prime = prime_samples(&ctx.config);
    prime_ring(&mut ctx, prime);

    info!(
        sample_rate = ctx.config.sample_rate,
        batch = batch_len,
        prime,
        usable = ctx.writer.region().usable_capacity(),
        "producer started"
    );

    let mut batch = vec![0f32; batch_len];
    let mut generated: u64 = 0;
    let mut consumer_seen = false;
    let mut started = Instant::now();
    let mut resumes_seen = ctx.control.resumes();
    let mut flush_ticket: Option<u64> = None;

    while ctx.running.load(Ordering::Relaxed) {
        if ctx.writer.consumer_attached() {
            consumer_seen = true;
        } else if consumer_seen {
            info!("consumer detached, producer stopping");
            break;
        }

        if ctx.control.is_paused() {
            thread::sleep(idle);
            continue;
        }

        // Resumed since the last pass: everything this loop wrote before is
        // stale. Wait for the renderer to drop it, then re-prime.
        let resumes = ctx.control.resumes();
        if resumes != resumes_seen {
            resumes_seen = resumes;
            flush_ticket = Some(ctx.control.request_flush());
        }
        if let Some(ticket) = flush_ticket {
            if !ctx.control.is_flushed(ticket) {
                thread::sleep(idle);
                continue;
            }
            flush_ticket = None;
            prime_ring(&mut ctx, prime);
            generated = 0;
            started = Instant::now();
            debug!(prime, "producer re-primed after resume");
        }

        let due = (started.elapsed().as_secs_f64() * sample_rate) as u64;

        while generated < due
            && ctx.running.load(Ordering::Relaxed)
            && !ctx.control.is_paused()
        {
            ctx.source.next_block(&mut batch);
            generated += batch_len as u64;
            ctx.diagnostics.batches.fetch_add(1, Ordering::Relaxed);
            ctx.diagnostics
                .samples_generated
                .fetch_add(batch_len as u64, Ordering::Relaxed);

            match ctx.writer.push(&batch) {
                Ok(written) => {
                    ctx.diagnostics
                        .samples_written
                        .fetch_add(written as u64, Ordering::Relaxed);
                    if written < batch_len {
                        ctx.diagnostics
                            .overrun_samples
                            .fetch_add((batch_len - written) as u64, Ordering::Relaxed);
                    }
                }
                Err(e) => {
                    ctx.diagnostics.write_errors.fetch_add(1, Ordering::Relaxed);
                    debug!("push failed: {e}");
                }
            }
        }

        thread::sleep(idle);
    }

    let snap = ctx.diagnostics.snapshot();
    info!(
        generated = snap.samples_generated,
        written = snap.samples_written,
        overrun = snap.overrun_samples,
        "producer stopped"
    );
}

fn prime_ring(ctx: &mut ProducerContext, prime: usize) {
    match ctx.writer.push_silence(prime) {
        Ok(primed) => {
            ctx.diagnostics
                .primed_samples
                .fetch_add(primed as u64, Ordering::Relaxed);
        }
        Err(e) => {
            warn!("priming failed: {e}");
            ctx.diagnostics.write_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{region::SharedRegion, ring::Reader, source::ToneSource};

    fn context(
        region: &Arc<SharedRegion>,
        config: EngineConfig,
    ) -> (ProducerContext, Arc<AtomicBool>, Arc<ProducerDiagnostics>) {
        let running = Arc::new(AtomicBool::new(true));
        let diagnostics = Arc::new(ProducerDiagnostics::default());
        let ctx = ProducerContext {
            source: Box::new(ToneSource::square(440.0, 0.5, config.sample_rate)),
            writer: Writer::new(Arc::clone(region)).unwrap(),
            running: Arc::clone(&running),
            control: Arc::default(),
            diagnostics: Arc::clone(&diagnostics),
            config,
        };
        (ctx, running, diagnostics)
    }

    #[test]
    fn prime_is_latency_minus_one_frame() {
        assert_eq!(prime_samples(&EngineConfig::default()), 3072 - 367);
        let tight = EngineConfig {
            latency_samples: 100,
            ..EngineConfig::default()
        };
        assert_eq!(prime_samples(&tight), 0);
    }

    #[test]
    fn primes_then_stops_when_running_clears() {
        let config = EngineConfig::default();
        let region = SharedRegion::with_usable_capacity(config.ring_capacity).unwrap();
        let (ctx, running, diagnostics) = context(&region, config);

        let handle = thread::spawn(move || run(ctx));
        thread::sleep(Duration::from_millis(60));
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();

        let snap = diagnostics.snapshot();
        assert_eq!(snap.primed_samples, 2705);
        assert!(snap.batches >= 1);
        assert!(!region.has_producer());
        assert!(region.occupancy() >= 2705);
    }

    #[test]
    fn full_ring_counts_overrun() {
        let config = EngineConfig {
            latency_samples: 0,
            producer_batch: 512,
            ..EngineConfig::default()
        };
        let region = SharedRegion::with_usable_capacity(600).unwrap();
        let (ctx, running, diagnostics) = context(&region, config);

        let handle = thread::spawn(move || run(ctx));
        thread::sleep(Duration::from_millis(150));
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();

        let snap = diagnostics.snapshot();
        assert_eq!(region.occupancy(), 600);
        assert_eq!(snap.samples_written, 600);
        assert_eq!(
            snap.overrun_samples,
            snap.samples_generated - snap.samples_written
        );
    }

    #[test]
    fn stops_once_bound_consumer_detaches() {
        let config = EngineConfig::default();
        let region = SharedRegion::with_usable_capacity(config.ring_capacity).unwrap();
        let reader = Reader::new(Arc::clone(&region)).unwrap();
        let (ctx, running, _) = context(&region, config);

        let handle = thread::spawn(move || run(ctx));
        thread::sleep(Duration::from_millis(30));
        drop(reader);
        handle.join().unwrap();

        // Exited on its own.
        assert!(running.load(Ordering::Relaxed));
        assert!(!region.has_producer());
    }

    /// Emits 1, 2, 3, ... so every sample names the batch it came from.
    struct Counting(f32);

    impl SampleSource for Counting {
        fn next_block(&mut self, out: &mut [f32]) {
            for sample in out {
                self.0 += 1.0;
                *sample = self.0;
            }
        }

        fn reset(&mut self) {
            self.0 = 0.0;
        }
    }

    #[test]
    fn stale_samples_are_never_played_after_resume() {
        use crate::render::{Handshake, RenderProcessor, SoundRenderer};

        let config = EngineConfig::default();
        let region = SharedRegion::with_usable_capacity(config.ring_capacity).unwrap();
        let control = Arc::new(PlaybackControl::default());
        let mut renderer = SoundRenderer::default().with_control(Arc::clone(&control));
        renderer.on_message(Handshake::new(Arc::clone(&region)));

        let (mut ctx, running, diagnostics) = context(&region, config);
        ctx.source = Box::new(Counting(0.0));
        ctx.control = Arc::clone(&control);
        let handle = thread::spawn(move || run(ctx));

        let mut out = [0f32; 128];
        for _ in 0..10 {
            out.fill(0.0);
            renderer.process(&mut out);
            thread::sleep(Duration::from_millis(2));
        }

        assert!(control.pause());
        thread::sleep(Duration::from_millis(50));
        let last_stale = diagnostics.snapshot().samples_generated as f32;
        assert!(region.occupancy() > 0);

        assert!(control.resume());
        let mut fresh = Vec::new();
        for _ in 0..80 {
            out.fill(0.0);
            renderer.process(&mut out);
            fresh.extend(out.iter().copied().filter(|s| *s != 0.0));
            thread::sleep(Duration::from_millis(2));
        }

        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();

        assert!(!fresh.is_empty());
        assert!(fresh.iter().all(|s| *s > last_stale));
        assert!(renderer.diagnostics().snapshot().samples_discarded > 0);
        assert_eq!(diagnostics.snapshot().primed_samples, 2 * 2705);
    }
}

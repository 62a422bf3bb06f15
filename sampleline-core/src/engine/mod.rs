//! `SamplelineEngine`: top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! SamplelineEngine::new()
//!     └─► start(source)  → region allocated, producer + output threads spawned,
//!                          handshake posted, status = Running
//!         ├─► pause()    → output silent, producer held, status = Paused
//!         ├─► resume()   → buffered samples flushed, ring re-primed,
//!         │                status = Running
//!         └─► stop()     → running=false, threads joined, status = Stopped
//! ```
//!
//! `start()`/`stop()` return an error when called in the wrong state rather
//! than panicking.
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send`, so `AudioOutput` is created *inside* the output
//! thread and dropped there. A crossbeam oneshot propagates open errors back
//! to the `start()` caller. The producer runs on its own thread.
//!
//! ## Teardown
//!
//! The region is reference counted, so neither side can ever observe it
//! freed. Whichever side leaves first drops its role claim: the reader then
//! drains what is left and renders silence, the producer stops writing.

pub mod producer;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    error::{Result, SamplelineError},
    events::{DiagnosticsReport, EngineStatus, EngineStatusEvent},
    host::{AudioOutput, OutputOptions, DEFAULT_QUANTUM_FRAMES},
    region::SharedRegion,
    registry::{ProcessorOptions, ProcessorRegistry, SOUND_RENDERER},
    render::{mailbox, Handshake, PlaybackControl, RenderDiagnostics, DEFAULT_MAILBOX_CAPACITY},
    ring::Writer,
    source::SampleSource,
};

pub use producer::{ProducerDiagnostics, ProducerSnapshot};

/// Broadcast channel capacity for status events.
const BROADCAST_CAP: usize = 64;

/// How often the output thread wakes to collect returned handshakes.
const OUTPUT_POLL: Duration = Duration::from_millis(50);

/// Configuration for `SamplelineEngine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Render rate of the emulated sound chip (Hz). Default: 22050.
    pub sample_rate: u32,
    /// Samples per render quantum. Default: 128.
    pub quantum_frames: usize,
    /// Usable ring capacity in samples. Default: 22050 (one second).
    pub ring_capacity: usize,
    /// Target buffered latency in samples. Default: 3072.
    pub latency_samples: usize,
    /// Samples generated per producer iteration. Default: 512.
    pub producer_batch: usize,
    /// Exact output device name. `None` selects the default device.
    pub output_device: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            quantum_frames: DEFAULT_QUANTUM_FRAMES,
            ring_capacity: 22_050,
            latency_samples: 3_072,
            producer_batch: 512,
            output_device: None,
        }
    }
}

impl EngineConfig {
    /// Clamp every field into a workable range.
    pub fn normalized(mut self) -> Self {
        self.sample_rate = self.sample_rate.clamp(8_000, 192_000);
        self.quantum_frames = self.quantum_frames.clamp(16, 4_096);
        self.producer_batch = self.producer_batch.clamp(16, 16_384);
        self.latency_samples = self.latency_samples.min(self.sample_rate as usize * 4);
        let floor = self.latency_samples + self.producer_batch;
        self.ring_capacity = self.ring_capacity.max(floor).min(crate::region::MAX_CAPACITY - 1);
        self.output_device = self
            .output_device
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        self
    }
}

/// The top-level engine handle.
///
/// `SamplelineEngine` is `Send + Sync`; all fields use interior mutability.
pub struct SamplelineEngine {
    config: EngineConfig,
    registry: ProcessorRegistry,
    /// `true` while producer + output are active.
    running: Arc<AtomicBool>,
    control: Arc<PlaybackControl>,
    status: Arc<Mutex<EngineStatus>>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    render_diagnostics: Arc<RenderDiagnostics>,
    producer_diagnostics: Arc<ProducerDiagnostics>,
    region: Mutex<Option<Arc<SharedRegion>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl SamplelineEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(config, ProcessorRegistry::bootstrap())
    }

    /// Use a caller-built registry; it must contain [`SOUND_RENDERER`].
    pub fn with_registry(config: EngineConfig, registry: ProcessorRegistry) -> Self {
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            config: config.normalized(),
            registry,
            running: Arc::new(AtomicBool::new(false)),
            control: Arc::new(PlaybackControl::default()),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            status_tx,
            render_diagnostics: Arc::new(RenderDiagnostics::default()),
            producer_diagnostics: Arc::new(ProducerDiagnostics::default()),
            region: Mutex::new(None),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Allocate the ring, start producing from `source` and open the output
    /// device.
    ///
    /// Blocks until the device is confirmed open (or fails).
    ///
    /// # Errors
    /// - `SamplelineError::AlreadyRunning` if already started.
    /// - `SamplelineError::NoDefaultOutputDevice` / `AudioDevice` /
    ///   `AudioStream` on device failure.
    pub fn start(&self, source: Box<dyn SampleSource>) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SamplelineError::AlreadyRunning);
        }
        self.join_threads();

        self.render_diagnostics.reset();
        self.producer_diagnostics.reset();
        self.control.reset();

        let region = SharedRegion::with_usable_capacity(self.config.ring_capacity)?;
        let writer = Writer::new(Arc::clone(&region))?;
        let processor = self.registry.create(
            SOUND_RENDERER,
            &ProcessorOptions {
                diagnostics: Arc::clone(&self.render_diagnostics),
                control: Arc::clone(&self.control),
            },
        )?;

        let (mut port, receiver) = mailbox(DEFAULT_MAILBOX_CAPACITY);
        port.post(Handshake::new(Arc::clone(&region)))
            .map_err(|_| SamplelineError::Other(anyhow::anyhow!("handshake mailbox full")))?;

        self.running.store(true, Ordering::SeqCst);

        let (open_tx, open_rx) = crossbeam_channel::bounded::<Result<(String, u32)>>(1);
        let running = Arc::clone(&self.running);
        let options = OutputOptions {
            render_rate: self.config.sample_rate,
            quantum_frames: self.config.quantum_frames,
            device: self.config.output_device.clone(),
        };

        let output_thread = thread::Builder::new()
            .name("sampleline-output".into())
            .spawn(move || {
                // Open on THIS thread: cpal::Stream is !Send.
                let output =
                    match AudioOutput::open(processor, receiver, &options, Arc::clone(&running)) {
                        Ok(output) => {
                            let _ = open_tx.send(Ok((output.device_name.clone(), output.sample_rate)));
                            output
                        }
                        Err(e) => {
                            let _ = open_tx.send(Err(e));
                            running.store(false, Ordering::SeqCst);
                            return;
                        }
                    };

                while running.load(Ordering::Relaxed) {
                    // Duplicate handshakes come back here to be released.
                    drop(port.collect_returned());
                    thread::sleep(OUTPUT_POLL);
                }

                output.stop();
                // Stream drops here, releasing the device on this thread.
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                SamplelineError::Io(e)
            })?;

        match open_rx.recv() {
            Ok(Ok((device, device_rate))) => {
                info!(device = device.as_str(), device_rate, "output stream open");
            }
            Ok(Err(e)) => {
                let _ = output_thread.join();
                self.fail(&e);
                return Err(e);
            }
            Err(_) => {
                let _ = output_thread.join();
                let e = SamplelineError::Other(anyhow::anyhow!("output thread died unexpectedly"));
                self.fail(&e);
                return Err(e);
            }
        }

        let ctx = producer::ProducerContext {
            config: self.config.clone(),
            source,
            writer,
            running: Arc::clone(&self.running),
            control: Arc::clone(&self.control),
            diagnostics: Arc::clone(&self.producer_diagnostics),
        };
        let producer_thread = match thread::Builder::new()
            .name("sampleline-producer".into())
            .spawn(move || producer::run(ctx))
        {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = output_thread.join();
                let e = SamplelineError::Io(e);
                self.fail(&e);
                return Err(e);
            }
        };

        {
            let mut threads = self.threads.lock();
            threads.push(output_thread);
            threads.push(producer_thread);
        }
        *self.region.lock() = Some(region);

        self.set_status(EngineStatus::Running, None);
        info!("engine started");
        Ok(())
    }

    /// Stop the producer and the output stream and wait for both threads.
    ///
    /// # Errors
    /// - `SamplelineError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(SamplelineError::NotRunning);
        }

        self.join_threads();
        *self.region.lock() = None;
        self.set_status(EngineStatus::Stopped, None);
        info!("engine stopped");
        Ok(())
    }

    /// Silence the output and hold the producer. Buffered samples are kept
    /// until [`resume`](Self::resume), which discards them. Pausing twice is
    /// a no-op.
    ///
    /// # Errors
    /// - `SamplelineError::NotRunning` if not currently running.
    pub fn pause(&self) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(SamplelineError::NotRunning);
        }
        if self.control.pause() {
            self.set_status(EngineStatus::Paused, None);
            info!("engine paused");
        }
        Ok(())
    }

    /// Resume after [`pause`](Self::pause). Nothing written before the
    /// pause is played; the ring restarts from fresh priming silence.
    ///
    /// # Errors
    /// - `SamplelineError::NotRunning` if not currently running.
    pub fn resume(&self) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(SamplelineError::NotRunning);
        }
        if self.control.resume() {
            self.set_status(EngineStatus::Running, None);
            info!("engine resumed");
        }
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// Subscribe to live status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    pub fn render_diagnostics(&self) -> Arc<RenderDiagnostics> {
        Arc::clone(&self.render_diagnostics)
    }

    pub fn producer_diagnostics(&self) -> Arc<ProducerDiagnostics> {
        Arc::clone(&self.producer_diagnostics)
    }

    /// Counters from both sides plus the current ring occupancy.
    pub fn diagnostics_report(&self) -> DiagnosticsReport {
        DiagnosticsReport {
            render: self.render_diagnostics.snapshot(),
            producer: self.producer_diagnostics.snapshot(),
            buffered: self
                .region
                .lock()
                .as_ref()
                .map(|region| region.occupancy())
                .unwrap_or(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn join_threads(&self) {
        let handles: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("engine thread panicked");
            }
        }
    }

    fn fail(&self, error: &SamplelineError) {
        self.running.store(false, Ordering::SeqCst);
        self.set_status(EngineStatus::Error, Some(error.to_string()));
    }

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(EngineStatusEvent {
            status: new_status,
            detail,
        });
    }
}

impl Drop for SamplelineEngine {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.join_threads();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_emulated_chip() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 22_050);
        assert_eq!(config.quantum_frames, 128);
        assert_eq!(config.latency_samples, 3_072);
        assert_eq!(config.producer_batch, 512);
        assert_eq!(config.clone().normalized(), config);
    }

    #[test]
    fn normalize_grows_ring_to_hold_latency_and_a_batch() {
        let config = EngineConfig {
            ring_capacity: 10,
            output_device: Some("   ".into()),
            ..EngineConfig::default()
        }
        .normalized();
        assert_eq!(config.ring_capacity, 3_072 + 512);
        assert_eq!(config.output_device, None);
    }

    #[test]
    fn config_deserializes_with_defaults_for_missing_fields() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"sampleRate": 44100, "outputDevice": "Speakers"}"#).unwrap();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.producer_batch, 512);
        assert_eq!(config.output_device.as_deref(), Some("Speakers"));
    }

    #[test]
    fn stop_before_start_is_an_error() {
        let engine = SamplelineEngine::new(EngineConfig::default());
        assert_eq!(engine.status(), EngineStatus::Idle);
        assert!(matches!(engine.stop(), Err(SamplelineError::NotRunning)));
        assert_eq!(engine.diagnostics_report().buffered, 0);
    }

    #[test]
    fn pause_and_resume_need_a_running_engine() {
        let engine = SamplelineEngine::new(EngineConfig::default());
        assert!(matches!(engine.pause(), Err(SamplelineError::NotRunning)));
        assert!(matches!(engine.resume(), Err(SamplelineError::NotRunning)));
        assert!(!engine.is_paused());
        assert_eq!(engine.status(), EngineStatus::Idle);
    }

    #[test]
    fn missing_renderer_fails_start_without_running() {
        let engine =
            SamplelineEngine::with_registry(EngineConfig::default(), ProcessorRegistry::new());
        let source = Box::new(crate::source::ToneSource::square(440.0, 0.5, 22_050));
        assert!(matches!(
            engine.start(source),
            Err(SamplelineError::UnknownProcessor(_))
        ));
        assert!(!engine.is_running());
    }
}

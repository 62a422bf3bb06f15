//! # sampleline-core
//!
//! Lock-free audio streaming from a free-running emulator to a realtime
//! output callback.
//!
//! ## Architecture
//!
//! ```text
//! SampleSource → producer::run ─► Writer ─┐
//!                                         │  SharedRegion
//!                                         │  [write u32][read u32][f32 × capacity]
//! HandshakePort ──(Handshake)──► Mailbox  │
//!                                  │      │
//!                                  ▼      ▼
//!               QuantumPump → SoundRenderer::process → Reader::pop
//!                    │
//!              AudioOutput (cpal) / OfflineDriver (hound)
//! ```
//!
//! The render path is zero-alloc and lock-free. All heap work happens on the
//! producer and control threads.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod events;
pub mod host;
pub mod region;
pub mod registry;
pub mod render;
pub mod ring;
pub mod source;

// Convenience re-exports for downstream crates
pub use engine::{EngineConfig, SamplelineEngine};
pub use error::SamplelineError;
pub use events::{DiagnosticsReport, EngineStatus, EngineStatusEvent};
pub use host::{OfflineDriver, QuantumPump};
pub use region::SharedRegion;
pub use registry::{ProcessorOptions, ProcessorRegistry, SOUND_RENDERER};
pub use render::{
    Handshake, HandshakeOutcome, PlaybackControl, RenderProcessor, RenderState, SoundRenderer,
};
pub use ring::{create_ring, Reader, Writer};
pub use source::{SampleSource, ToneSource};

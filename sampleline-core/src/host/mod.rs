//! Adapters binding a [`RenderProcessor`](crate::render::RenderProcessor) to
//! something that actually consumes audio: a cpal output device or a headless
//! offline loop.

pub mod offline;
pub mod output;
pub mod pump;
pub mod resample;

pub use offline::OfflineDriver;
pub use output::{list_output_devices, AudioOutput, DeviceInfo, OutputOptions};
pub use pump::{PumpConfig, QuantumPump, DEFAULT_QUANTUM_FRAMES};
pub use resample::RateConverter;

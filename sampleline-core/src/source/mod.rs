//! Sample sources feeding the producer side of the ring.
//!
//! The `SampleSource` trait is the seam where an emulated sound chip plugs
//! in. [`ToneSource`] is the built-in stand-in used by the app and tests.

pub mod tone;

pub use tone::{ToneSource, Waveform};

/// A mono sample generator running at the render rate.
pub trait SampleSource: Send + 'static {
    /// Overwrite all of `out` with the next samples, each in [-1, 1].
    fn next_block(&mut self, out: &mut [f32]);

    /// Restart from the initial state.
    fn reset(&mut self);
}

//! Realtime render callback and its handshake.
//!
//! ## State machine
//!
//! ```text
//! Uninitialized ──(handshake bound)──► Ready(Reader)
//! ```
//!
//! `Ready` is terminal. While `Uninitialized` every tick leaves the output
//! untouched; once `Ready` every tick performs exactly one
//! [`Reader::pop`](crate::ring::Reader::pop) over the whole output channel,
//! unless playback is paused through [`PlaybackControl`].
//!
//! Host runtimes drive a processor through [`RenderProcessor`]; the adapters
//! in [`crate::host`] are the only code that knows about a concrete runtime.

pub mod control;
pub mod diagnostics;
pub mod handshake;
pub mod mailbox;
pub mod renderer;

pub use control::PlaybackControl;
pub use diagnostics::{RenderDiagnostics, RenderSnapshot};
pub use handshake::{Handshake, HandshakeOutcome};
pub use mailbox::{mailbox, HandshakePort, MailboxReceiver, DEFAULT_MAILBOX_CAPACITY};
pub use renderer::SoundRenderer;

use crate::ring::Reader;

/// Render state of one callback instance.
#[derive(Debug, Default)]
pub enum RenderState {
    /// No region bound yet. Ticks render nothing.
    #[default]
    Uninitialized,
    /// Bound to a region through its reader.
    Ready(Reader),
}

impl RenderState {
    pub fn is_ready(&self) -> bool {
        matches!(self, RenderState::Ready(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            RenderState::Uninitialized => "uninitialized",
            RenderState::Ready(_) => "ready",
        }
    }

    pub fn reader(&self) -> Option<&Reader> {
        match self {
            RenderState::Ready(reader) => Some(reader),
            RenderState::Uninitialized => None,
        }
    }
}

/// The entry points a host audio runtime calls on a processor.
///
/// Both methods run on the realtime thread: implementations must not block,
/// lock, allocate or panic.
pub trait RenderProcessor: Send + 'static {
    /// Handle one control message.
    fn on_message(&mut self, message: Handshake) -> HandshakeOutcome;

    /// Render one quantum into `output` (mono, pre-zeroed by the host).
    ///
    /// Returns `true` to keep the processor alive.
    fn process(&mut self, output: &mut [f32]) -> bool;

    fn state_name(&self) -> &'static str;
}

use std::sync::Arc;

use super::{
    control::PlaybackControl,
    diagnostics::RenderDiagnostics,
    handshake::{self, Handshake, HandshakeOutcome},
    RenderProcessor, RenderState,
};
use crate::ring::Reader;

/// The sound renderer: plays whatever the producer has queued in the bound
/// region, silence otherwise.
#[derive(Debug, Default)]
pub struct SoundRenderer {
    state: RenderState,
    diagnostics: Arc<RenderDiagnostics>,
    control: Arc<PlaybackControl>,
}

impl SoundRenderer {
    pub fn new(diagnostics: Arc<RenderDiagnostics>) -> Self {
        Self {
            state: RenderState::Uninitialized,
            diagnostics,
            control: Arc::default(),
        }
    }

    /// Share pause/resume state with whoever drives playback.
    pub fn with_control(mut self, control: Arc<PlaybackControl>) -> Self {
        self.control = control;
        self
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn reader(&self) -> Option<&Reader> {
        self.state.reader()
    }

    pub fn diagnostics(&self) -> &Arc<RenderDiagnostics> {
        &self.diagnostics
    }
}

impl RenderProcessor for SoundRenderer {
    fn on_message(&mut self, message: Handshake) -> HandshakeOutcome {
        let outcome = handshake::receive(&mut self.state, message);
        let counter = match &outcome {
            HandshakeOutcome::Bound => &self.diagnostics.handshakes_bound,
            HandshakeOutcome::Ignored(_) => &self.diagnostics.handshakes_ignored,
            HandshakeOutcome::Rejected(..) => &self.diagnostics.handshakes_rejected,
        };
        counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        outcome
    }

    fn process(&mut self, output: &mut [f32]) -> bool {
        self.diagnostics.record_tick();

        if self.control.is_paused() {
            self.diagnostics.record_paused();
            return true;
        }

        if let RenderState::Ready(reader) = &mut self.state {
            if let Some(ticket) = self.control.pending_flush() {
                match reader.discard() {
                    Ok(discarded) => self.diagnostics.record_discard(discarded),
                    Err(_) => self.diagnostics.record_fault(),
                }
                self.control.complete_flush(ticket);
            }
            match reader.pop(output) {
                Ok(rendered) => self.diagnostics.record_pop(rendered, output.len()),
                // Corrupt indices: the output stays as the host zeroed it.
                Err(_) => self.diagnostics.record_fault(),
            }
        }

        true
    }

    fn state_name(&self) -> &'static str {
        self.state.name()
    }
}

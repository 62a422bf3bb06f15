//! Pause/resume coordination between the control thread, the producer and
//! the render callback.
//!
//! Flushing stale samples has to happen on the consumer side, since only the
//! reader may move the read index. Anyone can ask for a flush by taking a
//! ticket; the renderer serves every outstanding ticket at once by jumping
//! the read index to the write index, then publishes the ticket it served.
//! The renderer never pops while a ticket is outstanding.
//!
//! ```text
//! pause()   paused = true          renderer: silent, no pop
//!                                  producer: stops writing
//! resume()  ticket, resumes += 1,  renderer: flush, then pop as usual
//!           paused = false         producer: takes its own ticket, waits
//!                                            for it, re-primes, carries on
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PlaybackControl {
    paused: AtomicBool,
    resumes: AtomicU64,
    flush_requests: AtomicU64,
    flushes_done: AtomicU64,
}

impl PlaybackControl {
    /// Silence the output and hold the producer. Returns `false` if already
    /// paused.
    pub fn pause(&self) -> bool {
        !self.paused.swap(true, Ordering::SeqCst)
    }

    /// Undo [`pause`](Self::pause). Buffered samples are discarded before
    /// anything is played again. Returns `false` if not paused.
    pub fn resume(&self) -> bool {
        if !self.paused.load(Ordering::SeqCst) {
            return false;
        }
        self.request_flush();
        self.resumes.fetch_add(1, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        true
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// How many times playback has been resumed.
    pub fn resumes(&self) -> u64 {
        self.resumes.load(Ordering::SeqCst)
    }

    /// Ask the renderer to discard everything written so far. Returns the
    /// ticket to pass to [`is_flushed`](Self::is_flushed).
    pub fn request_flush(&self) -> u64 {
        self.flush_requests.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_flushed(&self, ticket: u64) -> bool {
        self.flushes_done.load(Ordering::SeqCst) >= ticket
    }

    /// Highest outstanding ticket, if the renderer owes a flush.
    pub(crate) fn pending_flush(&self) -> Option<u64> {
        let requested = self.flush_requests.load(Ordering::SeqCst);
        (self.flushes_done.load(Ordering::SeqCst) < requested).then_some(requested)
    }

    pub(crate) fn complete_flush(&self, ticket: u64) {
        self.flushes_done.fetch_max(ticket, Ordering::SeqCst);
    }

    /// Back to playing with no outstanding flush. Only for use while no
    /// renderer or producer is attached.
    pub fn reset(&self) {
        self.paused.store(false, Ordering::SeqCst);
        let requested = self.flush_requests.load(Ordering::SeqCst);
        self.flushes_done.store(requested, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_only_after_pause() {
        let control = PlaybackControl::default();
        assert!(!control.resume());
        assert!(control.pause());
        assert!(!control.pause());
        assert!(control.resume());
        assert!(!control.is_paused());
        assert_eq!(control.resumes(), 1);
    }

    #[test]
    fn one_flush_serves_every_earlier_ticket() {
        let control = PlaybackControl::default();
        assert_eq!(control.pending_flush(), None);

        let a = control.request_flush();
        let b = control.request_flush();
        assert_eq!(control.pending_flush(), Some(b));
        control.complete_flush(b);
        assert!(control.is_flushed(a) && control.is_flushed(b));
        assert_eq!(control.pending_flush(), None);

        let c = control.request_flush();
        assert!(!control.is_flushed(c));
        control.reset();
        assert!(control.is_flushed(c));
    }
}

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated from the realtime thread.
///
/// Relaxed atomics only: the values are observability data and never used to
/// synchronise anything. Non-realtime code reads them through
/// [`RenderDiagnostics::snapshot`].
#[derive(Debug, Default)]
pub struct RenderDiagnostics {
    pub ticks: AtomicU64,
    pub samples_rendered: AtomicU64,
    pub underrun_samples: AtomicU64,
    pub faults: AtomicU64,
    pub paused_ticks: AtomicU64,
    pub samples_discarded: AtomicU64,
    pub handshakes_bound: AtomicU64,
    pub handshakes_ignored: AtomicU64,
    pub handshakes_rejected: AtomicU64,
}

impl RenderDiagnostics {
    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.samples_rendered.store(0, Ordering::Relaxed);
        self.underrun_samples.store(0, Ordering::Relaxed);
        self.faults.store(0, Ordering::Relaxed);
        self.paused_ticks.store(0, Ordering::Relaxed);
        self.samples_discarded.store(0, Ordering::Relaxed);
        self.handshakes_bound.store(0, Ordering::Relaxed);
        self.handshakes_ignored.store(0, Ordering::Relaxed);
        self.handshakes_rejected.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pop(&self, rendered: usize, requested: usize) {
        self.samples_rendered
            .fetch_add(rendered as u64, Ordering::Relaxed);
        if rendered < requested {
            self.underrun_samples
                .fetch_add((requested - rendered) as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_paused(&self) {
        self.paused_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discard(&self, discarded: usize) {
        self.samples_discarded
            .fetch_add(discarded as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            samples_rendered: self.samples_rendered.load(Ordering::Relaxed),
            underrun_samples: self.underrun_samples.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            paused_ticks: self.paused_ticks.load(Ordering::Relaxed),
            samples_discarded: self.samples_discarded.load(Ordering::Relaxed),
            handshakes_bound: self.handshakes_bound.load(Ordering::Relaxed),
            handshakes_ignored: self.handshakes_ignored.load(Ordering::Relaxed),
            handshakes_rejected: self.handshakes_rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSnapshot {
    pub ticks: u64,
    pub samples_rendered: u64,
    pub underrun_samples: u64,
    pub faults: u64,
    pub paused_ticks: u64,
    pub samples_discarded: u64,
    pub handshakes_bound: u64,
    pub handshakes_ignored: u64,
    pub handshakes_rejected: u64,
}

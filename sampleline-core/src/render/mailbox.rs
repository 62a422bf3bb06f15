//! Handshake transport between a control thread and the realtime thread.
//!
//! Two `ringbuf` SPSC queues: the inbox carries handshakes to the realtime
//! side, the return queue carries back every message the processor did not
//! consume. The realtime side only ever calls `try_pop`/`try_push`.
//!
//! `post` refuses once the messages in either queue reach the capacity, so
//! the return queue always has room and a declined handshake is never
//! dropped (and its region never freed) on the realtime thread.

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};

use super::{Handshake, RenderProcessor};

/// Messages a mailbox holds before `post` starts refusing.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 4;

/// Control-thread end.
pub struct HandshakePort {
    inbox: HeapProd<Handshake>,
    returned: HeapCons<Handshake>,
    capacity: usize,
}

/// Realtime-thread end.
pub struct MailboxReceiver {
    inbox: HeapCons<Handshake>,
    returned: HeapProd<Handshake>,
}

/// Create a connected port/receiver pair.
pub fn mailbox(capacity: usize) -> (HandshakePort, MailboxReceiver) {
    let capacity = capacity.max(1);
    let (inbox_tx, inbox_rx) = HeapRb::<Handshake>::new(capacity).split();
    let (returned_tx, returned_rx) = HeapRb::<Handshake>::new(capacity).split();
    (
        HandshakePort {
            inbox: inbox_tx,
            returned: returned_rx,
            capacity,
        },
        MailboxReceiver {
            inbox: inbox_rx,
            returned: returned_tx,
        },
    )
}

impl HandshakePort {
    /// Queue a handshake for the realtime side. Hands it back while
    /// `capacity` messages are queued or waiting in
    /// [`collect_returned`](Self::collect_returned).
    pub fn post(&mut self, message: Handshake) -> Result<(), Handshake> {
        // Inbox first: a message moving to the return queue between the two
        // loads is counted twice, never missed.
        let queued = self.inbox.occupied_len();
        if queued + self.returned.occupied_len() >= self.capacity {
            return Err(message);
        }
        self.inbox.try_push(message)
    }

    /// Messages queued or returned and not yet collected.
    pub fn in_flight(&self) -> usize {
        self.inbox.occupied_len() + self.returned.occupied_len()
    }

    /// Drain messages the processor declined.
    pub fn collect_returned(&mut self) -> Vec<Handshake> {
        self.returned.pop_iter().collect()
    }
}

impl MailboxReceiver {
    /// Feed every pending message to `processor`. Returns how many were
    /// delivered.
    pub fn deliver(&mut self, processor: &mut dyn RenderProcessor) -> usize {
        let mut delivered = 0;
        while let Some(message) = self.inbox.try_pop() {
            delivered += 1;
            if let Some(unused) = processor.on_message(message).into_returned() {
                // Cannot fail: `post` keeps everything in flight within the
                // return queue's capacity.
                let _ = self.returned.try_push(unused);
            }
        }
        delivered
    }

    pub fn has_pending(&self) -> bool {
        !self.inbox.is_empty()
    }
}

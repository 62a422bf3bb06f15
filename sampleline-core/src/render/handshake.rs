//! One-time binding of a render callback to a shared region.
//!
//! The first handshake wins. Later handshakes are ignored and handed back to
//! the caller, so the region reference they carry is released by whoever
//! collects them rather than on the realtime thread.

use std::sync::Arc;

use crate::{error::SamplelineError, region::SharedRegion, ring::Reader};

use super::RenderState;

/// Control message carrying the region a callback should read from.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub region: Arc<SharedRegion>,
}

impl Handshake {
    pub fn new(region: Arc<SharedRegion>) -> Self {
        Self { region }
    }
}

#[derive(Debug)]
pub enum HandshakeOutcome {
    /// A reader was bound; the state is now `Ready`.
    Bound,
    /// The state was already `Ready`; the message is returned unused.
    Ignored(Handshake),
    /// The reader could not be built; the state is unchanged.
    Rejected(Handshake, SamplelineError),
}

impl HandshakeOutcome {
    pub fn is_bound(&self) -> bool {
        matches!(self, HandshakeOutcome::Bound)
    }

    /// The message, if it was not consumed.
    pub fn into_returned(self) -> Option<Handshake> {
        match self {
            HandshakeOutcome::Bound => None,
            HandshakeOutcome::Ignored(message) | HandshakeOutcome::Rejected(message, _) => {
                Some(message)
            }
        }
    }
}

/// Apply `message` to `state`.
///
/// Wait-free: binding a reader is one compare-exchange on the region's
/// consumer claim plus a reference-count increment.
pub fn receive(state: &mut RenderState, message: Handshake) -> HandshakeOutcome {
    if state.is_ready() {
        return HandshakeOutcome::Ignored(message);
    }

    match Reader::new(Arc::clone(&message.region)) {
        Ok(reader) => {
            *state = RenderState::Ready(reader);
            HandshakeOutcome::Bound
        }
        Err(e) => HandshakeOutcome::Rejected(message, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_handshake_binds() {
        let region = SharedRegion::with_usable_capacity(16).unwrap();
        let mut state = RenderState::default();
        assert_eq!(state.name(), "uninitialized");

        let outcome = receive(&mut state, Handshake::new(Arc::clone(&region)));
        assert!(outcome.is_bound());
        assert!(state.is_ready());
        assert!(region.has_consumer());
    }

    #[test]
    fn second_handshake_is_ignored_and_returned() {
        let first = SharedRegion::with_usable_capacity(16).unwrap();
        let second = SharedRegion::with_usable_capacity(16).unwrap();
        let mut state = RenderState::default();
        receive(&mut state, Handshake::new(Arc::clone(&first)));

        let outcome = receive(&mut state, Handshake::new(Arc::clone(&second)));
        let returned = outcome.into_returned().expect("message handed back");
        assert!(Arc::ptr_eq(&returned.region, &second));
        assert!(!second.has_consumer());
        assert!(Arc::ptr_eq(state.reader().unwrap().region(), &first));
    }

    #[test]
    fn region_with_existing_reader_is_rejected() {
        let region = SharedRegion::with_usable_capacity(16).unwrap();
        let _other = Reader::new(Arc::clone(&region)).unwrap();
        let mut state = RenderState::default();

        let outcome = receive(&mut state, Handshake::new(region));
        assert!(matches!(
            outcome,
            HandshakeOutcome::Rejected(_, SamplelineError::ConsumerAlreadyBound)
        ));
        assert!(!state.is_ready());
    }
}

//! Lock-free SPSC sample ring over a [`SharedRegion`].
//!
//! Exactly one [`Writer`] and one [`Reader`] may be bound to a region at a
//! time. Each index has a single writer, so no lock is needed: the producer
//! publishes samples with a release store of the write index and the consumer
//! frees slots with a release store of the read index.

pub mod reader;
pub mod writer;

use std::sync::Arc;

pub use reader::Reader;
pub use writer::Writer;

use crate::{error::Result, region::SharedRegion};

/// Allocate a region able to buffer `usable` samples and bind both halves.
pub fn create_ring(usable: usize) -> Result<(Writer, Reader)> {
    let region = SharedRegion::with_usable_capacity(usable)?;
    let writer = Writer::new(Arc::clone(&region))?;
    let reader = Reader::new(region)?;
    Ok((writer, reader))
}

//! Consumer half of the shared sample ring.

use std::sync::Arc;

use crate::{
    error::Result,
    region::{available_to_read, SharedRegion},
};

/// Consumer handle bound to one [`SharedRegion`].
///
/// Owns every mutation of the read index and never touches the write index.
/// Holding a `Reader` claims the region's consumer role; dropping it releases
/// the claim.
#[derive(Debug)]
pub struct Reader {
    region: Arc<SharedRegion>,
}

impl Reader {
    /// Bind a reader to `region`.
    ///
    /// # Errors
    /// `SamplelineError::ConsumerAlreadyBound` when another reader is alive.
    pub fn new(region: Arc<SharedRegion>) -> Result<Self> {
        region.try_claim_consumer()?;
        Ok(Self { region })
    }

    /// Copy up to `out.len()` buffered samples into the front of `out`.
    ///
    /// Loads both indices once, copies `min(available, out.len())` samples in
    /// at most two contiguous runs and publishes the new read index with a
    /// single release store. Positions of `out` past the returned count are
    /// left exactly as the caller provided them, so a pre-zeroed buffer plays
    /// silence on underrun.
    ///
    /// Never blocks, retries or allocates.
    ///
    /// # Errors
    /// `SamplelineError::CorruptIndex` when either index lies outside the
    /// storage. Neither `out` nor the read index is touched in that case.
    pub fn pop(&mut self, out: &mut [f32]) -> Result<usize> {
        let (read, write) = self.region.checked_indices()?;
        if read == write || out.is_empty() {
            return Ok(0);
        }

        let capacity = self.region.capacity();
        let to_read = available_to_read(read, write, capacity).min(out.len());
        let first_part = (capacity - read).min(to_read);
        let second_part = to_read - first_part;

        self.region.copy_out(read, &mut out[..first_part]);
        if second_part > 0 {
            self.region.copy_out(0, &mut out[first_part..to_read]);
        }

        self.region.store_read((read + to_read) % capacity);
        Ok(to_read)
    }

    /// Drop everything buffered by moving the read index to the write index.
    /// Returns how many samples were discarded.
    ///
    /// # Errors
    /// `SamplelineError::CorruptIndex`, with the read index untouched.
    pub fn discard(&mut self) -> Result<usize> {
        let (read, write) = self.region.checked_indices()?;
        if read == write {
            return Ok(0);
        }
        self.region.store_read(write);
        Ok(available_to_read(read, write, self.region.capacity()))
    }

    /// Samples ready to pop. Reports 0 for a corrupt index pair.
    pub fn available(&self) -> usize {
        self.region.occupancy()
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    /// Storage slots of the bound region, sentinel included.
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    pub fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }

    /// Whether a writer is still attached to the region.
    ///
    /// Once this turns false the remaining samples can still be drained; after
    /// that every pop returns 0.
    pub fn producer_attached(&self) -> bool {
        self.region.has_producer()
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.region.release_consumer();
    }
}

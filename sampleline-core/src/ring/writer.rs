//! Producer half of the shared sample ring.

use std::sync::Arc;

use crate::{
    error::Result,
    region::{available_to_write, SharedRegion},
};

/// Producer handle bound to one [`SharedRegion`].
///
/// Owns every mutation of the write index. Keeps the sentinel slot free, so
/// it never overwrites a sample the reader has not consumed yet.
#[derive(Debug)]
pub struct Writer {
    region: Arc<SharedRegion>,
}

impl Writer {
    /// Bind a writer to `region`.
    ///
    /// # Errors
    /// `SamplelineError::ProducerAlreadyBound` when another writer is alive.
    pub fn new(region: Arc<SharedRegion>) -> Result<Self> {
        region.try_claim_producer()?;
        Ok(Self { region })
    }

    /// Append a prefix of `samples`. Returns how many were written; a short
    /// count means the ring is full and the remainder was not queued.
    pub fn push(&mut self, samples: &[f32]) -> Result<usize> {
        self.write_with(samples.len(), |region, start, offset, len| {
            region.copy_in(start, &samples[offset..offset + len]);
        })
    }

    /// Append up to `count` zero samples.
    pub fn push_silence(&mut self, count: usize) -> Result<usize> {
        self.write_with(count, |region, start, _offset, len| {
            region.fill_silence(start, len);
        })
    }

    fn write_with<F>(&mut self, requested: usize, mut copy: F) -> Result<usize>
    where
        F: FnMut(&SharedRegion, usize, usize, usize),
    {
        let region: &SharedRegion = &self.region;
        let (read, write) = region.checked_indices()?;
        let capacity = region.capacity();
        let to_write = available_to_write(read, write, capacity).min(requested);
        if to_write == 0 {
            return Ok(0);
        }

        let first_part = (capacity - write).min(to_write);
        let second_part = to_write - first_part;

        copy(region, write, 0, first_part);
        if second_part > 0 {
            copy(region, 0, first_part, second_part);
        }

        region.store_write((write + to_write) % capacity);
        Ok(to_write)
    }

    /// Free slots, sentinel excluded. Reports 0 for a corrupt index pair.
    pub fn available_to_write(&self) -> usize {
        self.region
            .checked_indices()
            .map(|(read, write)| available_to_write(read, write, self.region.capacity()))
            .unwrap_or(0)
    }

    pub fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }

    /// Whether a reader is currently bound to the region.
    pub fn consumer_attached(&self) -> bool {
        self.region.has_consumer()
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        self.region.release_producer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SamplelineError;

    #[test]
    fn never_fills_the_sentinel_slot() {
        let region = SharedRegion::with_usable_capacity(4).unwrap();
        let mut writer = Writer::new(Arc::clone(&region)).unwrap();

        assert_eq!(writer.push(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap(), 4);
        assert_eq!(writer.available_to_write(), 0);
        assert_eq!(writer.push(&[0.7]).unwrap(), 0);
        assert_eq!(region.occupancy(), 4);
        assert!(!region.is_empty());
    }

    #[test]
    fn silence_counts_against_free_space() {
        let region = SharedRegion::with_usable_capacity(10).unwrap();
        let mut writer = Writer::new(Arc::clone(&region)).unwrap();
        assert_eq!(writer.push_silence(6).unwrap(), 6);
        assert_eq!(writer.push_silence(6).unwrap(), 4);
        assert_eq!(region.occupancy(), 10);
    }

    #[test]
    fn second_writer_is_refused() {
        let region = SharedRegion::with_usable_capacity(4).unwrap();
        let _writer = Writer::new(Arc::clone(&region)).unwrap();
        assert!(matches!(
            Writer::new(region),
            Err(SamplelineError::ProducerAlreadyBound)
        ));
    }

    #[test]
    fn corrupt_read_index_is_reported() {
        let mut image = vec![0u8; 8 + 4 * 4];
        image[4..8].copy_from_slice(&7u32.to_le_bytes());
        let region = SharedRegion::from_bytes(&image).unwrap();
        let mut writer = Writer::new(region).unwrap();
        assert!(matches!(
            writer.push(&[1.0]),
            Err(SamplelineError::CorruptIndex { read: 7, .. })
        ));
        assert_eq!(writer.available_to_write(), 0);
    }
}

//! Shared sample region: two index counters followed by a fixed array of
//! `f32` sample slots.
//!
//! ## Byte layout (little-endian)
//!
//! ```text
//! offset 0   u32  write index (element units, producer-owned)
//! offset 4   u32  read index  (element units, consumer-owned)
//! offset 8   f32  sample[0]
//! ...        f32  sample[capacity - 1]
//! ```
//!
//! In memory the region is a boxed slice of `AtomicU32` words, so the image is
//! bit-for-bit the layout above on a little-endian host and every access is an
//! atomic load or store. Samples are stored as `f32::to_bits` with relaxed
//! ordering; the index stores (release) and loads (acquire) are what publish
//! them to the other side.
//!
//! `capacity` counts one always-empty sentinel slot, so at most
//! `capacity - 1` samples are ever readable. `read == write` means empty.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::{Result, SamplelineError};

/// Width of one index counter in bytes.
pub const INDEX_BYTES: usize = 4;

/// Width of one sample slot in bytes.
pub const SAMPLE_BYTES: usize = 4;

/// Total bytes reserved for the header (write index + read index).
pub const HEADER_BYTES: usize = 2 * INDEX_BYTES;

pub const WRITE_INDEX_WORD: usize = 0;
pub const READ_INDEX_WORD: usize = 1;
const HEADER_WORDS: usize = 2;

/// Smallest usable storage: the sentinel slot plus one sample.
pub const MIN_CAPACITY: usize = 2;

/// Largest storage accepted, in slots.
///
/// `2^24` slots is ~12 minutes of mono audio at 22.05 kHz, far beyond any
/// sensible latency budget, and keeps index arithmetic well inside `u32`.
pub const MAX_CAPACITY: usize = 1 << 24;

/// Number of storage slots (sentinel included) a region of `byte_len` bytes holds.
#[inline]
pub const fn capacity_for_byte_len(byte_len: usize) -> usize {
    if byte_len < HEADER_BYTES {
        0
    } else {
        (byte_len - HEADER_BYTES) / SAMPLE_BYTES
    }
}

/// Bytes needed to buffer `usable` samples (one extra slot for the sentinel).
#[inline]
pub const fn byte_len_for_usable(usable: usize) -> usize {
    HEADER_BYTES + (usable + 1) * SAMPLE_BYTES
}

#[inline]
pub fn available_to_read(read: usize, write: usize, capacity: usize) -> usize {
    (write + capacity - read) % capacity
}

#[inline]
pub fn available_to_write(read: usize, write: usize, capacity: usize) -> usize {
    capacity - 1 - available_to_read(read, write, capacity)
}

/// The memory region shared between exactly one producer and one consumer.
///
/// Always handled through `Arc<SharedRegion>`: both sides hold a reference for
/// as long as they are alive, so neither can observe a freed region.
#[derive(Debug)]
pub struct SharedRegion {
    words: Box<[AtomicU32]>,
    byte_len: usize,
    capacity: usize,
    consumer_claimed: AtomicBool,
    producer_claimed: AtomicBool,
}

impl SharedRegion {
    /// Allocate a zeroed region of `byte_len` bytes.
    ///
    /// # Errors
    /// `InvalidRegionSize` when the header does not fit or fewer than
    /// [`MIN_CAPACITY`] sample slots remain, `RegionTooLarge` above
    /// [`MAX_CAPACITY`].
    pub fn new(byte_len: usize) -> Result<Arc<Self>> {
        let capacity = validate_byte_len(byte_len)?;
        let words = (0..HEADER_WORDS + capacity)
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Arc::new(Self::from_words(words, byte_len, capacity)))
    }

    /// Allocate a region able to buffer `usable` samples.
    pub fn with_usable_capacity(usable: usize) -> Result<Arc<Self>> {
        Self::new(byte_len_for_usable(usable))
    }

    /// Import a region image laid out as described in the module docs.
    ///
    /// Index values are taken verbatim; out-of-range indices are reported by
    /// the reader or writer when they next touch the region.
    pub fn from_bytes(bytes: &[u8]) -> Result<Arc<Self>> {
        let capacity = validate_byte_len(bytes.len())?;
        let words = bytes
            .chunks_exact(4)
            .take(HEADER_WORDS + capacity)
            .map(|chunk| AtomicU32::new(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Arc::new(Self::from_words(words, bytes.len(), capacity)))
    }

    fn from_words(words: Box<[AtomicU32]>, byte_len: usize, capacity: usize) -> Self {
        Self {
            words,
            byte_len,
            capacity,
            consumer_claimed: AtomicBool::new(false),
            producer_claimed: AtomicBool::new(false),
        }
    }

    /// Export the current image. Trailing bytes that do not form a whole
    /// sample slot are emitted as zero.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len);
        for word in self.words.iter() {
            out.extend_from_slice(&word.load(Ordering::Acquire).to_le_bytes());
        }
        out.resize(self.byte_len, 0);
        out
    }

    /// Storage slots, sentinel included.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most samples the region can hold at once.
    pub fn usable_capacity(&self) -> usize {
        self.capacity - 1
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Samples currently buffered. Reports 0 for a corrupt index pair.
    pub fn occupancy(&self) -> usize {
        self.checked_indices()
            .map(|(read, write)| available_to_read(read, write, self.capacity))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        let (read, write) = self.load_indices();
        read == write
    }

    /// Whether a `Reader` currently holds the consumer role.
    pub fn has_consumer(&self) -> bool {
        self.consumer_claimed.load(Ordering::Acquire)
    }

    /// Whether a `Writer` currently holds the producer role.
    pub fn has_producer(&self) -> bool {
        self.producer_claimed.load(Ordering::Acquire)
    }

    /// Raw `(read, write)` snapshot, one acquire load each. Not validated.
    #[inline]
    pub fn load_indices(&self) -> (u32, u32) {
        let read = self.words[READ_INDEX_WORD].load(Ordering::Acquire);
        let write = self.words[WRITE_INDEX_WORD].load(Ordering::Acquire);
        (read, write)
    }

    // ── Crate-internal access used by the reader and writer ──────────────

    /// Snapshot validated against `capacity`.
    #[inline]
    pub(crate) fn checked_indices(&self) -> Result<(usize, usize)> {
        let (read, write) = self.load_indices();
        let (r, w) = (read as usize, write as usize);
        if r >= self.capacity || w >= self.capacity {
            return Err(SamplelineError::CorruptIndex {
                read,
                write,
                capacity: self.capacity as u32,
            });
        }
        Ok((r, w))
    }

    #[inline]
    pub(crate) fn store_read(&self, read: usize) {
        self.words[READ_INDEX_WORD].store(read as u32, Ordering::Release);
    }

    #[inline]
    pub(crate) fn store_write(&self, write: usize) {
        self.words[WRITE_INDEX_WORD].store(write as u32, Ordering::Release);
    }

    /// Copy `out.len()` samples starting at slot `start` (no wrap).
    #[inline]
    pub(crate) fn copy_out(&self, start: usize, out: &mut [f32]) {
        let base = HEADER_WORDS + start;
        let slots = &self.words[base..base + out.len()];
        for (dst, slot) in out.iter_mut().zip(slots) {
            *dst = f32::from_bits(slot.load(Ordering::Relaxed));
        }
    }

    /// Copy `src` into slots starting at `start` (no wrap).
    #[inline]
    pub(crate) fn copy_in(&self, start: usize, src: &[f32]) {
        let base = HEADER_WORDS + start;
        let slots = &self.words[base..base + src.len()];
        for (slot, sample) in slots.iter().zip(src) {
            slot.store(sample.to_bits(), Ordering::Relaxed);
        }
    }

    /// Zero `len` slots starting at `start` (no wrap).
    #[inline]
    pub(crate) fn fill_silence(&self, start: usize, len: usize) {
        let base = HEADER_WORDS + start;
        for slot in &self.words[base..base + len] {
            slot.store(0f32.to_bits(), Ordering::Relaxed);
        }
    }

    pub(crate) fn try_claim_consumer(&self) -> Result<()> {
        self.consumer_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| SamplelineError::ConsumerAlreadyBound)
    }

    pub(crate) fn release_consumer(&self) {
        self.consumer_claimed.store(false, Ordering::Release);
    }

    pub(crate) fn try_claim_producer(&self) -> Result<()> {
        self.producer_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| SamplelineError::ProducerAlreadyBound)
    }

    pub(crate) fn release_producer(&self) {
        self.producer_claimed.store(false, Ordering::Release);
    }
}

fn validate_byte_len(byte_len: usize) -> Result<usize> {
    let capacity = capacity_for_byte_len(byte_len);
    if byte_len < HEADER_BYTES || capacity < MIN_CAPACITY {
        return Err(SamplelineError::InvalidRegionSize {
            byte_len,
            min_byte_len: HEADER_BYTES + MIN_CAPACITY * SAMPLE_BYTES,
        });
    }
    if capacity > MAX_CAPACITY {
        return Err(SamplelineError::RegionTooLarge {
            byte_len,
            max_byte_len: HEADER_BYTES + MAX_CAPACITY * SAMPLE_BYTES,
        });
    }
    Ok(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_formula_counts_sentinel() {
        assert_eq!(capacity_for_byte_len(1032), 256);
        assert_eq!(capacity_for_byte_len(8), 0);
        assert_eq!(capacity_for_byte_len(3), 0);
        // Partial trailing slot is ignored.
        assert_eq!(capacity_for_byte_len(1035), 256);
        assert_eq!(byte_len_for_usable(255), 1032);
    }

    #[test]
    fn occupancy_math_wraps() {
        assert_eq!(available_to_read(0, 10, 256), 10);
        assert_eq!(available_to_read(250, 4, 256), 10);
        assert_eq!(available_to_read(7, 7, 256), 0);
        assert_eq!(available_to_write(7, 7, 256), 255);
        assert_eq!(available_to_write(8, 7, 256), 0);
    }

    #[test]
    fn rejects_regions_without_room_for_header_and_samples() {
        for byte_len in [0, 4, 7, 8, 12, 15] {
            let err = SharedRegion::new(byte_len).unwrap_err();
            assert!(
                matches!(err, SamplelineError::InvalidRegionSize { .. }),
                "byte_len={byte_len} err={err}"
            );
        }
        assert!(SharedRegion::new(16).is_ok());
    }

    #[test]
    fn rejects_oversized_region() {
        let err = SharedRegion::new(byte_len_for_usable(MAX_CAPACITY)).unwrap_err();
        assert!(matches!(err, SamplelineError::RegionTooLarge { .. }));
    }

    #[test]
    fn image_round_trip_keeps_layout_offsets() {
        let mut image = vec![0u8; 1032];
        image[0..4].copy_from_slice(&10u32.to_le_bytes());
        image[4..8].copy_from_slice(&3u32.to_le_bytes());
        image[8..12].copy_from_slice(&0.5f32.to_le_bytes());

        let region = SharedRegion::from_bytes(&image).unwrap();
        assert_eq!(region.capacity(), 256);
        assert_eq!(region.usable_capacity(), 255);
        assert_eq!(region.load_indices(), (3, 10));
        assert_eq!(region.occupancy(), 7);

        let mut first = [0f32; 1];
        region.copy_out(0, &mut first);
        assert_eq!(first[0], 0.5);
        assert_eq!(region.to_bytes(), image);
    }

    #[test]
    fn corrupt_indices_report_zero_occupancy() {
        let mut image = vec![0u8; 24];
        image[0..4].copy_from_slice(&99u32.to_le_bytes());
        let region = SharedRegion::from_bytes(&image).unwrap();
        assert_eq!(region.occupancy(), 0);
        assert!(matches!(
            region.checked_indices(),
            Err(SamplelineError::CorruptIndex { write: 99, .. })
        ));
    }

    #[test]
    fn roles_are_exclusive_until_released() {
        let region = SharedRegion::with_usable_capacity(8).unwrap();
        region.try_claim_consumer().unwrap();
        assert!(matches!(
            region.try_claim_consumer(),
            Err(SamplelineError::ConsumerAlreadyBound)
        ));
        region.release_consumer();
        assert!(region.try_claim_consumer().is_ok());
        assert!(!region.has_producer());
    }
}

//! Pre-allocated slot pools for raw frames and audio chunks
//!
//! Both capture paths write into fixed-capacity circular pools so the hot
//! path never allocates. Slots are borrowed, never owned: the producer
//! holds a slot guard only for the duration of copy-plus-forward, and the
//! sink reads the slot synchronously inside that same borrow. A slot that
//! is still checked out from an earlier cycle is skipped, so wraparound
//! can never overwrite an in-flight read.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

/// Reusable pixel buffer for one captured video frame
#[derive(Debug)]
pub struct FrameSlot {
    /// Raw NV21/YUV420 pixel bytes, pre-sized to the negotiated geometry
    pub data: Vec<u8>,
    /// Capture timestamp in microseconds since session start
    pub timestamp_micros: u64,
}

impl FrameSlot {
    /// Create a slot pre-sized for `frame_bytes` of pixel data
    pub fn new(frame_bytes: usize) -> Self {
        Self {
            data: vec![0u8; frame_bytes],
            timestamp_micros: 0,
        }
    }
}

/// Reusable buffer of signed 16-bit PCM samples from one microphone read
#[derive(Debug)]
pub struct SampleChunk {
    /// Sample storage, pre-sized to the device buffer size
    pub data: Vec<i16>,
    /// Number of valid samples from the last read
    pub len: usize,
}

impl SampleChunk {
    /// Create a chunk pre-sized for `buffer_samples` samples
    pub fn new(buffer_samples: usize) -> Self {
        Self {
            data: vec![0i16; buffer_samples],
            len: 0,
        }
    }

    /// View of the samples actually filled by the last read
    pub fn filled(&self) -> &[i16] {
        &self.data[..self.len.min(self.data.len())]
    }
}

/// Borrowed slot handle; releases the slot when dropped
pub struct SlotRef<'a, T> {
    guard: MutexGuard<'a, T>,
    index: usize,
}

impl<T> SlotRef<'_, T> {
    /// Ring index of the borrowed slot
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> Deref for SlotRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for SlotRef<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

/// Fixed-capacity round-robin pool of reusable slots
///
/// `acquire` hands out slots in ring order. Each slot sits behind its own
/// lock; if the next slot is still checked out the acquire is refused
/// rather than blocking, and the caller drops the unit of work.
pub struct SlotPool<T> {
    slots: Vec<Mutex<T>>,
    cursor: AtomicUsize,
    skipped: AtomicU64,
}

impl<T> SlotPool<T> {
    /// Build a pool from pre-allocated slots
    pub fn from_slots(slots: Vec<T>) -> Self {
        assert!(!slots.is_empty(), "pool needs at least one slot");
        Self {
            slots: slots.into_iter().map(Mutex::new).collect(),
            cursor: AtomicUsize::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    /// Number of slots in the ring
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Borrow the next slot in ring order
    ///
    /// Returns `None` when the slot is still checked out from an earlier
    /// cycle; the skip is counted and the cursor still advances.
    pub fn acquire(&self) -> Option<SlotRef<'_, T>> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        match self.slots[index].try_lock() {
            Ok(guard) => Some(SlotRef { guard, index }),
            Err(TryLockError::WouldBlock) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(TryLockError::Poisoned(_)) => panic!("slot lock poisoned"),
        }
    }

    /// Number of acquires refused because a slot was still in flight
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl SlotPool<FrameSlot> {
    /// Pool of `capacity` frame slots, each sized for `frame_bytes`
    pub fn frames(capacity: usize, frame_bytes: usize) -> Self {
        Self::from_slots((0..capacity.max(1)).map(|_| FrameSlot::new(frame_bytes)).collect())
    }
}

impl SlotPool<SampleChunk> {
    /// Pool of `capacity` sample chunks, each sized for `buffer_samples`
    pub fn chunks(capacity: usize, buffer_samples: usize) -> Self {
        Self::from_slots(
            (0..capacity.max(1))
                .map(|_| SampleChunk::new(buffer_samples))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_round_robin_order() {
        let pool = SlotPool::frames(3, 16);
        let indices: Vec<usize> = (0..6)
            .map(|_| pool.acquire().expect("slot free").index())
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_no_allocation_after_build() {
        let pool = SlotPool::frames(2, 640 * 480 * 3 / 2);
        let slot = pool.acquire().expect("slot free");
        assert_eq!(slot.data.len(), 640 * 480 * 3 / 2);
        assert_eq!(slot.data.capacity(), 640 * 480 * 3 / 2);
    }

    #[test]
    fn test_in_flight_slot_is_skipped() {
        let pool = SlotPool::frames(2, 8);
        let held = pool.acquire().expect("slot 0");
        assert_eq!(held.index(), 0);

        // Slot 1 is free, slot 0 comes around again while still held.
        let second = pool.acquire().expect("slot 1");
        assert_eq!(second.index(), 1);
        drop(second);

        assert!(pool.acquire().is_none(), "held slot must be refused");
        assert_eq!(pool.skipped(), 1);
        drop(held);

        // Cursor advanced past the refused slot; next acquire succeeds.
        assert!(pool.acquire().is_some());
    }

    #[test]
    fn test_skip_under_delayed_consumer_across_threads() {
        let pool = Arc::new(SlotPool::chunks(2, 64));
        let pool2 = pool.clone();

        let held = pool.acquire().expect("slot 0");
        let writer = std::thread::spawn(move || {
            let mut acquired = 0u32;
            for _ in 0..10 {
                if let Some(mut chunk) = pool2.acquire() {
                    chunk.len = 1;
                    acquired += 1;
                }
            }
            acquired
        });

        let acquired = writer.join().expect("writer thread");
        // Only the free slot was ever handed out while slot 0 stayed held.
        assert!(acquired < 10);
        assert!(pool.skipped() > 0);
        drop(held);
    }

    #[test]
    fn test_sample_chunk_filled_view() {
        let mut chunk = SampleChunk::new(8);
        chunk.data[..3].copy_from_slice(&[1, 2, 3]);
        chunk.len = 3;
        assert_eq!(chunk.filled(), &[1, 2, 3]);
    }
}

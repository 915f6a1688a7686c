//! Video capture callback
//!
//! The camera collaborator delivers raw frames on a thread it owns. The
//! grabber's only obligation is thread safety of the handler: copy the
//! pixels into a pool slot, stamp them, and forward to the sink when the
//! session is running. The handler never blocks on I/O and never panics
//! outward, since an escaping panic would kill frame delivery for the
//! rest of the stream.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::errors::StreamError;
use crate::pool::{FrameSlot, SlotPool};
use crate::sink::EncodingSink;
use crate::timing::PtsClock;

/// Per-frame byte callback registered with the camera
pub type FrameCallback = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// The platform camera capability
///
/// The core treats the camera purely as a byte-producing event source
/// with a known frame geometry; parameter negotiation and the delivery
/// thread belong to the implementation.
pub trait CameraSource: Send {
    /// Negotiate the capture resolution, returning the effective geometry
    fn negotiate(&mut self, width: u32, height: u32) -> Result<(u32, u32), StreamError>;

    /// Register the per-frame callback and begin delivery
    fn start(&mut self, callback: FrameCallback) -> Result<(), StreamError>;

    /// Unregister the callback and stop delivery
    fn stop(&mut self);
}

struct Shared {
    sink: Arc<EncodingSink>,
    pool: SlotPool<FrameSlot>,
    clock: PtsClock,
    running: Arc<AtomicBool>,
    expected_bytes: usize,
    forwarded: AtomicU64,
    dropped: AtomicU64,
    fault: AtomicBool,
}

/// Builds and observes the per-frame capture handler
pub struct VideoGrabber {
    shared: Arc<Shared>,
}

impl VideoGrabber {
    /// Create a grabber for the negotiated frame geometry
    ///
    /// `expected_bytes` must equal the NV21 size of the negotiated
    /// resolution; any frame of a different length is a configuration
    /// fault, not a per-frame retry.
    pub fn new(
        sink: Arc<EncodingSink>,
        pool: SlotPool<FrameSlot>,
        clock: PtsClock,
        running: Arc<AtomicBool>,
        expected_bytes: usize,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                sink,
                pool,
                clock,
                running,
                expected_bytes,
                forwarded: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                fault: AtomicBool::new(false),
            }),
        }
    }

    /// Build the callback to hand to [`CameraSource::start`]
    pub fn callback(&self) -> FrameCallback {
        let shared = self.shared.clone();
        Box::new(move |data: &[u8]| on_frame(&shared, data))
    }

    /// Frames committed to the sink
    pub fn forwarded(&self) -> u64 {
        self.shared.forwarded.load(Ordering::Relaxed)
    }

    /// Frames discarded (not running, slot in flight, or size fault)
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Whether a frame-size configuration fault has been observed
    pub fn fault(&self) -> bool {
        self.shared.fault.load(Ordering::Relaxed)
    }
}

fn on_frame(shared: &Shared, data: &[u8]) {
    if data.len() != shared.expected_bytes {
        // Wrong length means the negotiated geometry is wrong; log the
        // fault once and drop everything that follows.
        if !shared.fault.swap(true, Ordering::Relaxed) {
            log::error!(
                "frame size {} does not match negotiated size {}",
                data.len(),
                shared.expected_bytes
            );
        }
        shared.dropped.fetch_add(1, Ordering::Relaxed);
        return;
    }

    if !shared.running.load(Ordering::Acquire) {
        shared.dropped.fetch_add(1, Ordering::Relaxed);
        return;
    }

    let Some(mut slot) = shared.pool.acquire() else {
        shared.dropped.fetch_add(1, Ordering::Relaxed);
        return;
    };
    slot.data.copy_from_slice(data);
    slot.timestamp_micros = shared.clock.micros();

    // Teardown may have started during the copy; re-check after the slot
    // is acquired so a late frame never races the sink's close.
    if !shared.running.load(Ordering::Acquire) {
        shared.dropped.fetch_add(1, Ordering::Relaxed);
        return;
    }

    shared.sink.record_video(&slot.data, slot.timestamp_micros);
    shared.forwarded.fetch_add(1, Ordering::Relaxed);
}

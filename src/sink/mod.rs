//! Encoding sink adapter
//!
//! Wraps a single non-reentrant encoder/muxer behind one mutual-exclusion
//! region so the video callback and the audio thread can both feed it, and
//! enforces timestamp monotonicity across the merged interleaving.

#[cfg(feature = "encoder")]
mod encoder;
#[cfg(feature = "encoder")]
mod recorder;

#[cfg(feature = "encoder")]
pub use encoder::{EncodedFrame, H264Encoder};
#[cfg(feature = "encoder")]
pub use recorder::Mp4FileSink;

use std::sync::Mutex;

use crate::config::{AudioOptions, VideoOptions};
use crate::errors::StreamError;

/// The opaque media sink capability
///
/// Implementations encode raw frames/samples to H.264/AAC and mux them
/// toward the given URL. A sink is not assumed to tolerate concurrent
/// calls; [`EncodingSink`] provides the serialization boundary.
pub trait MediaSink: Send {
    /// Configure codecs and start the underlying encoder
    fn open(
        &mut self,
        url: &str,
        video: &VideoOptions,
        audio: &AudioOptions,
    ) -> Result<(), StreamError>;

    /// Write one raw video frame with its capture timestamp in microseconds
    fn write_video_frame(&mut self, pixels: &[u8], timestamp_micros: u64)
        -> Result<(), StreamError>;

    /// Append a chunk of 16-bit PCM samples; the sink advances its own audio clock
    fn write_audio_samples(&mut self, samples: &[i16]) -> Result<(), StreamError>;

    /// Stop and release the encoder
    fn close(&mut self) -> Result<(), StreamError>;
}

/// Counters exposed by the adapter for diagnostics and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Video frames committed to the sink
    pub video_frames: u64,
    /// Audio chunks committed to the sink
    pub audio_chunks: u64,
    /// Timestamps clamped forward to preserve monotonicity
    pub clamped_timestamps: u64,
    /// Per-unit encode failures swallowed after logging
    pub encode_errors: u64,
}

struct SinkState {
    sink: Box<dyn MediaSink>,
    open: bool,
    last_timestamp: Option<u64>,
    stats: SinkStats,
}

/// Serialization boundary around one [`MediaSink`]
///
/// Both capture paths call into this adapter; a single mutex guards every
/// entry point so the underlying encoder never sees interleaved writes.
/// Per-unit encode failures are logged and swallowed; only `open` and
/// `close` failures surface to the session controller.
pub struct EncodingSink {
    state: Mutex<SinkState>,
}

impl EncodingSink {
    /// Wrap a media sink in the serialization boundary
    pub fn new(sink: Box<dyn MediaSink>) -> Self {
        Self {
            state: Mutex::new(SinkState {
                sink,
                open: false,
                last_timestamp: None,
                stats: SinkStats::default(),
            }),
        }
    }

    /// Configure and start the underlying sink; fatal on failure
    pub fn open(
        &self,
        url: &str,
        video: &VideoOptions,
        audio: &AudioOptions,
    ) -> Result<(), StreamError> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.open {
            return Err(StreamError::SessionError(
                "encoding sink already open".to_string(),
            ));
        }
        state.sink.open(url, video, audio)?;
        state.open = true;
        state.last_timestamp = None;
        state.stats = SinkStats::default();
        log::debug!("encoding sink open: {} {}x{}", url, video.width, video.height);
        Ok(())
    }

    /// Commit one video frame, clamping its timestamp forward if late
    ///
    /// A late-arriving timestamp is clamped to one past the last committed
    /// value, never rejected. Frames arriving after close are dropped.
    pub fn record_video(&self, pixels: &[u8], timestamp_micros: u64) {
        let mut state = self.state.lock().expect("lock poisoned");
        if !state.open {
            return;
        }

        let committed = match state.last_timestamp {
            Some(last) if timestamp_micros <= last => {
                state.stats.clamped_timestamps += 1;
                last + 1
            }
            _ => timestamp_micros,
        };

        match state.sink.write_video_frame(pixels, committed) {
            Ok(()) => {
                state.last_timestamp = Some(committed);
                state.stats.video_frames += 1;
            }
            Err(e) => {
                state.stats.encode_errors += 1;
                log::warn!("video frame rejected by sink: {}", e);
            }
        }
    }

    /// Commit one chunk of PCM samples
    pub fn record_audio(&self, samples: &[i16]) {
        let mut state = self.state.lock().expect("lock poisoned");
        if !state.open {
            return;
        }

        match state.sink.write_audio_samples(samples) {
            Ok(()) => state.stats.audio_chunks += 1,
            Err(e) => {
                state.stats.encode_errors += 1;
                log::warn!("audio chunk rejected by sink: {}", e);
            }
        }
    }

    /// Stop and release the underlying sink
    ///
    /// Idempotent: closing an already-closed sink is a no-op. A failing
    /// close still marks the sink closed so no further writes reach it.
    pub fn close(&self) -> Result<(), StreamError> {
        let mut state = self.state.lock().expect("lock poisoned");
        if !state.open {
            return Ok(());
        }
        state.open = false;
        state
            .sink
            .close()
            .map_err(|e| StreamError::TeardownError(format!("sink close failed: {}", e)))
    }

    /// Whether the sink is currently open
    pub fn is_open(&self) -> bool {
        self.state.lock().expect("lock poisoned").open
    }

    /// Snapshot of the adapter's counters
    pub fn stats(&self) -> SinkStats {
        self.state.lock().expect("lock poisoned").stats
    }
}

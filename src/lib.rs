//! camcast: live camera and microphone capture with a synchronized encoding sink
//!
//! This crate wires two asynchronously driven capture producers - a camera
//! frame callback running on the platform's delivery thread and a dedicated
//! microphone polling thread - into a single non-thread-safe encoder/muxer,
//! with monotonically increasing timestamps and clean start/stop semantics.
//!
//! # Features
//! - Serialized encoding sink with timestamp clamping
//! - Pre-allocated frame and sample pools (no per-frame allocation)
//! - Session controller with all-or-nothing open and bounded teardown
//! - `encoder`: bundled openh264/muxide file sink
//! - `devices`: nokhwa camera and cpal microphone collaborators
//!
//! # Usage
//! ```rust,no_run
//! use camcast::{AudioOptions, SessionConfig, StreamSession, VideoOptions};
//! use camcast::testing::{MockSink, ScriptedCamera, ToneMicrophone};
//! use std::time::Duration;
//!
//! let config = SessionConfig::new(
//!     "rtmp://example.com/live/key",
//!     VideoOptions::new(640, 480, 30.0),
//!     AudioOptions::new(44_100),
//! );
//!
//! let (sink, _handle) = MockSink::new();
//! let camera = ScriptedCamera::new(90, Duration::from_millis(33));
//! let mic = ToneMicrophone::new(1024);
//!
//! let mut session = StreamSession::new(config);
//! session.open(Box::new(camera), Box::new(mic), Box::new(sink))?;
//! // ... stream ...
//! session.close()?;
//! # Ok::<(), camcast::StreamError>(())
//! ```

pub mod capture;
pub mod config;
pub mod errors;
pub mod pool;
pub mod session;
pub mod sink;
pub mod timing;

#[cfg(feature = "devices")]
pub mod device;

// Testing utilities - synthetic data and collaborator doubles for
// offline testing; also used by external tests.
pub mod testing;

// Re-exports for convenience
pub use capture::{AudioGrabber, CameraSource, FrameCallback, MicrophoneSource, VideoGrabber};
pub use config::{AudioOptions, SessionConfig, StreamQuality, VideoOptions};
pub use errors::StreamError;
pub use pool::{FrameSlot, SampleChunk, SlotPool};
pub use session::{SessionState, SessionStats, StreamSession};
pub use sink::{EncodingSink, MediaSink, SinkStats};
pub use timing::PtsClock;

#[cfg(feature = "encoder")]
pub use sink::{EncodedFrame, H264Encoder, Mp4FileSink};

#[cfg(feature = "devices")]
pub use device::{CpalMicrophone, NokhwaCamera};

/// Initialize logging for the capture pipeline
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "camcast=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

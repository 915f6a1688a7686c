//! Capture producers
//!
//! Two independent producers feed the encoding sink: the video grabber,
//! driven by the camera's own callback thread, and the audio grabber,
//! which owns a dedicated polling thread.

pub mod audio;
pub mod video;

pub use audio::{AudioGrabber, MicrophoneSource};
pub use video::{CameraSource, FrameCallback, VideoGrabber};

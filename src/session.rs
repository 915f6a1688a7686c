//! Session controller
//!
//! Orchestrates open/close across the camera callback, the audio thread,
//! and the encoding sink, guaranteeing ordering and exclusivity during
//! startup and teardown. A session is never partially started: producers
//! and the sink are either all acquired or all released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::capture::{AudioGrabber, CameraSource, MicrophoneSource, VideoGrabber};
use crate::config::SessionConfig;
use crate::errors::StreamError;
use crate::pool::SlotPool;
use crate::sink::{EncodingSink, MediaSink, SinkStats};
use crate::timing::PtsClock;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening,
    Running,
    Closing,
}

/// Counters aggregated across the pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    /// Sink-side counters (committed units, clamps, swallowed errors)
    pub sink: SinkStats,
    /// Frames forwarded by the video callback
    pub frames_forwarded: u64,
    /// Frames dropped by the video callback
    pub frames_dropped: u64,
    /// Chunks forwarded by the audio thread
    pub chunks_forwarded: u64,
}

/// One end-to-end capture-to-sink lifecycle
///
/// State machine: `Idle -> Opening -> Running -> Closing -> Idle`.
pub struct StreamSession {
    config: SessionConfig,
    state: SessionState,
    running: Arc<AtomicBool>,
    sink: Option<Arc<EncodingSink>>,
    camera: Option<Box<dyn CameraSource>>,
    video: Option<VideoGrabber>,
    audio: Option<AudioGrabber>,
}

impl StreamSession {
    /// Create an idle session for the given configuration
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            running: Arc::new(AtomicBool::new(false)),
            sink: None,
            camera: None,
            video: None,
            audio: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether producers are currently feeding the sink
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Acquire all resources and start streaming
    ///
    /// Valid only from `Idle`. Negotiates the camera geometry, sizes the
    /// frame pool to it, opens the sink, then registers the video
    /// callback and starts the audio thread, in that order. `Running` is
    /// reached only after all three succeed; any failure rolls back the
    /// partially acquired resources and returns the session to `Idle`.
    pub fn open(
        &mut self,
        mut camera: Box<dyn CameraSource>,
        mic: Box<dyn MicrophoneSource>,
        sink: Box<dyn MediaSink>,
    ) -> Result<(), StreamError> {
        if self.state != SessionState::Idle {
            return Err(StreamError::SessionError(format!(
                "open is valid only from Idle, session is {:?}",
                self.state
            )));
        }
        self.state = SessionState::Opening;
        log::debug!("session opening: {}", self.config.url);

        match self.open_inner(&mut camera, mic, sink) {
            Ok(()) => {
                self.camera = Some(camera);
                self.running.store(true, Ordering::Release);
                self.state = SessionState::Running;
                log::debug!("session running");
                Ok(())
            }
            Err(e) => {
                camera.stop();
                if let Some(audio) = self.audio.take() {
                    if let Err(join_err) = audio.stop(self.config.join_timeout) {
                        log::warn!("audio rollback failed: {}", join_err);
                    }
                }
                if let Some(sink) = self.sink.take() {
                    if let Err(close_err) = sink.close() {
                        log::warn!("sink rollback failed: {}", close_err);
                    }
                }
                self.video = None;
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    fn open_inner(
        &mut self,
        camera: &mut Box<dyn CameraSource>,
        mic: Box<dyn MicrophoneSource>,
        sink: Box<dyn MediaSink>,
    ) -> Result<(), StreamError> {
        let (width, height) =
            camera.negotiate(self.config.video.width, self.config.video.height)?;

        // The sink and the pool are sized to the geometry the camera
        // actually granted, not the one requested.
        let mut video_options = self.config.video.clone();
        video_options.width = width;
        video_options.height = height;
        let frame_bytes = video_options.frame_size_bytes();

        let encoding_sink = Arc::new(EncodingSink::new(sink));
        encoding_sink.open(&self.config.url, &video_options, &self.config.audio)?;
        self.sink = Some(encoding_sink.clone());

        let clock = PtsClock::new();
        let grabber = VideoGrabber::new(
            encoding_sink.clone(),
            SlotPool::frames(self.config.frame_pool_slots, frame_bytes),
            clock,
            self.running.clone(),
            frame_bytes,
        );
        camera.start(grabber.callback())?;
        self.video = Some(grabber);

        self.audio = Some(AudioGrabber::spawn(mic, &self.config, encoding_sink)?);
        Ok(())
    }

    /// Stop producers, drain them, and release the sink
    ///
    /// Transitions to `Closing` immediately so late callbacks self-drop,
    /// then unregisters the video callback, joins the audio thread, and
    /// closes the sink. Local handles are released even when a teardown
    /// step fails; the first failure is surfaced after everything has
    /// been released. `close` on an idle session is a no-op.
    pub fn close(&mut self) -> Result<(), StreamError> {
        if self.state == SessionState::Idle {
            return Ok(());
        }
        self.state = SessionState::Closing;
        self.running.store(false, Ordering::Release);
        log::debug!("session closing");

        let mut teardown: Option<StreamError> = None;

        if let Some(mut camera) = self.camera.take() {
            camera.stop();
        }

        if let Some(audio) = self.audio.take() {
            if let Err(e) = audio.stop(self.config.join_timeout) {
                log::error!("audio teardown failed: {}", e);
                teardown = Some(e);
            }
        }

        if let Some(sink) = self.sink.take() {
            if let Err(e) = sink.close() {
                log::warn!("sink teardown failed: {}", e);
                teardown.get_or_insert(e);
            }
        }

        self.video = None;
        self.state = SessionState::Idle;
        log::debug!("session idle");

        match teardown {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Pause or resume gating of audio chunks into the sink
    pub fn set_audio_recording(&self, recording: bool) {
        if let Some(audio) = &self.audio {
            audio.set_recording(recording);
        }
    }

    /// Snapshot of the pipeline's counters
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            sink: self
                .sink
                .as_ref()
                .map(|s| s.stats())
                .unwrap_or_default(),
            frames_forwarded: self.video.as_ref().map(|v| v.forwarded()).unwrap_or(0),
            frames_dropped: self.video.as_ref().map(|v| v.dropped()).unwrap_or(0),
            chunks_forwarded: self.audio.as_ref().map(|a| a.forwarded()).unwrap_or(0),
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if self.state != SessionState::Idle {
            if let Err(e) = self.close() {
                log::warn!("error closing session in drop: {}", e);
            }
        }
    }
}

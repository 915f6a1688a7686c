//! Offline test doubles and synthetic capture data
//!
//! Deterministic stand-ins for the camera, microphone, and media sink
//! collaborators, enabling reliable testing without hardware or a
//! network endpoint.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::capture::{CameraSource, FrameCallback, MicrophoneSource};
use crate::config::{AudioOptions, VideoOptions};
use crate::errors::StreamError;
use crate::sink::MediaSink;

/// Generate one synthetic NV21 frame with per-frame varying content
///
/// The gradient pattern changes each frame so temporal encoding paths
/// see realistic input.
pub fn synthetic_nv21_frame(frame_number: u64, width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let y_size = w * h;
    let mut data = vec![128u8; y_size * 3 / 2];

    let base = (frame_number % 256) as u8;
    for y in 0..h {
        for x in 0..w {
            data[y * w + x] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }
    data
}

/// Generate one chunk of 440 Hz tone PCM at 44.1 kHz mono
pub fn synthetic_pcm_chunk(chunk_number: u64, samples: usize) -> Vec<i16> {
    let sample_rate = 44_100.0;
    let frequency = 440.0;
    (0..samples)
        .map(|i| {
            let t = (chunk_number as f64 * samples as f64 + i as f64) / sample_rate;
            let value = (2.0 * std::f64::consts::PI * frequency * t).sin() * 0.3;
            (value * i16::MAX as f64) as i16
        })
        .collect()
}

struct MockShared {
    video: Mutex<Vec<(u64, usize)>>,
    audio: Mutex<Vec<usize>>,
    open_calls: AtomicU64,
    close_calls: AtomicU64,
    fail_video: AtomicU64,
    fail_audio: AtomicU64,
    write_delay: Mutex<Duration>,
    last_url: Mutex<Option<String>>,
}

/// Recording [`MediaSink`] double
///
/// Records every call for assertions through its [`MockSinkHandle`] and
/// can script per-call failures and artificial write latency.
pub struct MockSink {
    shared: Arc<MockShared>,
}

/// Shared assertion handle for a [`MockSink`]
#[derive(Clone)]
pub struct MockSinkHandle {
    shared: Arc<MockShared>,
}

impl MockSink {
    /// Create a sink and its assertion handle
    pub fn new() -> (Self, MockSinkHandle) {
        let shared = Arc::new(MockShared {
            video: Mutex::new(Vec::new()),
            audio: Mutex::new(Vec::new()),
            open_calls: AtomicU64::new(0),
            close_calls: AtomicU64::new(0),
            fail_video: AtomicU64::new(0),
            fail_audio: AtomicU64::new(0),
            write_delay: Mutex::new(Duration::ZERO),
            last_url: Mutex::new(None),
        });
        (
            Self {
                shared: shared.clone(),
            },
            MockSinkHandle { shared },
        )
    }
}

impl MediaSink for MockSink {
    fn open(
        &mut self,
        url: &str,
        _video: &VideoOptions,
        _audio: &AudioOptions,
    ) -> Result<(), StreamError> {
        self.shared.open_calls.fetch_add(1, Ordering::Relaxed);
        *self.shared.last_url.lock().expect("lock poisoned") = Some(url.to_string());
        Ok(())
    }

    fn write_video_frame(
        &mut self,
        pixels: &[u8],
        timestamp_micros: u64,
    ) -> Result<(), StreamError> {
        let delay = *self.shared.write_delay.lock().expect("lock poisoned");
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if take_scripted_failure(&self.shared.fail_video) {
            return Err(StreamError::SinkError("scripted video failure".to_string()));
        }
        self.shared
            .video
            .lock()
            .expect("lock poisoned")
            .push((timestamp_micros, pixels.len()));
        Ok(())
    }

    fn write_audio_samples(&mut self, samples: &[i16]) -> Result<(), StreamError> {
        if take_scripted_failure(&self.shared.fail_audio) {
            return Err(StreamError::SinkError("scripted audio failure".to_string()));
        }
        self.shared
            .audio
            .lock()
            .expect("lock poisoned")
            .push(samples.len());
        Ok(())
    }

    fn close(&mut self) -> Result<(), StreamError> {
        self.shared.close_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn take_scripted_failure(counter: &AtomicU64) -> bool {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        .is_ok()
}

impl MockSinkHandle {
    /// Number of committed video frames
    pub fn video_calls(&self) -> u64 {
        self.shared.video.lock().expect("lock poisoned").len() as u64
    }

    /// Number of committed audio chunks
    pub fn audio_calls(&self) -> u64 {
        self.shared.audio.lock().expect("lock poisoned").len() as u64
    }

    /// Timestamps of committed video frames, in commit order
    pub fn video_timestamps(&self) -> Vec<u64> {
        self.shared
            .video
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|&(ts, _)| ts)
            .collect()
    }

    /// Byte lengths of committed video frames, in commit order
    pub fn video_byte_lengths(&self) -> Vec<usize> {
        self.shared
            .video
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|&(_, len)| len)
            .collect()
    }

    /// Sample counts of committed audio chunks, in commit order
    pub fn audio_sample_counts(&self) -> Vec<usize> {
        self.shared.audio.lock().expect("lock poisoned").clone()
    }

    /// Number of `open` calls observed
    pub fn open_calls(&self) -> u64 {
        self.shared.open_calls.load(Ordering::Relaxed)
    }

    /// Number of `close` calls observed
    pub fn close_calls(&self) -> u64 {
        self.shared.close_calls.load(Ordering::Relaxed)
    }

    /// URL passed to the last `open`
    pub fn last_url(&self) -> Option<String> {
        self.shared.last_url.lock().expect("lock poisoned").clone()
    }

    /// Fail the next `count` video writes
    pub fn fail_video_writes(&self, count: u64) {
        self.shared.fail_video.store(count, Ordering::Relaxed);
    }

    /// Fail the next `count` audio writes
    pub fn fail_audio_writes(&self, count: u64) {
        self.shared.fail_audio.store(count, Ordering::Relaxed);
    }

    /// Sleep this long inside every video write
    pub fn set_write_delay(&self, delay: Duration) {
        *self.shared.write_delay.lock().expect("lock poisoned") = delay;
    }
}

/// [`MediaSink`] whose `open` always fails
#[derive(Default)]
pub struct FailingSink;

impl MediaSink for FailingSink {
    fn open(
        &mut self,
        _url: &str,
        _video: &VideoOptions,
        _audio: &AudioOptions,
    ) -> Result<(), StreamError> {
        Err(StreamError::SinkError("scripted open failure".to_string()))
    }

    fn write_video_frame(&mut self, _pixels: &[u8], _ts: u64) -> Result<(), StreamError> {
        Err(StreamError::SinkError("sink never opened".to_string()))
    }

    fn write_audio_samples(&mut self, _samples: &[i16]) -> Result<(), StreamError> {
        Err(StreamError::SinkError("sink never opened".to_string()))
    }

    fn close(&mut self) -> Result<(), StreamError> {
        Ok(())
    }
}

/// [`CameraSource`] that fires a scripted number of synthetic frames
/// from its own delivery thread
pub struct ScriptedCamera {
    frames: u64,
    interval: Duration,
    size: (u32, u32),
    run: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ScriptedCamera {
    /// Camera that will deliver `frames` frames, one per `interval`
    pub fn new(frames: u64, interval: Duration) -> Self {
        Self {
            frames,
            interval,
            size: (0, 0),
            run: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl CameraSource for ScriptedCamera {
    fn negotiate(&mut self, width: u32, height: u32) -> Result<(u32, u32), StreamError> {
        self.size = (width, height);
        Ok(self.size)
    }

    fn start(&mut self, mut callback: FrameCallback) -> Result<(), StreamError> {
        if self.size == (0, 0) {
            return Err(StreamError::CaptureError(
                "camera geometry not negotiated".to_string(),
            ));
        }
        self.run.store(true, Ordering::Release);
        let run = self.run.clone();
        let (width, height) = self.size;
        let frames = self.frames;
        let interval = self.interval;

        let handle = std::thread::Builder::new()
            .name("scripted-camera".to_string())
            .spawn(move || {
                for i in 0..frames {
                    if !run.load(Ordering::Acquire) {
                        break;
                    }
                    callback(&synthetic_nv21_frame(i, width, height));
                    std::thread::sleep(interval);
                }
            })
            .map_err(|e| StreamError::CaptureError(format!("delivery thread: {}", e)))?;
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.run.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// [`CameraSource`] whose callback is fired manually through a trigger
///
/// Used for race tests that need precise control over when frames arrive
/// relative to session teardown.
pub struct ManualCamera {
    slot: Arc<Mutex<Option<FrameCallback>>>,
    size: (u32, u32),
}

/// Firing handle for a [`ManualCamera`]
#[derive(Clone)]
pub struct ManualTrigger {
    slot: Arc<Mutex<Option<FrameCallback>>>,
}

impl ManualCamera {
    /// Create a camera and the trigger that drives it
    pub fn new() -> (Self, ManualTrigger) {
        let slot = Arc::new(Mutex::new(None));
        (
            Self {
                slot: slot.clone(),
                size: (0, 0),
            },
            ManualTrigger { slot },
        )
    }
}

impl CameraSource for ManualCamera {
    fn negotiate(&mut self, width: u32, height: u32) -> Result<(u32, u32), StreamError> {
        self.size = (width, height);
        Ok(self.size)
    }

    fn start(&mut self, callback: FrameCallback) -> Result<(), StreamError> {
        *self.slot.lock().expect("lock poisoned") = Some(callback);
        Ok(())
    }

    fn stop(&mut self) {
        // Unregistering is what a real camera does on stop; a concurrent
        // fire either completes before this or sees the empty slot.
        *self.slot.lock().expect("lock poisoned") = None;
    }
}

impl ManualTrigger {
    /// Fire one frame through the registered callback, if any
    ///
    /// Returns whether a callback was registered.
    pub fn fire(&self, data: &[u8]) -> bool {
        let mut slot = self.slot.lock().expect("lock poisoned");
        match slot.as_mut() {
            Some(callback) => {
                callback(data);
                true
            }
            None => false,
        }
    }
}

/// [`MicrophoneSource`] producing a 440 Hz tone with configurable read
/// latency and scripted failures
pub struct ToneMicrophone {
    buffer_samples: usize,
    read_latency: Duration,
    fail_open: bool,
    opened: bool,
    started: bool,
    chunk_number: u64,
}

impl ToneMicrophone {
    /// Microphone whose reads return `buffer_samples` samples
    pub fn new(buffer_samples: usize) -> Self {
        Self {
            buffer_samples,
            read_latency: Duration::from_millis(5),
            fail_open: false,
            opened: false,
            started: false,
            chunk_number: 0,
        }
    }

    /// Block this long inside every read (the device buffer interval)
    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = latency;
        self
    }

    /// Make `open` fail
    pub fn with_open_failure(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

impl MicrophoneSource for ToneMicrophone {
    fn min_buffer_size(&self, _sample_rate: u32) -> Result<usize, StreamError> {
        Ok(self.buffer_samples)
    }

    fn open(&mut self, _sample_rate: u32, _buffer_samples: usize) -> Result<(), StreamError> {
        if self.fail_open {
            return Err(StreamError::AudioError(
                "scripted device open failure".to_string(),
            ));
        }
        self.opened = true;
        Ok(())
    }

    fn start(&mut self) -> Result<(), StreamError> {
        if !self.opened {
            return Err(StreamError::AudioError("device not open".to_string()));
        }
        self.started = true;
        Ok(())
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize, StreamError> {
        if !self.started {
            return Err(StreamError::AudioError("device not started".to_string()));
        }
        std::thread::sleep(self.read_latency);
        let tone = synthetic_pcm_chunk(self.chunk_number, buf.len());
        buf.copy_from_slice(&tone);
        self.chunk_number += 1;
        Ok(buf.len())
    }

    fn stop(&mut self) {
        self.started = false;
    }
}

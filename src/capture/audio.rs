//! Audio capture thread
//!
//! A dedicated thread owns the microphone collaborator for its whole
//! lifetime: it opens the device on entry, reads PCM chunks in a tight
//! loop (the blocking device read is the thread's designated suspension
//! point), and stops and releases the device before it exits. The
//! controller joins the thread with a bounded timeout, so the device is
//! fully released before a new session may reopen it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::SessionConfig;
use crate::errors::StreamError;
use crate::pool::SlotPool;
use crate::sink::EncodingSink;

/// The platform microphone capability
///
/// `read` blocks until the device buffer fills; a stop request must be
/// observable within one such read interval.
pub trait MicrophoneSource: Send {
    /// Minimum device buffer size in samples for the given rate
    fn min_buffer_size(&self, sample_rate: u32) -> Result<usize, StreamError>;

    /// Open the device: mono, signed 16-bit PCM at `sample_rate`
    fn open(&mut self, sample_rate: u32, buffer_samples: usize) -> Result<(), StreamError>;

    /// Begin capturing
    fn start(&mut self) -> Result<(), StreamError>;

    /// Blocking read; returns the number of samples written into `buf`
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, StreamError>;

    /// Stop capturing; the device is released on drop
    fn stop(&mut self);
}

/// Handle to the dedicated audio capture thread
pub struct AudioGrabber {
    run: Arc<AtomicBool>,
    recording: Arc<AtomicBool>,
    forwarded: Arc<AtomicU64>,
    read_errors: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl AudioGrabber {
    /// Spawn the capture thread and wait for the device to start
    ///
    /// Device setup happens on the capture thread itself; its outcome is
    /// reported back so a session open stays all-or-nothing. The
    /// recording gate and the run flag are distinct: the gate starts in
    /// the run state and can be toggled independently to pause sink
    /// forwarding without stopping the device.
    pub fn spawn(
        mut mic: Box<dyn MicrophoneSource>,
        config: &SessionConfig,
        sink: Arc<EncodingSink>,
    ) -> Result<Self, StreamError> {
        let run = Arc::new(AtomicBool::new(true));
        let recording = Arc::new(AtomicBool::new(true));
        let forwarded = Arc::new(AtomicU64::new(0));
        let read_errors = Arc::new(AtomicU64::new(0));

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), StreamError>>();

        let thread_run = run.clone();
        let thread_recording = recording.clone();
        let thread_forwarded = forwarded.clone();
        let thread_read_errors = read_errors.clone();
        let thread_config = config.clone();

        let handle = std::thread::Builder::new()
            .name("camcast-audio".to_string())
            .spawn(move || {
                let sample_rate = thread_config.audio.sample_rate;
                let setup = mic
                    .min_buffer_size(sample_rate)
                    .and_then(|buffer_samples| {
                        mic.open(sample_rate, buffer_samples)?;
                        mic.start()?;
                        Ok(buffer_samples)
                    });

                let buffer_samples = match setup {
                    Ok(n) => {
                        let _ = ready_tx.send(Ok(()));
                        n
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let capacity = thread_config.chunk_capacity(buffer_samples);
                let ring = SlotPool::chunks(capacity, buffer_samples);
                // Overflow read target for the rare case every ring slot
                // is checked out; the device must still be drained.
                let mut scratch = vec![0i16; buffer_samples];

                log::debug!(
                    "audio thread running: {} Hz, {}-sample reads, {} ring slots",
                    sample_rate,
                    buffer_samples,
                    capacity
                );

                while thread_run.load(Ordering::Acquire) {
                    match ring.acquire() {
                        Some(mut chunk) => {
                            match mic.read(&mut chunk.data) {
                                Ok(samples_read) => {
                                    chunk.len = samples_read;
                                    if samples_read > 0
                                        && thread_recording.load(Ordering::Acquire)
                                    {
                                        sink.record_audio(chunk.filled());
                                        thread_forwarded.fetch_add(1, Ordering::Relaxed);
                                    }
                                }
                                Err(e) => {
                                    thread_read_errors.fetch_add(1, Ordering::Relaxed);
                                    log::warn!("audio read failed: {}", e);
                                }
                            }
                        }
                        None => {
                            // Keep draining the device even when no slot
                            // is free; the chunk is discarded.
                            if let Err(e) = mic.read(&mut scratch) {
                                thread_read_errors.fetch_add(1, Ordering::Relaxed);
                                log::warn!("audio read failed: {}", e);
                            }
                        }
                    }
                }

                // Release the device from inside the thread so a join
                // guarantees it is free for the next session.
                mic.stop();
                drop(mic);
                log::debug!("audio thread finished, device released");
            })
            .map_err(|e| StreamError::AudioError(format!("audio thread spawn failed: {}", e)))?;

        match ready_rx.recv_timeout(config.join_timeout) {
            Ok(Ok(())) => Ok(Self {
                run,
                recording,
                forwarded,
                read_errors,
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                run.store(false, Ordering::Release);
                Err(StreamError::AudioError(
                    "audio device did not start within timeout".to_string(),
                ))
            }
        }
    }

    /// Toggle the recording gate without stopping the device
    pub fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::Release);
    }

    /// Whether chunks are currently gated into the sink
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    /// Chunks committed to the sink
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Device read failures logged and skipped
    pub fn read_errors(&self) -> u64 {
        self.read_errors.load(Ordering::Relaxed)
    }

    /// Signal the thread and join it within `timeout`
    ///
    /// An unresponsive join is a fatal teardown error; the thread keeps
    /// its handle cleared either way so the grabber cannot be joined
    /// twice.
    pub fn stop(mut self, timeout: Duration) -> Result<(), StreamError> {
        self.recording.store(false, Ordering::Release);
        self.run.store(false, Ordering::Release);

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let deadline = Instant::now() + timeout;
        loop {
            if handle.is_finished() {
                let _ = handle.join();
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(StreamError::TeardownError(
                    "audio thread did not stop within timeout".to_string(),
                ));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Drop for AudioGrabber {
    fn drop(&mut self) {
        // Signal the thread even when stop was never called; the thread
        // owns the device and will release it on exit.
        self.recording.store(false, Ordering::Release);
        self.run.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioOptions, VideoOptions};
    use crate::testing::{MockSink, ToneMicrophone};

    fn test_config() -> SessionConfig {
        SessionConfig::new(
            "rtmp://example/live",
            VideoOptions::new(4, 2, 30.0),
            AudioOptions::new(44_100),
        )
        .with_join_timeout(Duration::from_secs(2))
    }

    fn open_sink() -> (Arc<EncodingSink>, crate::testing::MockSinkHandle) {
        let (mock, handle) = MockSink::new();
        let sink = Arc::new(EncodingSink::new(Box::new(mock)));
        sink.open(
            "rtmp://example/live",
            &VideoOptions::new(4, 2, 30.0),
            &AudioOptions::new(44_100),
        )
        .expect("open");
        (sink, handle)
    }

    #[test]
    fn test_chunks_flow_and_thread_joins() {
        let (sink, handle) = open_sink();
        let mic = ToneMicrophone::new(1024).with_read_latency(Duration::from_millis(1));
        let grabber =
            AudioGrabber::spawn(Box::new(mic), &test_config(), sink).expect("spawn");

        std::thread::sleep(Duration::from_millis(50));
        grabber.stop(Duration::from_secs(2)).expect("join");

        assert!(handle.audio_calls() > 0, "chunks should reach the sink");
        // Every committed chunk carries the trimmed read length.
        assert!(handle.audio_sample_counts().iter().all(|&n| n == 1024));
    }

    #[test]
    fn test_recording_gate_pauses_forwarding() {
        let (sink, handle) = open_sink();
        let mic = ToneMicrophone::new(256).with_read_latency(Duration::from_millis(1));
        let grabber =
            AudioGrabber::spawn(Box::new(mic), &test_config(), sink).expect("spawn");

        assert!(grabber.is_recording(), "gate defaults to the run state");
        grabber.set_recording(false);
        std::thread::sleep(Duration::from_millis(20));
        let paused_at = handle.audio_calls();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(handle.audio_calls(), paused_at, "gate must hold chunks back");

        grabber.set_recording(true);
        std::thread::sleep(Duration::from_millis(30));
        assert!(handle.audio_calls() > paused_at, "gate must resume");

        grabber.stop(Duration::from_secs(2)).expect("join");
    }

    #[test]
    fn test_failed_device_open_fails_spawn() {
        let (sink, _handle) = open_sink();
        let mic = ToneMicrophone::new(256).with_open_failure();
        let result = AudioGrabber::spawn(Box::new(mic), &test_config(), sink);
        assert!(result.is_err(), "device open failure must fail spawn");
    }

    #[test]
    fn test_failed_forward_does_not_abort_thread() {
        let (sink, handle) = open_sink();
        handle.fail_audio_writes(3);
        let mic = ToneMicrophone::new(256).with_read_latency(Duration::from_millis(1));
        let grabber =
            AudioGrabber::spawn(Box::new(mic), &test_config(), sink.clone()).expect("spawn");

        std::thread::sleep(Duration::from_millis(50));
        grabber.stop(Duration::from_secs(2)).expect("join");

        assert!(sink.stats().encode_errors >= 3);
        assert!(
            sink.stats().audio_chunks > 0,
            "thread must keep forwarding after failures"
        );
    }
}

//! Microphone source backed by cpal
//!
//! cpal drives input through its own callback; a bounded channel bridges
//! that to the blocking `read` contract the audio thread expects. The
//! channel bound keeps memory flat when the reader stalls, dropping the
//! oldest-pending chunks at the device side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};

use crate::capture::MicrophoneSource;
use crate::errors::StreamError;

/// Pending device buffers held between cpal's callback and `read`.
/// At 44.1kHz mono with ~23ms device buffers this is roughly a second.
const MAX_PENDING_CHUNKS: usize = 48;

/// How long one `read` waits before reporting a stalled device.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// [`MicrophoneSource`] over the default cpal input device
pub struct CpalMicrophone {
    stream: Option<Stream>,
    sender: Option<Sender<Vec<i16>>>,
    receiver: Option<Receiver<Vec<i16>>>,
    capturing: Arc<AtomicBool>,
    pending: Vec<i16>,
}

impl CpalMicrophone {
    /// Create a source for the system default input device
    pub fn new() -> Self {
        Self {
            stream: None,
            sender: None,
            receiver: None,
            capturing: Arc::new(AtomicBool::new(false)),
            pending: Vec::new(),
        }
    }
}

impl Default for CpalMicrophone {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: the cpal Stream is only touched from the audio capture thread;
// the source is moved there whole and never shared.
unsafe impl Send for CpalMicrophone {}

impl MicrophoneSource for CpalMicrophone {
    fn min_buffer_size(&self, sample_rate: u32) -> Result<usize, StreamError> {
        // cpal does not expose the driver's minimum; derive a buffer from
        // the default config's latency class, ~23ms at the session rate.
        let host = cpal::default_host();
        host.default_input_device()
            .ok_or_else(|| StreamError::AudioError("No default audio device".to_string()))?
            .default_input_config()
            .map_err(|e| StreamError::AudioError(format!("No supported config: {}", e)))?;
        Ok((sample_rate as usize / 43).max(256))
    }

    fn open(&mut self, sample_rate: u32, _buffer_samples: usize) -> Result<(), StreamError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| StreamError::AudioError("No default audio device".to_string()))?;

        let config = StreamConfig {
            channels: 1,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (sender, receiver) = crossbeam_channel::bounded::<Vec<i16>>(MAX_PENDING_CHUNKS);
        let callback_sender = sender.clone();
        let capturing = self.capturing.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if !capturing.load(Ordering::Relaxed) {
                        return;
                    }
                    // Non-blocking send; a full bridge drops this chunk.
                    let _ = callback_sender.try_send(data.to_vec());
                },
                move |err| {
                    log::error!("audio input error: {}", err);
                },
                None,
            )
            .map_err(|e| StreamError::AudioError(format!("Failed to build stream: {}", e)))?;

        self.stream = Some(stream);
        self.sender = Some(sender);
        self.receiver = Some(receiver);
        Ok(())
    }

    fn start(&mut self) -> Result<(), StreamError> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| StreamError::AudioError("device not open".to_string()))?;
        stream
            .play()
            .map_err(|e| StreamError::AudioError(format!("Failed to start stream: {}", e)))?;
        self.capturing.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize, StreamError> {
        let receiver = self
            .receiver
            .as_ref()
            .ok_or_else(|| StreamError::AudioError("device not open".to_string()))?;

        let mut filled = 0;
        while filled < buf.len() {
            if self.pending.is_empty() {
                if filled > 0 {
                    // Return a short read rather than waiting out the
                    // next device buffer.
                    break;
                }
                match receiver.recv_timeout(READ_TIMEOUT) {
                    Ok(chunk) => self.pending = chunk,
                    Err(_) => {
                        return Err(StreamError::AudioError(
                            "audio device read timed out".to_string(),
                        ))
                    }
                }
            }
            let take = self.pending.len().min(buf.len() - filled);
            buf[filled..filled + take].copy_from_slice(&self.pending[..take]);
            self.pending.drain(..take);
            filled += take;
        }
        Ok(filled)
    }

    fn stop(&mut self) {
        self.capturing.store(false, Ordering::Relaxed);
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("failed to pause input stream: {}", e);
            }
        }
        self.sender = None;
        self.receiver = None;
        self.pending.clear();
    }
}

impl Drop for CpalMicrophone {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Session configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Quality presets for the outbound video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamQuality {
    /// 480p at 30fps, low bitrate - mobile uplinks
    Low,
    /// 720p at 30fps, standard bitrate - balanced quality
    Medium,
    /// 1080p at 30fps, high bitrate
    High,
    /// Custom settings
    Custom,
}

impl StreamQuality {
    /// Get recommended video bitrate in bits per second
    pub fn bitrate(&self) -> u32 {
        match self {
            StreamQuality::Low => 1_500_000,
            StreamQuality::Medium => 2_500_000,
            StreamQuality::High => 5_000_000,
            StreamQuality::Custom => 1_500_000,
        }
    }

    /// Get recommended resolution (width, height)
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            StreamQuality::Low => (640, 480),
            StreamQuality::Medium => (1280, 720),
            StreamQuality::High => (1920, 1080),
            StreamQuality::Custom => (640, 480),
        }
    }
}

impl Default for StreamQuality {
    fn default() -> Self {
        StreamQuality::Low
    }
}

/// Video codec options handed to the media sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoOptions {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frames per second
    pub frame_rate: f64,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Keyframe interval in frames
    pub gop_size: u32,
    /// Encoder preset name (e.g. "ultrafast")
    pub preset: String,
    /// Quality preset used
    pub quality: StreamQuality,
}

impl VideoOptions {
    /// Create video options with explicit dimensions
    pub fn new(width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            width,
            height,
            frame_rate,
            bitrate: 1_500_000,
            gop_size: 12,
            preset: "ultrafast".to_string(),
            quality: StreamQuality::Custom,
        }
    }

    /// Create video options from a quality preset
    pub fn from_quality(quality: StreamQuality) -> Self {
        let (width, height) = quality.resolution();
        Self {
            width,
            height,
            frame_rate: 30.0,
            bitrate: quality.bitrate(),
            gop_size: 12,
            preset: "ultrafast".to_string(),
            quality,
        }
    }

    /// Set a custom bitrate
    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    /// Set the keyframe interval
    pub fn with_gop_size(mut self, gop_size: u32) -> Self {
        self.gop_size = gop_size;
        self
    }

    /// Set the encoder preset
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Byte length of one NV21/YUV420 frame at this geometry
    pub fn frame_size_bytes(&self) -> usize {
        (self.width as usize * self.height as usize * 3) / 2
    }
}

/// Audio codec options handed to the media sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioOptions {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Channel count (capture is mono 16-bit PCM)
    pub channels: u16,
}

impl AudioOptions {
    /// Create audio options at the given sample rate, mono
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            bitrate: 128_000,
            channels: 1,
        }
    }

    /// Set a custom bitrate
    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self::new(44_100)
    }
}

/// Configuration for one capture-to-sink session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Output URL handed opaquely to the media sink
    pub url: String,
    /// Video codec options
    pub video: VideoOptions,
    /// Audio codec options
    pub audio: AudioOptions,
    /// Seconds of audio the chunk ring must hold
    pub buffered_seconds: u32,
    /// Video frame pool capacity in slots
    pub frame_pool_slots: usize,
    /// Bound on joining the audio thread during close
    #[serde(skip, default = "default_join_timeout")]
    pub join_timeout: Duration,
}

fn default_join_timeout() -> Duration {
    Duration::from_secs(2)
}

impl SessionConfig {
    /// Create a session configuration for the given URL
    pub fn new(url: impl Into<String>, video: VideoOptions, audio: AudioOptions) -> Self {
        Self {
            url: url.into(),
            video,
            audio,
            buffered_seconds: 5,
            frame_pool_slots: 4,
            join_timeout: default_join_timeout(),
        }
    }

    /// Set the buffered-seconds window used to size the audio chunk ring
    pub fn with_buffered_seconds(mut self, seconds: u32) -> Self {
        self.buffered_seconds = seconds;
        self
    }

    /// Set the video frame pool capacity
    pub fn with_frame_pool_slots(mut self, slots: usize) -> Self {
        self.frame_pool_slots = slots.max(1);
        self
    }

    /// Set the audio thread join timeout
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Audio chunk ring capacity derived from the device buffer size
    ///
    /// `ceil(buffered_seconds * sample_rate * 2 / device_buffer_bytes) + 1`,
    /// where the factor 2 is bytes per 16-bit sample. Never a magic constant.
    pub fn chunk_capacity(&self, device_buffer_samples: usize) -> usize {
        let window_bytes = self.buffered_seconds as usize * self.audio.sample_rate as usize * 2;
        let buffer_bytes = (device_buffer_samples * 2).max(1);
        window_bytes.div_ceil(buffer_bytes) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_bytes_nv21() {
        let video = VideoOptions::new(640, 480, 30.0);
        // 12 bits per pixel
        assert_eq!(video.frame_size_bytes(), 640 * 480 * 3 / 2);
    }

    #[test]
    fn test_chunk_capacity_derivation() {
        let config = SessionConfig::new(
            "rtmp://example/live",
            VideoOptions::new(640, 480, 30.0),
            AudioOptions::new(44_100),
        )
        .with_buffered_seconds(5);

        // 5s * 44100Hz * 2B = 441000B window; 1024-sample reads are 2048B
        let capacity = config.chunk_capacity(1024);
        assert_eq!(capacity, 441_000_usize.div_ceil(2048) + 1);
    }

    #[test]
    fn test_chunk_capacity_never_zero() {
        let config = SessionConfig::new(
            "rtmp://example/live",
            VideoOptions::new(640, 480, 30.0),
            AudioOptions::new(8_000),
        )
        .with_buffered_seconds(0);
        assert!(config.chunk_capacity(4096) >= 1);
    }

    #[test]
    fn test_quality_presets() {
        assert_eq!(StreamQuality::Low.resolution(), (640, 480));
        assert!(StreamQuality::High.bitrate() > StreamQuality::Low.bitrate());
    }

    #[test]
    fn test_config_serializes() {
        let config = SessionConfig::new(
            "rtmp://example/live",
            VideoOptions::from_quality(StreamQuality::Medium),
            AudioOptions::default(),
        );
        let json = serde_json::to_string(&config).expect("serialize");
        assert!(json.contains("rtmp://example/live"));
    }
}

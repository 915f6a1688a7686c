//! Bundled file-backed media sink
//!
//! Encodes frames to H.264 with openh264 and muxes them to MP4 with
//! muxide, treating the session URL as a local output path. The file sink
//! muxes video only; audio chunks are counted so session statistics stay
//! meaningful. Streaming endpoints (RTMP/FLV) implement [`MediaSink`]
//! outside this crate.

use std::fs::File;
use std::io::BufWriter;

use muxide::api::{Metadata, Muxer, MuxerBuilder, VideoCodec};

use super::encoder::H264Encoder;
use super::MediaSink;
use crate::config::{AudioOptions, VideoOptions};
use crate::errors::StreamError;

/// File-backed [`MediaSink`] producing an MP4 with an H.264 video track
pub struct Mp4FileSink {
    encoder: Option<H264Encoder>,
    muxer: Option<Muxer<BufWriter<File>>>,
    audio_chunks: u64,
    dropped_frames: u64,
}

impl Mp4FileSink {
    /// Create a sink that opens its output on [`MediaSink::open`]
    pub fn new() -> Self {
        Self {
            encoder: None,
            muxer: None,
            audio_chunks: 0,
            dropped_frames: 0,
        }
    }

    /// Frames the encoder returned no data for
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Audio chunks accepted (counted, not muxed by the file sink)
    pub fn audio_chunks(&self) -> u64 {
        self.audio_chunks
    }
}

impl Default for Mp4FileSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSink for Mp4FileSink {
    fn open(
        &mut self,
        url: &str,
        video: &VideoOptions,
        _audio: &AudioOptions,
    ) -> Result<(), StreamError> {
        let file = File::create(url)
            .map_err(|e| StreamError::IoError(format!("Failed to create output file: {}", e)))?;
        let writer = BufWriter::new(file);

        let encoder = H264Encoder::new(video.width, video.height, video.frame_rate, video.bitrate)?;

        let metadata = Metadata::new().with_current_time();
        let muxer = MuxerBuilder::new(writer)
            .video(VideoCodec::H264, video.width, video.height, video.frame_rate)
            .with_fast_start(true)
            .with_metadata(metadata)
            .build()
            .map_err(|e| StreamError::MuxingError(format!("Failed to create muxer: {}", e)))?;

        self.encoder = Some(encoder);
        self.muxer = Some(muxer);
        self.audio_chunks = 0;
        self.dropped_frames = 0;
        Ok(())
    }

    fn write_video_frame(
        &mut self,
        pixels: &[u8],
        timestamp_micros: u64,
    ) -> Result<(), StreamError> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| StreamError::EncodingError("sink not open".to_string()))?;
        let muxer = self
            .muxer
            .as_mut()
            .ok_or_else(|| StreamError::MuxingError("sink not open".to_string()))?;

        let encoded = encoder.encode_nv21(pixels)?;

        // The encoder may emit nothing for a frame; not an error.
        if encoded.data.is_empty() {
            self.dropped_frames += 1;
            return Ok(());
        }

        let pts = timestamp_micros as f64 / 1_000_000.0;
        muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| StreamError::MuxingError(format!("Failed to write frame: {}", e)))?;
        Ok(())
    }

    fn write_audio_samples(&mut self, samples: &[i16]) -> Result<(), StreamError> {
        if self.muxer.is_none() {
            return Err(StreamError::MuxingError("sink not open".to_string()));
        }
        self.audio_chunks += 1;
        log::trace!("file sink counted {} audio samples", samples.len());
        Ok(())
    }

    fn close(&mut self) -> Result<(), StreamError> {
        self.encoder = None;
        if let Some(muxer) = self.muxer.take() {
            let stats = muxer
                .finish_with_stats()
                .map_err(|e| StreamError::MuxingError(format!("Failed to finalize output: {}", e)))?;
            log::debug!(
                "file sink finalized: {} frames, {} bytes",
                stats.video_frames,
                stats.bytes_written
            );
        }
        Ok(())
    }
}

//! H.264 encoder wrapper using openh264

use openh264::encoder::{Encoder, FrameType};
use openh264::formats::YUVBuffer;

use crate::errors::StreamError;

/// H.264 encoder using openh264
pub struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    frame_count: u64,
    last_frame_was_keyframe: bool,
}

impl H264Encoder {
    /// Create a new H.264 encoder with the specified parameters
    ///
    /// Note: openh264 determines dimensions from the YUVSource at encode
    /// time. The fps and bitrate are hints for the encoder's rate control.
    pub fn new(width: u32, height: u32, _fps: f64, _bitrate: u32) -> Result<Self, StreamError> {
        let encoder = Encoder::new()
            .map_err(|e| StreamError::EncodingError(format!("Failed to create encoder: {}", e)))?;

        Ok(Self {
            encoder,
            width,
            height,
            frame_count: 0,
            last_frame_was_keyframe: false,
        })
    }

    /// Encode an NV21 frame (Y plane followed by interleaved VU) to H.264
    ///
    /// NV21 is the layout delivered by mobile camera preview callbacks.
    pub fn encode_nv21(&mut self, nv21_data: &[u8]) -> Result<EncodedFrame, StreamError> {
        let expected_size = (self.width * self.height * 3 / 2) as usize;
        if nv21_data.len() != expected_size {
            return Err(StreamError::EncodingError(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected_size,
                nv21_data.len()
            )));
        }

        let yuv = nv21_to_i420(nv21_data, self.width, self.height);
        self.encode_yuv420(&yuv)
    }

    /// Encode a planar I420 frame to H.264
    ///
    /// Returns the encoded NAL units as a single buffer (Annex B format).
    pub fn encode_yuv420(&mut self, yuv_data: &[u8]) -> Result<EncodedFrame, StreamError> {
        let expected_size = (self.width * self.height * 3 / 2) as usize;
        if yuv_data.len() != expected_size {
            return Err(StreamError::EncodingError(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected_size,
                yuv_data.len()
            )));
        }

        let yuv_buffer = YUVBuffer::from_vec(
            yuv_data.to_vec(),
            self.width as usize,
            self.height as usize,
        );

        let bitstream = self
            .encoder
            .encode(&yuv_buffer)
            .map_err(|e| StreamError::EncodingError(format!("Encoding failed: {}", e)))?;

        self.frame_count += 1;

        let is_keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);
        self.last_frame_was_keyframe = is_keyframe;

        Ok(EncodedFrame {
            data: bitstream.to_vec(),
            is_keyframe,
        })
    }

    /// Get the number of frames encoded
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Check if the last encoded frame was a keyframe (IDR)
    pub fn last_was_keyframe(&self) -> bool {
        self.last_frame_was_keyframe
    }

    /// Force the next frame to be a keyframe
    pub fn force_keyframe(&mut self) {
        self.encoder.force_intra_frame();
    }
}

/// Result of encoding a single frame
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Encoded H.264 data in Annex B format (with start codes)
    pub data: Vec<u8>,
    /// Whether this frame is a keyframe (IDR/I frame)
    pub is_keyframe: bool,
}

/// Convert NV21 (Y + interleaved VU) to planar I420 (Y + U + V)
fn nv21_to_i420(nv21: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);

    let mut i420 = vec![0u8; y_size + uv_size * 2];
    i420[..y_size].copy_from_slice(&nv21[..y_size]);

    let (u_plane, v_plane) = i420[y_size..].split_at_mut(uv_size);
    let vu = &nv21[y_size..];
    for i in 0..uv_size {
        v_plane[i] = vu[i * 2];
        u_plane[i] = vu[i * 2 + 1];
    }

    i420
}

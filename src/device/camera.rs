//! Camera source backed by nokhwa's callback camera
//!
//! nokhwa delivers frames on a thread it owns, which matches the capture
//! model exactly: the pipeline's only obligation is thread safety of the
//! registered handler.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::CallbackCamera;

use crate::capture::{CameraSource, FrameCallback};
use crate::errors::StreamError;

/// [`CameraSource`] over a nokhwa callback camera
pub struct NokhwaCamera {
    index: CameraIndex,
    frame_rate: u32,
    camera: Option<CallbackCamera>,
    negotiated: Option<(u32, u32)>,
}

impl NokhwaCamera {
    /// Create a source for the camera at `index`
    pub fn new(index: u32, frame_rate: u32) -> Self {
        Self {
            index: CameraIndex::Index(index),
            frame_rate,
            camera: None,
            negotiated: None,
        }
    }

    fn requested_format(&self, width: u32, height: u32) -> RequestedFormat<'static> {
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            Resolution::new(width, height),
            FrameFormat::NV12,
            self.frame_rate,
        )))
    }
}

impl CameraSource for NokhwaCamera {
    fn negotiate(&mut self, width: u32, height: u32) -> Result<(u32, u32), StreamError> {
        let requested = self.requested_format(width, height);
        let camera = CallbackCamera::new(self.index.clone(), requested, |_| {})
            .map_err(|e| StreamError::CaptureError(format!("Failed to initialize camera: {}", e)))?;

        let format = camera
            .camera_format()
            .map_err(|e| StreamError::CaptureError(format!("Failed to read camera format: {}", e)))?;
        let granted = (format.resolution().width_x, format.resolution().height_y);

        log::debug!(
            "camera negotiated {}x{} (requested {}x{})",
            granted.0,
            granted.1,
            width,
            height
        );
        self.camera = Some(camera);
        self.negotiated = Some(granted);
        Ok(granted)
    }

    fn start(&mut self, mut callback: FrameCallback) -> Result<(), StreamError> {
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| StreamError::CaptureError("camera not negotiated".to_string()))?;

        camera
            .set_callback(move |buffer: nokhwa::Buffer| callback(&buffer.buffer_bytes()))
            .map_err(|e| StreamError::CaptureError(format!("Failed to set callback: {}", e)))?;
        camera
            .open_stream()
            .map_err(|e| StreamError::CaptureError(format!("Failed to start stream: {}", e)))?;
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                log::warn!("failed to stop camera stream: {}", e);
            }
        }
        self.negotiated = None;
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

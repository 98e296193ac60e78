//! Camera component over a device and capture collaborators

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::device::{CameraDevice, SharedDevice};
use super::parameters::{self, CameraParameters, ParamType, ParamValue};
use super::status::{ImageCaptureStatus, VideoCaptureStatus};
use super::{CameraComponent, CameraInfo, CameraMode, ComponentError, StorageInfo};
use crate::capture::{
    CaptureCallback, FrameFileRecorder, FrameFileShutter, ImageCapture, IntervalImageCapture,
    RecordingVideoCapture, VideoCapture,
};
use crate::stream::FrameSize;

/// Parameters the component stores without touching the device
const STORED_ONLY: [&str; 4] = [
    parameters::IMAGE_SIZE,
    parameters::IMAGE_FORMAT,
    parameters::VIDEO_SIZE,
    parameters::VIDEO_FRAME_FORMAT,
];

pub struct DeviceCameraComponent {
    device_id: String,
    device: SharedDevice,
    info: CameraInfo,
    storage: StorageInfo,
    params: CameraParameters,
    image_capture: Box<dyn ImageCapture>,
    video_capture: Box<dyn VideoCapture>,
}

impl DeviceCameraComponent {
    /// Initializes the device and wraps it with the given capture collaborators
    pub fn new(
        device: SharedDevice,
        image_capture: Box<dyn ImageCapture>,
        video_capture: Box<dyn VideoCapture>,
    ) -> Result<Self, ComponentError> {
        let mut params = CameraParameters::new();
        let (device_id, info, mode) = {
            let mut dev = device.lock();
            dev.init(&mut params)?;
            (dev.device_id().to_string(), dev.info(), dev.mode())
        };
        params.set(parameters::CAMERA_MODE, ParamValue::Uint32(mode as u32))?;

        info!(
            device = %device_id,
            vendor = %info.vendor_name,
            model = %info.model_name,
            params = params.len(),
            "camera component ready"
        );

        Ok(Self {
            device_id,
            device,
            info,
            storage: StorageInfo::default(),
            params,
            image_capture,
            video_capture,
        })
    }

    /// Component whose captures write raw frames under the given directories
    pub fn with_raw_capture<D: CameraDevice + 'static>(
        device: D,
        image_location: impl Into<PathBuf>,
        video_location: impl Into<PathBuf>,
        framerate: u32,
    ) -> Result<Self, ComponentError> {
        let device: SharedDevice = Arc::new(Mutex::new(device));
        let image = IntervalImageCapture::new(FrameFileShutter::new(device.clone(), image_location));
        let video = RecordingVideoCapture::new(FrameFileRecorder::new(
            device.clone(),
            video_location,
            framerate,
        ));
        Self::new(device, Box::new(image), Box::new(video))
    }

    /// Camera definition file advertised in CAMERA_INFORMATION
    pub fn set_definition_uri(&mut self, uri: impl Into<String>) {
        self.info.cam_definition_uri = uri.into();
    }
}

impl CameraComponent for DeviceCameraComponent {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn camera_info(&self) -> &CameraInfo {
        &self.info
    }

    fn storage_info(&self) -> &StorageInfo {
        &self.storage
    }

    fn param(&self, name: &str) -> Option<ParamValue> {
        self.params.get(name).cloned()
    }

    fn param_type(&self, name: &str) -> Option<ParamType> {
        self.params.param_type(name)
    }

    fn params(&self) -> &CameraParameters {
        &self.params
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), ComponentError> {
        self.params.check(name, &value)?;

        if name == parameters::CAMERA_MODE {
            let raw = value.as_u32().unwrap_or(u32::MAX);
            let mode = CameraMode::from_u32(raw).ok_or(ComponentError::InvalidMode(raw))?;
            return self.set_camera_mode(mode);
        }

        if !STORED_ONLY.contains(&name) {
            self.device.lock().set_param(name, &value)?;
        }
        debug!(device = %self.device_id, param = name, value = ?value, "parameter set");
        self.params.set(name, value)?;
        Ok(())
    }

    fn camera_mode(&self) -> CameraMode {
        self.device.lock().mode()
    }

    fn set_camera_mode(&mut self, mode: CameraMode) -> Result<(), ComponentError> {
        self.device.lock().set_mode(mode)?;
        self.params
            .set(parameters::CAMERA_MODE, ParamValue::Uint32(mode as u32))?;
        info!(device = %self.device_id, mode = ?mode, "camera mode changed");
        Ok(())
    }

    fn start_image_capture(
        &mut self,
        interval: f32,
        count: u32,
        callback: CaptureCallback,
    ) -> Result<(), ComponentError> {
        self.image_capture.start(interval, count, callback)?;
        Ok(())
    }

    fn stop_image_capture(&mut self) -> Result<(), ComponentError> {
        self.image_capture.stop();
        Ok(())
    }

    fn start_video_capture(&mut self, status_frequency: f32) -> Result<(), ComponentError> {
        debug!(device = %self.device_id, status_frequency, "starting video capture");
        self.video_capture.start()?;
        Ok(())
    }

    fn stop_video_capture(&mut self) -> Result<(), ComponentError> {
        self.video_capture.stop()?;
        Ok(())
    }

    fn image_capture_status(&self) -> ImageCaptureStatus {
        self.image_capture.status()
    }

    fn video_capture_status(&self) -> VideoCaptureStatus {
        self.video_capture.status()
    }

    fn reset_camera_settings(&mut self) -> Result<(), ComponentError> {
        self.device.lock().reset_params(&mut self.params)?;
        info!(device = %self.device_id, "camera settings reset");
        Ok(())
    }

    fn frame_size(&self) -> FrameSize {
        self.device.lock().frame_size()
    }
}

impl Drop for DeviceCameraComponent {
    fn drop(&mut self) {
        self.image_capture.stop();
        if let Err(e) = self.video_capture.stop() {
            warn!(device = %self.device_id, error = %e, "failed to stop recording");
        }
        if let Err(e) = self.device.lock().uninit() {
            warn!(device = %self.device_id, error = %e, "failed to release device");
        }
    }
}

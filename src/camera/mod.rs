//! Camera components: the control surface the protocol server drives
//!
//! A [`CameraComponent`] is what one MAVLink camera component id maps to.
//! [`DeviceCameraComponent`] implements it on top of a [`CameraDevice`]
//! plus image and video capture collaborators.

mod component;
mod custom;
mod device;
pub mod parameters;
pub mod status;

#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use component::DeviceCameraComponent;
pub use custom::{CustomDevice, CUSTOM_DEVICE_ID};
pub use device::{device_file_prefix, CameraDevice, DeviceError, SharedDevice};
pub use parameters::{CameraParameters, ParamError, ParamType, ParamValue};
pub use status::{
    CaptureState, CaptureStatus, ImageCaptureStatus, ImageStatus, VideoCaptureStatus, VideoStatus,
};

use thiserror::Error;

use crate::capture::{CaptureCallback, CaptureError};
use crate::stream::FrameSize;

#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("parameter error: {0}")]
    Param(#[from] ParamError),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("invalid camera mode {0}")]
    InvalidMode(u32),
}

/// CAMERA_MODE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CameraMode {
    #[default]
    Still = 0,
    Video = 1,
}

impl CameraMode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Still),
            1 => Some(Self::Video),
            _ => None,
        }
    }
}

/// Static identity reported in CAMERA_INFORMATION
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraInfo {
    pub vendor_name: String,
    pub model_name: String,
    pub firmware_version: u32,
    /// Millimetres
    pub focal_length: f32,
    /// Millimetres
    pub sensor_size_h: f32,
    /// Millimetres
    pub sensor_size_v: f32,
    pub resolution_h: u16,
    pub resolution_v: u16,
    pub lens_id: u8,
    /// CAMERA_CAP_FLAGS bitmap
    pub flags: u32,
    pub cam_definition_version: u16,
    pub cam_definition_uri: String,
}

/// Storage descriptor reported in STORAGE_INFORMATION
#[derive(Debug, Clone, PartialEq)]
pub struct StorageInfo {
    pub storage_id: u8,
    pub storage_count: u8,
    /// STORAGE_STATUS, 2 = ready
    pub status: u8,
    /// MiB
    pub total_capacity: f32,
    pub used_capacity: f32,
    pub available_capacity: f32,
    /// MiB/s
    pub read_speed: f32,
    pub write_speed: f32,
}

impl Default for StorageInfo {
    fn default() -> Self {
        Self {
            storage_id: 1,
            storage_count: 1,
            status: 2,
            total_capacity: 50.0,
            used_capacity: 0.0,
            available_capacity: 50.0,
            read_speed: 128.0,
            write_speed: 128.0,
        }
    }
}

/// Control surface of one camera component
pub trait CameraComponent: Send {
    /// Device the component drives, used to pair it with its stream
    fn device_id(&self) -> &str;

    fn camera_info(&self) -> &CameraInfo;

    fn storage_info(&self) -> &StorageInfo;

    fn param(&self, name: &str) -> Option<ParamValue>;

    fn param_type(&self, name: &str) -> Option<ParamType>;

    /// All parameters, in PARAM_EXT index order
    fn params(&self) -> &CameraParameters;

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), ComponentError>;

    fn camera_mode(&self) -> CameraMode;

    fn set_camera_mode(&mut self, mode: CameraMode) -> Result<(), ComponentError>;

    /// Starts still capture. `callback` gets the result and 1-based sequence
    /// number of every shot, from whatever thread the capture runs on.
    fn start_image_capture(
        &mut self,
        interval: f32,
        count: u32,
        callback: CaptureCallback,
    ) -> Result<(), ComponentError>;

    fn stop_image_capture(&mut self) -> Result<(), ComponentError>;

    fn start_video_capture(&mut self, status_frequency: f32) -> Result<(), ComponentError>;

    fn stop_video_capture(&mut self) -> Result<(), ComponentError>;

    fn image_capture_status(&self) -> ImageCaptureStatus;

    fn video_capture_status(&self) -> VideoCaptureStatus;

    fn reset_camera_settings(&mut self) -> Result<(), ComponentError>;

    /// Current device resolution
    fn frame_size(&self) -> FrameSize;
}

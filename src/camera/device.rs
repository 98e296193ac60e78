//! Device capability behind a camera component

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use super::parameters::{CameraParameters, ParamValue};
use super::{CameraInfo, CameraMode};
use crate::stream::{FrameSize, PixelFormat};

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parameter '{0}' not supported by device")]
    Unsupported(String),

    #[error("invalid value for '{0}'")]
    InvalidValue(String),

    #[error("device not initialized")]
    NotInitialized,
}

/// Device handle shared between a component and its capture workers
pub type SharedDevice = Arc<Mutex<dyn CameraDevice>>;

/// Hardware (or simulated) camera
pub trait CameraDevice: Send {
    fn device_id(&self) -> &str;

    fn info(&self) -> CameraInfo;

    /// Opens the device and registers its parameters with current values
    fn init(&mut self, params: &mut CameraParameters) -> Result<(), DeviceError>;

    fn uninit(&mut self) -> Result<(), DeviceError>;

    fn mode(&self) -> CameraMode;

    fn set_mode(&mut self, mode: CameraMode) -> Result<(), DeviceError>;

    fn frame_size(&self) -> FrameSize;

    /// Supported pixel formats with their frame sizes
    fn formats(&self) -> Vec<PixelFormat>;

    /// Applies a parameter already type-checked against its definition
    fn set_param(&mut self, name: &str, _value: &ParamValue) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported(name.to_string()))
    }

    /// Restores device defaults and writes them back into `params`
    fn reset_params(&mut self, params: &mut CameraParameters) -> Result<(), DeviceError>;

    /// Reads one raw frame
    fn read_frame(&mut self) -> Result<Vec<u8>, DeviceError>;
}

/// Last path component of a device id, usable in file names
pub fn device_file_prefix(device_id: &str) -> &str {
    device_id
        .rsplit('/')
        .find(|part| !part.is_empty())
        .unwrap_or("camera")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_file_prefix() {
        assert_eq!(device_file_prefix("/dev/video0"), "video0");
        assert_eq!(device_file_prefix("custom"), "custom");
        assert_eq!(device_file_prefix("/"), "camera");
    }
}

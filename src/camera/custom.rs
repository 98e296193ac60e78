//! Built-in custom camera
//!
//! Needs no hardware: frames are a generated gradient and parameters live
//! in memory. Useful for bring-up and for exercising peers.

use tracing::debug;

use super::device::{CameraDevice, DeviceError};
use super::parameters::{CameraParameters, ParamValue};
use super::{CameraInfo, CameraMode};
use crate::stream::{FrameSize, PixelFormat};

pub const CUSTOM_UINT8: &str = "custom-uint8";
pub const CUSTOM_UINT32: &str = "custom-uint32";
pub const CUSTOM_INT32: &str = "custom-int32";
pub const CUSTOM_REAL32: &str = "custom-real32";
pub const CUSTOM_ENUM: &str = "custom-enum";

/// Device id the custom camera registers under
pub const CUSTOM_DEVICE_ID: &str = "custom";

const DEFAULT_SIZE: FrameSize = FrameSize::new(640, 480);

fn defaults() -> [(&'static str, u32, ParamValue); 5] {
    [
        (CUSTOM_UINT8, 101, ParamValue::Uint8(50)),
        (CUSTOM_UINT32, 102, ParamValue::Uint32(50)),
        (CUSTOM_INT32, 104, ParamValue::Int32(-10)),
        (CUSTOM_REAL32, 105, ParamValue::Real32(0.0)),
        (CUSTOM_ENUM, 106, ParamValue::Uint32(0)),
    ]
}

#[derive(Debug)]
pub struct CustomDevice {
    id: String,
    mode: CameraMode,
    size: FrameSize,
    frames_read: u32,
    initialized: bool,
}

impl CustomDevice {
    pub fn new() -> Self {
        Self {
            id: CUSTOM_DEVICE_ID.to_string(),
            mode: CameraMode::Video,
            size: DEFAULT_SIZE,
            frames_read: 0,
            initialized: false,
        }
    }

    pub fn with_size(mut self, size: FrameSize) -> Self {
        self.size = size;
        self
    }
}

impl Default for CustomDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDevice for CustomDevice {
    fn device_id(&self) -> &str {
        &self.id
    }

    fn info(&self) -> CameraInfo {
        CameraInfo {
            vendor_name: "Custom".to_string(),
            model_name: "Custom-Camera".to_string(),
            firmware_version: 1,
            resolution_h: u16::try_from(self.size.width).unwrap_or(u16::MAX),
            resolution_v: u16::try_from(self.size.height).unwrap_or(u16::MAX),
            flags: u32::MAX,
            cam_definition_version: 1,
            ..Default::default()
        }
    }

    fn init(&mut self, params: &mut CameraParameters) -> Result<(), DeviceError> {
        for (name, id, value) in defaults() {
            params.define(name, id, value.param_type());
        }
        self.initialized = true;
        self.reset_params(params)
    }

    fn uninit(&mut self) -> Result<(), DeviceError> {
        self.initialized = false;
        Ok(())
    }

    fn mode(&self) -> CameraMode {
        self.mode
    }

    fn set_mode(&mut self, mode: CameraMode) -> Result<(), DeviceError> {
        self.mode = mode;
        Ok(())
    }

    fn frame_size(&self) -> FrameSize {
        self.size
    }

    fn formats(&self) -> Vec<PixelFormat> {
        vec![PixelFormat {
            fourcc: "RGB3".to_string(),
            frame_sizes: vec![self.size],
        }]
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<(), DeviceError> {
        if !self.initialized {
            return Err(DeviceError::NotInitialized);
        }
        match defaults().iter().find(|(n, _, _)| *n == name) {
            Some((_, _, default)) if default.param_type() == value.param_type() => {
                debug!(param = name, value = ?value, "custom camera parameter set");
                Ok(())
            }
            Some(_) => Err(DeviceError::InvalidValue(name.to_string())),
            None => Err(DeviceError::Unsupported(name.to_string())),
        }
    }

    fn reset_params(&mut self, params: &mut CameraParameters) -> Result<(), DeviceError> {
        for (name, _, value) in defaults() {
            params
                .set(name, value)
                .map_err(|_| DeviceError::InvalidValue(name.to_string()))?;
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Vec<u8>, DeviceError> {
        if !self.initialized {
            return Err(DeviceError::NotInitialized);
        }

        let FrameSize { width, height } = self.size;
        let shade = (self.frames_read % 256) as u8;
        self.frames_read = self.frames_read.wrapping_add(1);

        let mut frame = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                frame.push((x * 255 / width.max(1)) as u8);
                frame.push((y * 255 / height.max(1)) as u8);
                frame.push(shade);
            }
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::parameters::ParamType;

    #[test]
    fn test_init_registers_defaults() {
        let mut device = CustomDevice::new();
        let mut params = CameraParameters::new();
        device.init(&mut params).unwrap();

        assert_eq!(params.get(CUSTOM_UINT8), Some(&ParamValue::Uint8(50)));
        assert_eq!(params.get(CUSTOM_INT32), Some(&ParamValue::Int32(-10)));
        assert_eq!(params.definition(CUSTOM_ENUM).map(|d| d.id), Some(106));
        assert_eq!(params.param_type(CUSTOM_REAL32), Some(ParamType::Real32));
        assert_eq!(device.mode(), CameraMode::Video);
    }

    #[test]
    fn test_set_param_only_accepts_custom_names() {
        let mut device = CustomDevice::new();
        device.init(&mut CameraParameters::new()).unwrap();

        assert!(device.set_param(CUSTOM_UINT32, &ParamValue::Uint32(7)).is_ok());
        assert!(matches!(
            device.set_param("brightness", &ParamValue::Uint32(7)),
            Err(DeviceError::Unsupported(_))
        ));
        assert!(matches!(
            device.set_param(CUSTOM_UINT32, &ParamValue::Real32(7.0)),
            Err(DeviceError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_frames_need_init_and_have_rgb_size() {
        let mut device = CustomDevice::new().with_size(FrameSize::new(4, 2));
        assert!(matches!(device.read_frame(), Err(DeviceError::NotInitialized)));

        device.init(&mut CameraParameters::new()).unwrap();
        let frame = device.read_frame().unwrap();
        assert_eq!(frame.len(), 4 * 2 * 3);
        assert_eq!(device.info().resolution_h, 4);
    }
}

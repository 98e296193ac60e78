//! Video4Linux2 camera devices

use std::path::Path;

use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::control::Value;
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Control, Device};

use super::device::{device_file_prefix, CameraDevice, DeviceError};
use super::parameters::{self, CameraParameters, ParamType, ParamValue};
use super::{CameraInfo, CameraMode};
use crate::stream::{FrameSize, PixelFormat};

const V4L2_CID_BASE: u32 = 0x0098_0900;
const V4L2_CID_CAMERA_CLASS_BASE: u32 = 0x009a_0900;

const CAPTURE_BUFFERS: u32 = 2;

/// V4L2 control backing a standard parameter
fn control_id(name: &str) -> Option<u32> {
    let id = match name {
        parameters::BRIGHTNESS => V4L2_CID_BASE,
        parameters::CONTRAST => V4L2_CID_BASE + 1,
        parameters::SATURATION => V4L2_CID_BASE + 2,
        parameters::HUE => V4L2_CID_BASE + 3,
        parameters::WHITE_BALANCE_MODE => V4L2_CID_BASE + 12,
        parameters::GAMMA => V4L2_CID_BASE + 16,
        parameters::GAIN => V4L2_CID_BASE + 19,
        parameters::POWER_LINE_FREQ_MODE => V4L2_CID_BASE + 24,
        parameters::WHITE_BALANCE_TEMPERATURE => V4L2_CID_BASE + 26,
        parameters::SHARPNESS => V4L2_CID_BASE + 27,
        parameters::BACKLIGHT_COMPENSATION => V4L2_CID_BASE + 28,
        parameters::EXPOSURE_MODE => V4L2_CID_CAMERA_CLASS_BASE + 1,
        parameters::EXPOSURE_ABSOLUTE => V4L2_CID_CAMERA_CLASS_BASE + 2,
        _ => return None,
    };
    Some(id)
}

const CONTROLLED_PARAMS: [&str; 13] = [
    parameters::BRIGHTNESS,
    parameters::CONTRAST,
    parameters::SATURATION,
    parameters::HUE,
    parameters::WHITE_BALANCE_MODE,
    parameters::GAMMA,
    parameters::GAIN,
    parameters::POWER_LINE_FREQ_MODE,
    parameters::WHITE_BALANCE_TEMPERATURE,
    parameters::SHARPNESS,
    parameters::BACKLIGHT_COMPENSATION,
    parameters::EXPOSURE_MODE,
    parameters::EXPOSURE_ABSOLUTE,
];

/// Control value converted to the parameter's registered type
fn typed_value(ty: ParamType, raw: i64) -> Option<ParamValue> {
    match ty {
        ParamType::Uint32 => u32::try_from(raw).ok().map(ParamValue::Uint32),
        ParamType::Int32 => i32::try_from(raw).ok().map(ParamValue::Int32),
        _ => None,
    }
}

fn io_error(e: std::io::Error) -> DeviceError {
    DeviceError::Io(e)
}

/// A `/dev/videoN` capture device
pub struct V4l2Device {
    path: String,
    device: Option<Device>,
    driver: String,
    card: String,
    mode: CameraMode,
    size: FrameSize,
}

impl V4l2Device {
    /// Opens the node and reads its identity and current format
    pub fn open(path: impl Into<String>) -> Result<Self, DeviceError> {
        let path = path.into();
        let device = Device::with_path(&path).map_err(io_error)?;
        let caps = device.query_caps().map_err(io_error)?;
        let format = device.format().map_err(io_error)?;

        debug!(
            device = %path,
            driver = %caps.driver,
            card = %caps.card,
            width = format.width,
            height = format.height,
            "opened V4L2 device"
        );

        Ok(Self {
            path,
            device: Some(device),
            driver: caps.driver,
            card: caps.card,
            mode: CameraMode::Video,
            size: FrameSize::new(format.width, format.height),
        })
    }

    fn handle(&self) -> Result<&Device, DeviceError> {
        self.device.as_ref().ok_or(DeviceError::NotInitialized)
    }

    fn read_control(&self, id: u32) -> Option<i64> {
        let device = self.device.as_ref()?;
        match device.control(id) {
            Ok(Control {
                value: Value::Integer(v),
                ..
            }) => Some(v),
            Ok(Control {
                value: Value::Boolean(b),
                ..
            }) => Some(i64::from(b)),
            _ => None,
        }
    }
}

impl CameraDevice for V4l2Device {
    fn device_id(&self) -> &str {
        &self.path
    }

    fn info(&self) -> CameraInfo {
        CameraInfo {
            vendor_name: self.driver.clone(),
            model_name: self.card.clone(),
            firmware_version: 1,
            resolution_h: u16::try_from(self.size.width).unwrap_or(u16::MAX),
            resolution_v: u16::try_from(self.size.height).unwrap_or(u16::MAX),
            cam_definition_version: 1,
            ..Default::default()
        }
    }

    fn init(&mut self, params: &mut CameraParameters) -> Result<(), DeviceError> {
        if self.device.is_none() {
            self.device = Some(Device::with_path(&self.path).map_err(io_error)?);
        }

        let mut found = 0;
        for name in CONTROLLED_PARAMS {
            let (Some(id), Some(ty)) = (control_id(name), params.param_type(name)) else {
                continue;
            };
            let Some(value) = self.read_control(id).and_then(|raw| typed_value(ty, raw)) else {
                continue;
            };
            if params.set(name, value).is_ok() {
                found += 1;
            }
        }
        info!(device = %self.path, controls = found, "V4L2 controls mapped");
        Ok(())
    }

    fn uninit(&mut self) -> Result<(), DeviceError> {
        self.device = None;
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
        let Some(device) = self.device.as_ref() else {
            return Vec::new();
        };
        let descriptions = match device.enum_formats() {
            Ok(d) => d,
            Err(e) => {
                warn!(device = %self.path, error = %e, "failed to enumerate formats");
                return Vec::new();
            }
        };

        descriptions
            .into_iter()
            .map(|desc| {
                let mut frame_sizes = Vec::new();
                for size in device.enum_framesizes(desc.fourcc).unwrap_or_default() {
                    match size.size {
                        FrameSizeEnum::Discrete(d) => {
                            frame_sizes.push(FrameSize::new(d.width, d.height));
                        }
                        FrameSizeEnum::Stepwise(s) => {
                            frame_sizes.push(FrameSize::new(s.min_width, s.min_height));
                            frame_sizes.push(FrameSize::new(s.max_width, s.max_height));
                        }
                    }
                }
                PixelFormat {
                    fourcc: desc.fourcc.str().unwrap_or("????").to_string(),
                    frame_sizes,
                }
            })
            .collect()
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<(), DeviceError> {
        let id = control_id(name).ok_or_else(|| DeviceError::Unsupported(name.to_string()))?;
        let raw = value
            .as_i64()
            .ok_or_else(|| DeviceError::InvalidValue(name.to_string()))?;
        self.handle()?
            .set_control(Control {
                id,
                value: Value::Integer(raw),
            })
            .map_err(io_error)?;
        debug!(device = %self.path, param = name, value = raw, "V4L2 control set");
        Ok(())
    }

    fn reset_params(&mut self, params: &mut CameraParameters) -> Result<(), DeviceError> {
        let descriptions = self.handle()?.query_controls().map_err(io_error)?;
        for name in CONTROLLED_PARAMS {
            let (Some(id), Some(ty)) = (control_id(name), params.param_type(name)) else {
                continue;
            };
            let Some(desc) = descriptions.iter().find(|d| d.id == id) else {
                continue;
            };
            let Some(value) = typed_value(ty, desc.default) else {
                continue;
            };
            self.set_param(name, &value)?;
            params
                .set(name, value)
                .map_err(|_| DeviceError::InvalidValue(name.to_string()))?;
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Vec<u8>, DeviceError> {
        let device = self.handle()?;
        let mut stream = MmapStream::with_buffers(device, Type::VideoCapture, CAPTURE_BUFFERS)
            .map_err(io_error)?;
        let (buf, meta) = stream.next().map_err(io_error)?;
        let used = (meta.bytesused as usize).min(buf.len());
        Ok(buf[..used].to_vec())
    }
}

/// Opens every `/dev/video*` node not named in `blacklist`
///
/// Nodes that fail to open (metadata nodes, busy devices) are skipped.
pub fn discover_devices(dev_dir: impl AsRef<Path>, blacklist: &[String]) -> Vec<V4l2Device> {
    let entries = match std::fs::read_dir(dev_dir.as_ref()) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "cannot scan for V4L2 devices");
            return Vec::new();
        }
    };

    let mut paths: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().to_string_lossy().into_owned())
        .filter(|path| device_file_prefix(path).starts_with("video"))
        .collect();
    paths.sort();

    let mut devices = Vec::new();
    for path in paths {
        if blacklist.iter().any(|b| b == device_file_prefix(&path)) {
            info!(device = %path, "skipping blacklisted device");
            continue;
        }
        match V4l2Device::open(path.as_str()) {
            Ok(device) => devices.push(device),
            Err(e) => debug!(device = %path, error = %e, "not a usable capture device"),
        }
    }
    devices
}

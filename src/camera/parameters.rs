//! Camera parameter store backing the extended parameter protocol
//!
//! Every parameter has a registered (id, type) definition. The standard
//! camera parameters are always defined; devices add their own on init.
//! Values are kept in name order, which is also the PARAM_EXT index order.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::protocol::PARAM_VALUE_LEN;

pub const CAMERA_MODE: &str = "camera-mode";
pub const BRIGHTNESS: &str = "brightness";
pub const CONTRAST: &str = "contrast";
pub const SATURATION: &str = "saturation";
pub const HUE: &str = "hue";
pub const WHITE_BALANCE_MODE: &str = "wb-mode";
pub const GAMMA: &str = "gamma";
pub const GAIN: &str = "gain";
pub const POWER_LINE_FREQ_MODE: &str = "power-mode";
pub const WHITE_BALANCE_TEMPERATURE: &str = "wb-temp";
pub const SHARPNESS: &str = "sharpness";
pub const BACKLIGHT_COMPENSATION: &str = "backlight";
pub const EXPOSURE_MODE: &str = "exp-mode";
pub const EXPOSURE_ABSOLUTE: &str = "exp-absolute";
pub const IMAGE_SIZE: &str = "image-size";
pub const IMAGE_FORMAT: &str = "image-format";
pub const PIXEL_FORMAT: &str = "pixel-format";
pub const SCENE_MODE: &str = "scene-mode";
pub const VIDEO_SIZE: &str = "video-size";
pub const VIDEO_FRAME_FORMAT: &str = "video-format";
pub const IMAGE_CAPTURE: &str = "img-capture";
pub const VIDEO_CAPTURE: &str = "vid-capture";
pub const VIDEO_SNAPSHOT: &str = "vid-snapshot";
pub const IMAGE_VIDEOSHOT: &str = "img-videoshot";

/// MAV_PARAM_EXT_TYPE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ParamType {
    Uint8 = 1,
    Int8 = 2,
    Uint16 = 3,
    Int16 = 4,
    Uint32 = 5,
    Int32 = 6,
    Uint64 = 7,
    Int64 = 8,
    Real32 = 9,
    Real64 = 10,
    Custom = 11,
}

impl ParamType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Uint8,
            2 => Self::Int8,
            3 => Self::Uint16,
            4 => Self::Int16,
            5 => Self::Uint32,
            6 => Self::Int32,
            7 => Self::Uint64,
            8 => Self::Int64,
            9 => Self::Real32,
            10 => Self::Real64,
            11 => Self::Custom,
            _ => return None,
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("unknown parameter '{0}'")]
    Unknown(String),

    #[error("parameter '{id}' is {expected:?}, got {actual:?}")]
    TypeMismatch {
        id: String,
        expected: ParamType,
        actual: ParamType,
    },

    #[error("invalid parameter type {0}")]
    InvalidType(u8),

    #[error("value of {0} bytes does not fit a parameter")]
    ValueTooLong(usize),
}

/// A typed parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Uint8(u8),
    Int8(i8),
    Uint16(u16),
    Int16(i16),
    Uint32(u32),
    Int32(i32),
    Uint64(u64),
    Int64(i64),
    Real32(f32),
    Real64(f64),
    Custom(Vec<u8>),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::Uint8(_) => ParamType::Uint8,
            Self::Int8(_) => ParamType::Int8,
            Self::Uint16(_) => ParamType::Uint16,
            Self::Int16(_) => ParamType::Int16,
            Self::Uint32(_) => ParamType::Uint32,
            Self::Int32(_) => ParamType::Int32,
            Self::Uint64(_) => ParamType::Uint64,
            Self::Int64(_) => ParamType::Int64,
            Self::Real32(_) => ParamType::Real32,
            Self::Real64(_) => ParamType::Real64,
            Self::Custom(_) => ParamType::Custom,
        }
    }

    /// Bytes for the 128-byte PARAM_EXT value field (little-endian numerics)
    pub fn to_wire(&self) -> Vec<u8> {
        match self {
            Self::Uint8(v) => v.to_le_bytes().to_vec(),
            Self::Int8(v) => v.to_le_bytes().to_vec(),
            Self::Uint16(v) => v.to_le_bytes().to_vec(),
            Self::Int16(v) => v.to_le_bytes().to_vec(),
            Self::Uint32(v) => v.to_le_bytes().to_vec(),
            Self::Int32(v) => v.to_le_bytes().to_vec(),
            Self::Uint64(v) => v.to_le_bytes().to_vec(),
            Self::Int64(v) => v.to_le_bytes().to_vec(),
            Self::Real32(v) => v.to_le_bytes().to_vec(),
            Self::Real64(v) => v.to_le_bytes().to_vec(),
            Self::Custom(v) => v.clone(),
        }
    }

    /// Decodes the PARAM_EXT value field for a wire type code
    pub fn from_wire(type_code: u8, raw: &[u8]) -> Result<Self, ParamError> {
        let ty = ParamType::from_u8(type_code).ok_or(ParamError::InvalidType(type_code))?;
        if raw.len() > PARAM_VALUE_LEN {
            return Err(ParamError::ValueTooLong(raw.len()));
        }

        let mut field = [0u8; 8];
        let n = raw.len().min(8);
        field[..n].copy_from_slice(&raw[..n]);

        let value = match ty {
            ParamType::Uint8 => Self::Uint8(field[0]),
            ParamType::Int8 => Self::Int8(field[0] as i8),
            ParamType::Uint16 => Self::Uint16(u16::from_le_bytes([field[0], field[1]])),
            ParamType::Int16 => Self::Int16(i16::from_le_bytes([field[0], field[1]])),
            ParamType::Uint32 => Self::Uint32(u32::from_le_bytes([field[0], field[1], field[2], field[3]])),
            ParamType::Int32 => Self::Int32(i32::from_le_bytes([field[0], field[1], field[2], field[3]])),
            ParamType::Uint64 => Self::Uint64(u64::from_le_bytes(field)),
            ParamType::Int64 => Self::Int64(i64::from_le_bytes(field)),
            ParamType::Real32 => Self::Real32(f32::from_le_bytes([field[0], field[1], field[2], field[3]])),
            ParamType::Real64 => Self::Real64(f64::from_le_bytes(field)),
            ParamType::Custom => {
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                Self::Custom(raw[..end].to_vec())
            }
        };
        Ok(value)
    }

    /// Integer view used when programming device controls
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Uint8(v) => Some(v.into()),
            Self::Int8(v) => Some(v.into()),
            Self::Uint16(v) => Some(v.into()),
            Self::Int16(v) => Some(v.into()),
            Self::Uint32(v) => Some(v.into()),
            Self::Int32(v) => Some(v.into()),
            Self::Uint64(v) => i64::try_from(v).ok(),
            Self::Int64(v) => Some(v),
            Self::Real32(_) | Self::Real64(_) | Self::Custom(_) => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_i64().and_then(|v| u32::try_from(v).ok())
    }
}

/// Registered id and type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDef {
    pub id: u32,
    pub ty: ParamType,
}

static STANDARD_PARAMS: Lazy<HashMap<&'static str, ParamDef>> = Lazy::new(|| {
    let table = [
        (CAMERA_MODE, 1, ParamType::Uint32),
        (BRIGHTNESS, 2, ParamType::Uint32),
        (CONTRAST, 3, ParamType::Uint32),
        (SATURATION, 4, ParamType::Uint32),
        (HUE, 5, ParamType::Int32),
        (WHITE_BALANCE_MODE, 6, ParamType::Uint32),
        (GAMMA, 7, ParamType::Uint32),
        (GAIN, 8, ParamType::Uint32),
        (POWER_LINE_FREQ_MODE, 9, ParamType::Uint32),
        (WHITE_BALANCE_TEMPERATURE, 10, ParamType::Uint32),
        (SHARPNESS, 11, ParamType::Uint32),
        (BACKLIGHT_COMPENSATION, 12, ParamType::Uint32),
        (EXPOSURE_MODE, 13, ParamType::Uint32),
        (EXPOSURE_ABSOLUTE, 14, ParamType::Uint32),
        (IMAGE_SIZE, 15, ParamType::Uint32),
        (IMAGE_FORMAT, 16, ParamType::Uint32),
        (PIXEL_FORMAT, 17, ParamType::Uint32),
        (SCENE_MODE, 18, ParamType::Uint32),
        (VIDEO_SIZE, 19, ParamType::Uint32),
        (VIDEO_FRAME_FORMAT, 20, ParamType::Uint32),
        (IMAGE_CAPTURE, 21, ParamType::Uint32),
        (VIDEO_CAPTURE, 22, ParamType::Uint32),
        (VIDEO_SNAPSHOT, 23, ParamType::Uint32),
        (IMAGE_VIDEOSHOT, 24, ParamType::Uint32),
    ];
    table
        .into_iter()
        .map(|(name, id, ty)| (name, ParamDef { id, ty }))
        .collect()
});

/// Per-camera parameter values and definitions
#[derive(Debug, Clone, Default)]
pub struct CameraParameters {
    extra: HashMap<String, ParamDef>,
    values: BTreeMap<String, ParamValue>,
}

impl CameraParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device-specific parameter
    pub fn define(&mut self, name: &str, id: u32, ty: ParamType) {
        self.extra.insert(name.to_string(), ParamDef { id, ty });
    }

    pub fn definition(&self, name: &str) -> Option<ParamDef> {
        STANDARD_PARAMS
            .get(name)
            .or_else(|| self.extra.get(name))
            .copied()
    }

    pub fn param_type(&self, name: &str) -> Option<ParamType> {
        self.definition(name).map(|def| def.ty)
    }

    /// Checks a value against the parameter's registered type
    pub fn check(&self, name: &str, value: &ParamValue) -> Result<ParamDef, ParamError> {
        let def = self
            .definition(name)
            .ok_or_else(|| ParamError::Unknown(name.to_string()))?;
        if def.ty != value.param_type() {
            return Err(ParamError::TypeMismatch {
                id: name.to_string(),
                expected: def.ty,
                actual: value.param_type(),
            });
        }
        Ok(def)
    }

    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        self.check(name, &value)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Parameter at a PARAM_EXT index
    pub fn by_index(&self, index: usize) -> Option<(&str, &ParamValue)> {
        self.values
            .iter()
            .nth(index)
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.values.keys().position(|key| key == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

//! MAVLink camera microservice on top of the `mavlink` crate
//!
//! Message types, enums and the frame format all come from the crate's
//! common dialect. This module adds what a camera component needs around
//! them: component id constants, fixed-size string fields, the command
//! param accessor and a parser that survives frames split over datagrams.

pub mod codec;

pub use codec::{encode, EncodeError, MavlinkParser, ParseError, ParserStats};
pub use mavlink::common::{
    CameraCapFlags, CameraMode as MavCameraMode, MavAutopilot, MavCmd, MavMessage, MavModeFlag, MavParamExtType,
    MavResult, MavState, MavType, ParamAck, StorageStatus, VideoStreamStatusFlags,
    VideoStreamType, CAMERA_CAPTURE_STATUS_DATA, CAMERA_IMAGE_CAPTURED_DATA,
    CAMERA_INFORMATION_DATA, CAMERA_SETTINGS_DATA, COMMAND_ACK_DATA, COMMAND_LONG_DATA,
    HEARTBEAT_DATA, PARAM_EXT_ACK_DATA, PARAM_EXT_REQUEST_LIST_DATA,
    PARAM_EXT_REQUEST_READ_DATA, PARAM_EXT_SET_DATA, PARAM_EXT_VALUE_DATA,
    SET_VIDEO_STREAM_SETTINGS_DATA, STORAGE_INFORMATION_DATA, VIDEO_STREAM_INFORMATION_DATA,
};
pub use mavlink::{MavHeader, Message};

use crate::camera::{CameraMode, ParamType};

/// Conventional ground-station UDP port
pub const MAVLINK_UDP_PORT: u16 = 14550;

/// MAV_COMP_ID_CAMERA, first of the six camera component ids
pub const MAV_COMP_ID_CAMERA: u8 = 100;

/// Number of consecutive camera component ids (MAV_COMP_ID_CAMERA..=MAV_COMP_ID_CAMERA6)
pub const CAMERA_COMPONENT_SLOTS: u8 = 6;

/// Protocol version advertised in HEARTBEAT.mavlink_version
pub const MAVLINK_VERSION: u8 = 3;

/// Size of the PARAM_EXT id field
pub const PARAM_ID_LEN: usize = 16;

/// Size of the PARAM_EXT value field
pub const PARAM_VALUE_LEN: usize = 128;

/// 1-based COMMAND_LONG parameter, 0.0 outside param1..=param7
pub fn command_param(cmd: &COMMAND_LONG_DATA, n: usize) -> f32 {
    match n {
        1 => cmd.param1,
        2 => cmd.param2,
        3 => cmd.param3,
        4 => cmd.param4,
        5 => cmd.param5,
        6 => cmd.param6,
        7 => cmd.param7,
        _ => 0.0,
    }
}

pub fn mav_result(success: bool) -> MavResult {
    if success {
        MavResult::MAV_RESULT_ACCEPTED
    } else {
        MavResult::MAV_RESULT_FAILED
    }
}

/// Copies `data` into a zero-padded char field, clipping at `N` bytes
pub fn to_char_array<const N: usize>(data: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let n = data.len().min(N);
    out[..n].copy_from_slice(&data[..n]);
    out
}

/// Text of a char field up to its first NUL
pub fn from_char_array(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl From<ParamType> for MavParamExtType {
    fn from(ty: ParamType) -> Self {
        match ty {
            ParamType::Uint8 => Self::MAV_PARAM_EXT_TYPE_UINT8,
            ParamType::Int8 => Self::MAV_PARAM_EXT_TYPE_INT8,
            ParamType::Uint16 => Self::MAV_PARAM_EXT_TYPE_UINT16,
            ParamType::Int16 => Self::MAV_PARAM_EXT_TYPE_INT16,
            ParamType::Uint32 => Self::MAV_PARAM_EXT_TYPE_UINT32,
            ParamType::Int32 => Self::MAV_PARAM_EXT_TYPE_INT32,
            ParamType::Uint64 => Self::MAV_PARAM_EXT_TYPE_UINT64,
            ParamType::Int64 => Self::MAV_PARAM_EXT_TYPE_INT64,
            ParamType::Real32 => Self::MAV_PARAM_EXT_TYPE_REAL32,
            ParamType::Real64 => Self::MAV_PARAM_EXT_TYPE_REAL64,
            ParamType::Custom => Self::MAV_PARAM_EXT_TYPE_CUSTOM,
        }
    }
}

impl From<CameraMode> for MavCameraMode {
    fn from(mode: CameraMode) -> Self {
        match mode {
            CameraMode::Still => Self::CAMERA_MODE_IMAGE,
            CameraMode::Video => Self::CAMERA_MODE_VIDEO,
        }
    }
}

/// STORAGE_STATUS for a raw status code; unknown codes read as not supported
pub fn storage_status(code: u8) -> StorageStatus {
    match code {
        0 => StorageStatus::STORAGE_STATUS_EMPTY,
        1 => StorageStatus::STORAGE_STATUS_UNFORMATTED,
        2 => StorageStatus::STORAGE_STATUS_READY,
        _ => StorageStatus::STORAGE_STATUS_NOT_SUPPORTED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_param_is_one_based() {
        let cmd = COMMAND_LONG_DATA {
            param1: 1.0,
            param7: 7.0,
            ..Default::default()
        };
        assert_eq!(command_param(&cmd, 1), 1.0);
        assert_eq!(command_param(&cmd, 7), 7.0);
        assert_eq!(command_param(&cmd, 0), 0.0);
        assert_eq!(command_param(&cmd, 8), 0.0);
    }

    #[test]
    fn test_char_array_clips_and_pads() {
        let id: [u8; PARAM_ID_LEN] = to_char_array(b"a-parameter-name-longer-than-16");
        assert_eq!(from_char_array(&id), "a-parameter-name");

        let short: [u8; 8] = to_char_array(b"gain");
        assert_eq!(&short[4..], &[0, 0, 0, 0]);
        assert_eq!(from_char_array(&short), "gain");
    }

    #[test]
    fn test_param_type_codes_line_up() {
        for ty in [ParamType::Uint8, ParamType::Int32, ParamType::Real32, ParamType::Custom] {
            assert_eq!(MavParamExtType::from(ty) as u8, ty as u8);
        }
    }

    #[test]
    fn test_result_from_success() {
        assert_eq!(mav_result(true), MavResult::MAV_RESULT_ACCEPTED);
        assert_eq!(mav_result(false) as u8, 4);
    }
}

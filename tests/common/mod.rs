//! Shared fixtures for the protocol tests
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use camera_streaming_daemon::camera::{
    CameraComponent, CameraInfo, CameraMode, CameraParameters, ComponentError, CustomDevice,
    DeviceCameraComponent, ImageCaptureStatus, ParamType, ParamValue, StorageInfo,
    VideoCaptureStatus,
};
use camera_streaming_daemon::capture::CaptureCallback;
use camera_streaming_daemon::protocol::{
    encode, MavCmd, MavHeader, MavMessage, MavlinkParser, COMMAND_LONG_DATA,
};
use camera_streaming_daemon::server::{
    ComponentRegistry, Dispatcher, RecordingTransport, ServerEvent, SystemId,
};
use camera_streaming_daemon::stream::FrameSize;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver};

pub const GCS_SYSTEM: u8 = 255;
pub const GCS_COMPONENT: u8 = 190;

pub fn gcs_addr() -> SocketAddr {
    "192.168.1.10:14550".parse().unwrap()
}

/// Camera component that records what was asked of it
#[derive(Clone, Default)]
pub struct MockCamera {
    pub device_id: String,
    pub calls: Arc<Mutex<Vec<&'static str>>>,
    pub callback: Arc<Mutex<Option<CaptureCallback>>>,
    pub fail: bool,
    info: CameraInfo,
    storage: StorageInfo,
    params: CameraParameters,
}

impl MockCamera {
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            info: CameraInfo {
                vendor_name: "Mock".to_string(),
                model_name: device_id.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn failing(device_id: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(device_id)
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn record(&self, call: &'static str) -> Result<(), ComponentError> {
        self.calls.lock().push(call);
        if self.fail {
            return Err(ComponentError::InvalidMode(u32::MAX));
        }
        Ok(())
    }
}

impl CameraComponent for MockCamera {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn camera_info(&self) -> &CameraInfo {
        self.calls.lock().push("camera_info");
        &self.info
    }

    fn storage_info(&self) -> &StorageInfo {
        self.calls.lock().push("storage_info");
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

    fn set_param(&mut self, _name: &str, _value: ParamValue) -> Result<(), ComponentError> {
        self.record("set_param")
    }

    fn camera_mode(&self) -> CameraMode {
        CameraMode::Still
    }

    fn set_camera_mode(&mut self, _mode: CameraMode) -> Result<(), ComponentError> {
        self.record("set_camera_mode")
    }

    fn start_image_capture(
        &mut self,
        _interval: f32,
        _count: u32,
        callback: CaptureCallback,
    ) -> Result<(), ComponentError> {
        self.record("start_image_capture")?;
        *self.callback.lock() = Some(callback);
        Ok(())
    }

    fn stop_image_capture(&mut self) -> Result<(), ComponentError> {
        self.record("stop_image_capture")
    }

    fn start_video_capture(&mut self, _status_frequency: f32) -> Result<(), ComponentError> {
        self.record("start_video_capture")
    }

    fn stop_video_capture(&mut self) -> Result<(), ComponentError> {
        self.record("stop_video_capture")
    }

    fn image_capture_status(&self) -> ImageCaptureStatus {
        ImageCaptureStatus::default()
    }

    fn video_capture_status(&self) -> VideoCaptureStatus {
        VideoCaptureStatus::default()
    }

    fn reset_camera_settings(&mut self) -> Result<(), ComponentError> {
        self.record("reset_camera_settings")
    }

    fn frame_size(&self) -> FrameSize {
        FrameSize::new(640, 480)
    }
}

/// Custom camera writing its captures into `dir`
pub fn custom_camera(dir: &tempfile::TempDir) -> DeviceCameraComponent {
    DeviceCameraComponent::with_raw_capture(CustomDevice::new(), dir.path(), dir.path(), 25)
        .unwrap()
}

/// A dispatcher wired to a recording transport
pub struct Harness {
    pub dispatcher: Dispatcher,
    pub transport: Arc<RecordingTransport>,
    pub events: UnboundedReceiver<ServerEvent>,
    parser: MavlinkParser,
    sequence: u8,
}

impl Harness {
    pub fn new(registry: ComponentRegistry, system_id: SystemId) -> Self {
        let transport = Arc::new(RecordingTransport::new());
        let (tx, events) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(registry, system_id, transport.clone(), tx);
        Self {
            dispatcher,
            transport,
            events,
            parser: MavlinkParser::new(),
            sequence: 0,
        }
    }

    /// Sends `msg` as if from the ground station
    pub fn deliver(&mut self, msg: &MavMessage) {
        self.deliver_from(msg, GCS_SYSTEM, GCS_COMPONENT);
    }

    pub fn deliver_from(&mut self, msg: &MavMessage, system_id: u8, component_id: u8) {
        let header = MavHeader {
            system_id,
            component_id,
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);
        let frame = encode(header, msg).unwrap();
        self.dispatcher.handle_datagram(&frame, gcs_addr());
    }

    /// Everything sent since the last call, decoded, with its header
    pub fn replies(&mut self) -> Vec<(MavHeader, MavMessage)> {
        let sent = self.transport.take();
        let mut out = Vec::new();
        for (_, bytes) in sent {
            for result in self.parser.parse(&bytes) {
                out.push(result.unwrap());
            }
        }
        out
    }

    pub fn messages(&mut self) -> Vec<MavMessage> {
        self.replies().into_iter().map(|(_, msg)| msg).collect()
    }
}

pub fn command(cmd: MavCmd, target_system: u8, target_component: u8, params: [f32; 7]) -> MavMessage {
    let [param1, param2, param3, param4, param5, param6, param7] = params;
    MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
        param1,
        param2,
        param3,
        param4,
        param5,
        param6,
        param7,
        command: cmd,
        target_system,
        target_component,
        confirmation: 0,
    })
}

/// Params with `param[n]` (1-based) set to `value`
pub fn with_param(n: usize, value: f32) -> [f32; 7] {
    let mut params = [0.0; 7];
    params[n - 1] = value;
    params
}

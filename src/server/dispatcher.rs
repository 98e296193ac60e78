//! Protocol dispatcher: addressing, command routing and replies
//!
//! Everything here runs on the server loop. Capture workers never touch
//! the dispatcher directly; they post [`ServerEvent`]s which the loop feeds
//! back through [`Dispatcher::handle_event`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::heartbeat::HeartbeatEmitter;
use super::registry::ComponentRegistry;
use super::stats::ServerStats;
use super::transport::{Outbox, Transport};
use crate::camera::{
    CameraMode, CaptureStatus, ComponentError, ParamError, ParamValue, VideoStatus,
};
use crate::capture::CaptureCallback;
use crate::protocol::{
    command_param, from_char_array, storage_status, to_char_array, CameraCapFlags,
    MavAutopilot, MavCameraMode, MavCmd, MavHeader, MavMessage, MavParamExtType, MavlinkParser,
    Message, ParamAck, ParseError, ParserStats, VideoStreamStatusFlags, VideoStreamType,
    CAMERA_CAPTURE_STATUS_DATA, CAMERA_IMAGE_CAPTURED_DATA, CAMERA_INFORMATION_DATA,
    CAMERA_SETTINGS_DATA, COMMAND_LONG_DATA, HEARTBEAT_DATA, PARAM_EXT_ACK_DATA,
    PARAM_EXT_REQUEST_LIST_DATA, PARAM_EXT_REQUEST_READ_DATA, PARAM_EXT_SET_DATA,
    PARAM_EXT_VALUE_DATA, SET_VIDEO_STREAM_SETTINGS_DATA, STORAGE_INFORMATION_DATA,
    VIDEO_STREAM_INFORMATION_DATA, PARAM_VALUE_LEN,
};
use crate::stream::{size_query, FrameSize, RtspUriResolver, Stream, UriResolver};

/// System id used until one is configured or learned
pub const DEFAULT_SYSTEM_ID: u8 = 1;

/// Highest CAMERA_CAPTURE_STATUS rate a video capture may ask for, in Hz
pub const MAX_STATUS_FREQUENCY: f32 = 10.0;

/// The system id this daemon answers as
///
/// Either fixed up front or learned once from the first autopilot
/// heartbeat. Once confirmed it never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemId {
    value: u8,
    confirmed: bool,
}

impl SystemId {
    pub fn fixed(value: u8) -> Self {
        Self {
            value,
            confirmed: true,
        }
    }

    /// Starts at [`DEFAULT_SYSTEM_ID`] and waits for an autopilot heartbeat
    pub fn discover() -> Self {
        Self {
            value: DEFAULT_SYSTEM_ID,
            confirmed: false,
        }
    }

    pub fn get(&self) -> u8 {
        self.value
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn is_valid(&self) -> bool {
        (1..=254).contains(&self.value)
    }

    /// Latches `sender` if unconfirmed and the heartbeat comes from an
    /// autopilot. Returns whether the id was learned.
    pub fn learn(&mut self, heartbeat: &HEARTBEAT_DATA, sender: u8) -> bool {
        if self.confirmed
            || heartbeat.autopilot == MavAutopilot::MAV_AUTOPILOT_INVALID
            || !(1..=254).contains(&sender)
        {
            return false;
        }
        self.value = sender;
        self.confirmed = true;
        true
    }
}

/// Who asked for a capture and where its notifications go
///
/// Moved into the capture callback; it lives exactly as long as the
/// capture that owns the callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingCaptureRequest {
    pub component_id: u8,
    pub requester: MavHeader,
    pub reply_to: SocketAddr,
}

/// Work posted back to the server loop from outside it
#[derive(Debug)]
pub enum ServerEvent {
    ImageCaptured {
        request: PendingCaptureRequest,
        success: bool,
        sequence: u32,
    },
    CaptureStatusTick {
        request: PendingCaptureRequest,
    },
}

struct CommandContext {
    component_id: u8,
    requester: MavHeader,
    from: SocketAddr,
    command: COMMAND_LONG_DATA,
}

impl CommandContext {
    fn param(&self, n: usize) -> f32 {
        command_param(&self.command, n)
    }
}

enum Reply {
    Ack(bool),
    NoAck,
}

type CommandHandler = fn(&mut Dispatcher, &CommandContext) -> Reply;

struct CommandEntry {
    /// 1-based param that must be set for the handler to run
    flag_param: Option<usize>,
    handler: CommandHandler,
}

fn command_entry(cmd: MavCmd) -> Option<CommandEntry> {
    let (flag_param, handler): (Option<usize>, CommandHandler) = match cmd {
        MavCmd::MAV_CMD_REQUEST_CAMERA_INFORMATION => (Some(1), Dispatcher::camera_information),
        MavCmd::MAV_CMD_REQUEST_CAMERA_SETTINGS => (Some(1), Dispatcher::camera_settings),
        MavCmd::MAV_CMD_REQUEST_STORAGE_INFORMATION => (Some(2), Dispatcher::storage_information),
        MavCmd::MAV_CMD_REQUEST_CAMERA_CAPTURE_STATUS => (Some(1), Dispatcher::capture_status),
        MavCmd::MAV_CMD_RESET_CAMERA_SETTINGS => (Some(1), Dispatcher::reset_camera_settings),
        MavCmd::MAV_CMD_SET_CAMERA_MODE => (None, Dispatcher::set_camera_mode),
        MavCmd::MAV_CMD_IMAGE_START_CAPTURE => (None, Dispatcher::image_start_capture),
        MavCmd::MAV_CMD_IMAGE_STOP_CAPTURE => (None, Dispatcher::image_stop_capture),
        MavCmd::MAV_CMD_VIDEO_START_CAPTURE => (None, Dispatcher::video_start_capture),
        MavCmd::MAV_CMD_VIDEO_STOP_CAPTURE => (None, Dispatcher::video_stop_capture),
        MavCmd::MAV_CMD_REQUEST_VIDEO_STREAM_INFORMATION => {
            (None, Dispatcher::video_stream_information)
        }
        _ => return None,
    };
    Some(CommandEntry {
        flag_param,
        handler,
    })
}

/// A flag param counts as set only above machine epsilon
pub fn flag_set(value: f32) -> bool {
    value > f32::EPSILON
}

/// Status rate of VIDEO_START_CAPTURE: 0 for none, else up to [`MAX_STATUS_FREQUENCY`]
pub fn status_frequency_valid(frequency: f32) -> bool {
    frequency.is_finite() && (0.0..=MAX_STATUS_FREQUENCY).contains(&frequency)
}

fn param_value_message(name: &str, value: &ParamValue, index: usize, count: usize) -> MavMessage {
    MavMessage::PARAM_EXT_VALUE(PARAM_EXT_VALUE_DATA {
        param_count: u16::try_from(count).unwrap_or(u16::MAX),
        param_index: u16::try_from(index).unwrap_or(u16::MAX),
        param_id: to_char_array(name.as_bytes()),
        param_value: to_char_array(&value.to_wire()),
        param_type: value.param_type().into(),
    })
}

pub struct Dispatcher {
    registry: ComponentRegistry,
    streams: Vec<Stream>,
    system_id: SystemId,
    parser: MavlinkParser,
    outbox: Outbox,
    resolver: Box<dyn UriResolver>,
    stream_addr: String,
    events: UnboundedSender<ServerEvent>,
    status_tickers: HashMap<u8, JoinHandle<()>>,
    stats: Arc<ServerStats>,
}

impl Dispatcher {
    pub fn new(
        registry: ComponentRegistry,
        system_id: SystemId,
        transport: Arc<dyn Transport>,
        events: UnboundedSender<ServerEvent>,
    ) -> Self {
        let stats = Arc::new(ServerStats::default());
        Self {
            registry,
            streams: Vec::new(),
            system_id,
            parser: MavlinkParser::new(),
            outbox: Outbox::new(transport, stats.clone()),
            resolver: Box::new(RtspUriResolver::default()),
            stream_addr: "127.0.0.1".to_string(),
            events,
            status_tickers: HashMap::new(),
            stats,
        }
    }

    /// Streams reported by REQUEST_VIDEO_STREAM_INFORMATION, ids 1-based
    pub fn with_streams(mut self, streams: Vec<Stream>) -> Self {
        self.streams = streams;
        self
    }

    /// How stream URIs are built and which host they point at
    pub fn with_uri_resolver(
        mut self,
        resolver: Box<dyn UriResolver>,
        stream_addr: impl Into<String>,
    ) -> Self {
        self.resolver = resolver;
        self.stream_addr = stream_addr.into();
        self
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn system_id(&self) -> SystemId {
        self.system_id
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        self.stats.clone()
    }

    pub fn parser_stats(&self) -> &ParserStats {
        self.parser.stats()
    }

    /// Runs one heartbeat cycle
    pub fn emit_heartbeat(&mut self, emitter: &HeartbeatEmitter) -> usize {
        emitter.emit(&self.registry, &self.system_id, &mut self.outbox)
    }

    /// Whether a message addressed to (`target_system`, `target_component`) is ours
    pub fn is_addressed(&self, target_system: u8, target_component: u8) -> bool {
        target_system == self.system_id.get()
            && self.registry.is_camera_id(target_component)
            && self.registry.contains(target_component)
    }

    fn drop_unaddressed(&self, kind: &'static str, target_system: u8, target_component: u8) -> bool {
        if self.is_addressed(target_system, target_component) {
            return false;
        }
        debug!(
            kind,
            target_system,
            target_component,
            system_id = self.system_id.get(),
            "message not addressed to us, dropped"
        );
        self.stats.messages_dropped.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn send(&mut self, msg: &MavMessage, component_id: u8, target: SocketAddr) -> bool {
        self.outbox.send(msg, self.system_id.get(), component_id, target)
    }

    /// Feeds a datagram through the parser, dispatching each frame as it completes
    pub fn handle_datagram(&mut self, data: &[u8], from: SocketAddr) {
        for result in self.parser.parse(data) {
            match result {
                Ok((header, msg)) => {
                    self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
                    self.handle_message(msg, header, from);
                }
                Err(ParseError::UnknownMessage(id)) => {
                    trace!(%from, msg_id = id, "unknown message dropped");
                    self.stats.unknown_messages.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    debug!(%from, error = %e, "malformed frame dropped");
                    self.stats.parse_errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    pub fn handle_message(&mut self, msg: MavMessage, header: MavHeader, from: SocketAddr) {
        trace!(
            sysid = header.system_id,
            compid = header.component_id,
            msg_id = msg.message_id(),
            "message received"
        );

        match msg {
            MavMessage::HEARTBEAT(hb) => {
                if self.system_id.learn(&hb, header.system_id) {
                    info!(system_id = header.system_id, "system id learned from autopilot heartbeat");
                }
            }
            MavMessage::COMMAND_LONG(cmd) => self.handle_command(cmd, header, from),
            MavMessage::SET_VIDEO_STREAM_SETTINGS(settings) => self.handle_stream_settings(settings),
            MavMessage::PARAM_EXT_REQUEST_READ(req) => self.handle_param_read(req, from),
            MavMessage::PARAM_EXT_REQUEST_LIST(req) => self.handle_param_list(req, from),
            MavMessage::PARAM_EXT_SET(req) => self.handle_param_set(req, from),
            other => trace!(msg = other.message_name(), "message ignored"),
        }
    }

    fn handle_command(&mut self, cmd: COMMAND_LONG_DATA, header: MavHeader, from: SocketAddr) {
        if self.drop_unaddressed("command", cmd.target_system, cmd.target_component) {
            return;
        }
        let code = cmd.command;
        let Some(entry) = command_entry(code) else {
            warn!(command = ?code, "unhandled command dropped");
            self.stats.unknown_messages.fetch_add(1, Ordering::Relaxed);
            return;
        };
        self.stats.commands_handled.fetch_add(1, Ordering::Relaxed);

        let ctx = CommandContext {
            component_id: cmd.target_component,
            requester: header,
            from,
            command: cmd,
        };

        let reply = match entry.flag_param {
            Some(n) if !flag_set(ctx.param(n)) => {
                debug!(command = ?code, "no action requested");
                Reply::Ack(true)
            }
            _ => (entry.handler)(self, &ctx),
        };

        if let Reply::Ack(success) = reply {
            self.outbox.send_ack(
                self.system_id.get(),
                ctx.component_id,
                &ctx.requester,
                ctx.from,
                ctx.command.command,
                success,
            );
        }
    }

    fn camera_information(&mut self, ctx: &CommandContext) -> Reply {
        let Some(comp) = self.registry.get(ctx.component_id) else {
            return Reply::Ack(false);
        };
        let info = comp.camera_info();
        let msg = MavMessage::CAMERA_INFORMATION(CAMERA_INFORMATION_DATA {
            time_boot_ms: self.outbox.time_boot_ms(),
            firmware_version: info.firmware_version,
            focal_length: info.focal_length,
            sensor_size_h: info.sensor_size_h,
            sensor_size_v: info.sensor_size_v,
            flags: CameraCapFlags::from_bits_truncate(info.flags),
            resolution_h: info.resolution_h,
            resolution_v: info.resolution_v,
            cam_definition_version: info.cam_definition_version,
            vendor_name: to_char_array(info.vendor_name.as_bytes()),
            model_name: to_char_array(info.model_name.as_bytes()),
            lens_id: info.lens_id,
            cam_definition_uri: to_char_array(info.cam_definition_uri.as_bytes()),
            ..Default::default()
        });
        self.send(&msg, ctx.component_id, ctx.from);
        Reply::Ack(true)
    }

    fn camera_settings(&mut self, ctx: &CommandContext) -> Reply {
        let Some(comp) = self.registry.get(ctx.component_id) else {
            return Reply::Ack(false);
        };
        let msg = MavMessage::CAMERA_SETTINGS(CAMERA_SETTINGS_DATA {
            time_boot_ms: self.outbox.time_boot_ms(),
            mode_id: MavCameraMode::from(comp.camera_mode()),
            ..Default::default()
        });
        self.send(&msg, ctx.component_id, ctx.from);
        Reply::Ack(true)
    }

    fn storage_information(&mut self, ctx: &CommandContext) -> Reply {
        let Some(comp) = self.registry.get(ctx.component_id) else {
            return Reply::Ack(false);
        };
        let storage = comp.storage_info();
        let msg = MavMessage::STORAGE_INFORMATION(STORAGE_INFORMATION_DATA {
            time_boot_ms: self.outbox.time_boot_ms(),
            total_capacity: storage.total_capacity,
            used_capacity: storage.used_capacity,
            available_capacity: storage.available_capacity,
            read_speed: storage.read_speed,
            write_speed: storage.write_speed,
            storage_id: storage.storage_id,
            storage_count: storage.storage_count,
            status: storage_status(storage.status),
            ..Default::default()
        });
        self.send(&msg, ctx.component_id, ctx.from);
        Reply::Ack(true)
    }

    fn capture_status_message(&self, component_id: u8) -> Option<MavMessage> {
        let comp = self.registry.get(component_id)?;
        let status = CaptureStatus::derive(&comp.image_capture_status(), &comp.video_capture_status());
        Some(MavMessage::CAMERA_CAPTURE_STATUS(CAMERA_CAPTURE_STATUS_DATA {
            time_boot_ms: self.outbox.time_boot_ms(),
            image_interval: status.interval,
            recording_time_ms: status.recording_time_ms,
            available_capacity: comp.storage_info().available_capacity,
            image_status: status.image as u8,
            video_status: status.video as u8,
            ..Default::default()
        }))
    }

    fn capture_status(&mut self, ctx: &CommandContext) -> Reply {
        let Some(msg) = self.capture_status_message(ctx.component_id) else {
            return Reply::Ack(false);
        };
        self.send(&msg, ctx.component_id, ctx.from);
        Reply::Ack(true)
    }

    fn reset_camera_settings(&mut self, ctx: &CommandContext) -> Reply {
        let Some(comp) = self.registry.get_mut(ctx.component_id) else {
            return Reply::Ack(false);
        };
        match comp.reset_camera_settings() {
            Ok(()) => Reply::Ack(true),
            Err(e) => {
                warn!(component = ctx.component_id, error = %e, "camera reset failed");
                Reply::Ack(false)
            }
        }
    }

    fn set_camera_mode(&mut self, ctx: &CommandContext) -> Reply {
        let raw = ctx.param(2);
        let mode = if raw >= 0.0 && raw.fract() == 0.0 {
            CameraMode::from_u32(raw as u32)
        } else {
            None
        };
        let Some(mode) = mode else {
            warn!(component = ctx.component_id, mode = raw, "unknown camera mode");
            return Reply::Ack(false);
        };
        let Some(comp) = self.registry.get_mut(ctx.component_id) else {
            return Reply::Ack(false);
        };
        match comp.set_camera_mode(mode) {
            Ok(()) => Reply::Ack(true),
            Err(e) => {
                warn!(component = ctx.component_id, error = %e, "camera mode change failed");
                Reply::Ack(false)
            }
        }
    }

    fn image_start_capture(&mut self, ctx: &CommandContext) -> Reply {
        let interval = ctx.param(2);
        let count = ctx.param(3).max(0.0) as u32;
        let request = PendingCaptureRequest {
            component_id: ctx.component_id,
            requester: ctx.requester,
            reply_to: ctx.from,
        };
        let events = self.events.clone();
        let callback: CaptureCallback = Box::new(move |result, sequence| {
            if let Err(e) = &result {
                debug!(component = request.component_id, sequence, error = %e, "shot failed");
            }
            let event = ServerEvent::ImageCaptured {
                request,
                success: result.is_ok(),
                sequence,
            };
            if events.send(event).is_err() {
                trace!("server gone, capture notification dropped");
            }
        });

        let Some(comp) = self.registry.get_mut(ctx.component_id) else {
            return Reply::Ack(false);
        };
        match comp.start_image_capture(interval, count, callback) {
            Ok(()) => {
                info!(component = ctx.component_id, interval, count, "image capture accepted");
                Reply::Ack(true)
            }
            Err(e) => {
                warn!(component = ctx.component_id, error = %e, "image capture rejected");
                Reply::Ack(false)
            }
        }
    }

    fn image_stop_capture(&mut self, ctx: &CommandContext) -> Reply {
        let Some(comp) = self.registry.get_mut(ctx.component_id) else {
            return Reply::Ack(false);
        };
        match comp.stop_image_capture() {
            Ok(()) => Reply::Ack(true),
            Err(e) => {
                warn!(component = ctx.component_id, error = %e, "image capture stop failed");
                Reply::Ack(false)
            }
        }
    }

    fn video_start_capture(&mut self, ctx: &CommandContext) -> Reply {
        let frequency = ctx.param(2);
        if !status_frequency_valid(frequency) {
            warn!(
                component = ctx.component_id,
                frequency,
                max = MAX_STATUS_FREQUENCY,
                "capture status frequency out of range"
            );
            return Reply::Ack(false);
        }
        let Some(comp) = self.registry.get_mut(ctx.component_id) else {
            return Reply::Ack(false);
        };
        if let Err(e) = comp.start_video_capture(frequency) {
            warn!(component = ctx.component_id, error = %e, "video capture start failed");
            return Reply::Ack(false);
        }

        if frequency > 0.0 {
            let request = PendingCaptureRequest {
                component_id: ctx.component_id,
                requester: ctx.requester,
                reply_to: ctx.from,
            };
            self.start_status_ticker(request, frequency);
        }
        Reply::Ack(true)
    }

    fn start_status_ticker(&mut self, request: PendingCaptureRequest, frequency: f32) {
        self.stop_status_ticker(request.component_id);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(component = request.component_id, "no runtime, capture status not reported");
            return;
        };
        let period = match Duration::try_from_secs_f32(1.0 / frequency) {
            Ok(period) if !period.is_zero() => period,
            _ => {
                warn!(component = request.component_id, frequency, "bad status frequency");
                return;
            }
        };

        let events = self.events.clone();
        let ticker = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if events.send(ServerEvent::CaptureStatusTick { request }).is_err() {
                    break;
                }
            }
        });
        self.status_tickers.insert(request.component_id, ticker);
    }

    fn stop_status_ticker(&mut self, component_id: u8) {
        if let Some(ticker) = self.status_tickers.remove(&component_id) {
            ticker.abort();
        }
    }

    fn video_stop_capture(&mut self, ctx: &CommandContext) -> Reply {
        self.stop_status_ticker(ctx.component_id);
        let Some(comp) = self.registry.get_mut(ctx.component_id) else {
            return Reply::Ack(false);
        };
        match comp.stop_video_capture() {
            Ok(()) => Reply::Ack(true),
            Err(e) => {
                warn!(component = ctx.component_id, error = %e, "video capture stop failed");
                Reply::Ack(false)
            }
        }
    }

    fn video_stream_information(&mut self, ctx: &CommandContext) -> Reply {
        let wanted = ctx.param(1).max(0.0) as usize;
        let count = u8::try_from(self.streams.len()).unwrap_or(u8::MAX);

        let mut replies = Vec::new();
        for (i, stream) in self.streams.iter().enumerate() {
            let stream_id = i + 1;
            if wanted != 0 && wanted != stream_id {
                continue;
            }

            let (running, size) = match self.registry.find_by_device(stream.device_id()) {
                Some((_, comp)) => (
                    comp.video_capture_status().video_status() == VideoStatus::Capturing,
                    stream.reported_frame_size(comp.frame_size()),
                ),
                None => (false, stream.selected_frame_size()),
            };
            let query = size.map(size_query).unwrap_or_default();
            let uri = self.resolver.resolve(&self.stream_addr, stream, &query);
            let FrameSize { width, height } = size.unwrap_or_default();

            replies.push(MavMessage::VIDEO_STREAM_INFORMATION(VIDEO_STREAM_INFORMATION_DATA {
                framerate: stream.framerate(),
                bitrate: 0,
                flags: if running {
                    VideoStreamStatusFlags::VIDEO_STREAM_STATUS_FLAGS_RUNNING
                } else {
                    VideoStreamStatusFlags::empty()
                },
                resolution_h: u16::try_from(width).unwrap_or(u16::MAX),
                resolution_v: u16::try_from(height).unwrap_or(u16::MAX),
                rotation: 0,
                hfov: 0,
                stream_id: u8::try_from(stream_id).unwrap_or(u8::MAX),
                count,
                mavtype: VideoStreamType::VIDEO_STREAM_TYPE_RTSP,
                name: to_char_array(stream.name().as_bytes()),
                uri: to_char_array(uri.as_bytes()),
                ..Default::default()
            }));
        }

        if replies.is_empty() {
            debug!(stream_id = wanted, "no matching stream");
        }
        for msg in &replies {
            self.send(msg, ctx.component_id, ctx.from);
        }
        Reply::NoAck
    }

    fn handle_stream_settings(&mut self, settings: SET_VIDEO_STREAM_SETTINGS_DATA) {
        if self.drop_unaddressed(
            "set-video-stream-settings",
            settings.target_system,
            settings.target_component,
        ) {
            return;
        }

        let wanted = settings.camera_id as usize;
        let (width, height) = (u32::from(settings.resolution_h), u32::from(settings.resolution_v));
        for (i, stream) in self.streams.iter_mut().enumerate() {
            if wanted != 0 && wanted != i + 1 {
                continue;
            }
            let chosen = stream.select_frame_size(width, height);
            info!(stream = stream.name(), width, height, chosen = ?chosen, "stream frame size selected");
        }
    }

    fn handle_param_read(&mut self, req: PARAM_EXT_REQUEST_READ_DATA, from: SocketAddr) {
        if self.drop_unaddressed("param-ext-request-read", req.target_system, req.target_component) {
            return;
        }
        let Some(comp) = self.registry.get(req.target_component) else {
            return;
        };

        let param_id = from_char_array(&req.param_id);
        let params = comp.params();
        let found = if param_id.is_empty() {
            usize::try_from(req.param_index)
                .ok()
                .and_then(|i| params.by_index(i).map(|(name, value)| (i, name, value)))
        } else {
            params
                .index_of(&param_id)
                .zip(params.get(&param_id))
                .map(|(i, value)| (i, param_id.as_str(), value))
        };
        let Some((index, name, value)) = found else {
            debug!(param = %param_id, index = req.param_index, "unknown parameter requested");
            return;
        };

        let msg = param_value_message(name, value, index, params.len());
        self.outbox
            .send(&msg, self.system_id.get(), req.target_component, from);
    }

    fn handle_param_list(&mut self, req: PARAM_EXT_REQUEST_LIST_DATA, from: SocketAddr) {
        if self.drop_unaddressed("param-ext-request-list", req.target_system, req.target_component) {
            return;
        }
        let Some(comp) = self.registry.get(req.target_component) else {
            return;
        };

        let params = comp.params();
        let count = params.len();
        let replies: Vec<MavMessage> = params
            .iter()
            .enumerate()
            .map(|(i, (name, value))| param_value_message(name, value, i, count))
            .collect();
        for msg in &replies {
            self.send(msg, req.target_component, from);
        }
    }

    fn handle_param_set(&mut self, req: PARAM_EXT_SET_DATA, from: SocketAddr) {
        if self.drop_unaddressed("param-ext-set", req.target_system, req.target_component) {
            return;
        }
        let Some(comp) = self.registry.get_mut(req.target_component) else {
            return;
        };

        let param_id = from_char_array(&req.param_id);
        let result = match ParamValue::from_wire(req.param_type as u8, &req.param_value) {
            Ok(value) => comp.set_param(&param_id, value).map_err(|e| {
                warn!(param = %param_id, error = %e, "parameter set rejected");
                match e {
                    ComponentError::Param(ParamError::TypeMismatch { .. }) => {
                        ParamAck::PARAM_ACK_VALUE_UNSUPPORTED
                    }
                    _ => ParamAck::PARAM_ACK_FAILED,
                }
            }),
            Err(e) => {
                warn!(param = %param_id, error = %e, "parameter value not decodable");
                Err(ParamAck::PARAM_ACK_VALUE_UNSUPPORTED)
            }
        };

        let param_result = match result {
            Ok(()) => ParamAck::PARAM_ACK_ACCEPTED,
            Err(ack) => ack,
        };
        let current = comp.param(&param_id);
        let ack = PARAM_EXT_ACK_DATA {
            param_id: req.param_id,
            param_value: current
                .as_ref()
                .map(|v| to_char_array(&v.to_wire()))
                .unwrap_or([0; PARAM_VALUE_LEN]),
            param_type: current
                .as_ref()
                .map(|v| MavParamExtType::from(v.param_type()))
                .unwrap_or(req.param_type),
            param_result,
        };
        self.outbox.send(
            &MavMessage::PARAM_EXT_ACK(ack),
            self.system_id.get(),
            req.target_component,
            from,
        );
    }

    /// Turns a worker notification into its outbound message
    pub fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::ImageCaptured {
                request,
                success,
                sequence,
            } => {
                if !self.registry.contains(request.component_id) {
                    debug!(component = request.component_id, "capture for removed component");
                    return;
                }
                let time_utc = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_micros() as u64)
                    .unwrap_or_default();
                let msg = MavMessage::CAMERA_IMAGE_CAPTURED(CAMERA_IMAGE_CAPTURED_DATA {
                    time_utc,
                    time_boot_ms: self.outbox.time_boot_ms(),
                    image_index: i32::try_from(sequence).unwrap_or(i32::MAX),
                    capture_result: i8::from(success),
                    ..Default::default()
                });
                self.send(&msg, request.component_id, request.reply_to);
            }
            ServerEvent::CaptureStatusTick { request } => {
                if let Some(msg) = self.capture_status_message(request.component_id) {
                    self.send(&msg, request.component_id, request.reply_to);
                }
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        for (_, ticker) in self.status_tickers.drain() {
            ticker.abort();
        }
    }
}

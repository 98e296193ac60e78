//! Daemon configuration

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::MAVLINK_UDP_PORT;
use crate::stream::DEFAULT_RTSP_PORT;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mavlink: MavlinkConfig,

    #[serde(default)]
    pub v4l2: V4l2Config,

    /// Camera definition URI per device id
    #[serde(default)]
    pub uri: BTreeMap<String, String>,

    #[serde(default)]
    pub imgcap: ImageCaptureConfig,

    #[serde(default)]
    pub vidcap: VideoCaptureConfig,

    #[serde(default)]
    pub custom: CustomCameraConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MavlinkConfig {
    /// Local UDP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Heartbeat destination
    #[serde(default = "default_broadcast_addr")]
    pub broadcast_addr: IpAddr,

    /// Fixed system id; learned from the autopilot when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<u8>,

    /// Host put in stream URIs; first non-loopback address when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtsp_server_addr: Option<String>,

    #[serde(default = "default_rtsp_port")]
    pub rtsp_port: u16,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

impl Default for MavlinkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            broadcast_addr: default_broadcast_addr(),
            system_id: None,
            rtsp_server_addr: None,
            rtsp_port: default_rtsp_port(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

impl MavlinkConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port)
    }

    /// Heartbeats go to the broadcast address on the same port
    pub fn broadcast_target(&self) -> SocketAddr {
        SocketAddr::new(self.broadcast_addr, self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Address advertised in stream URIs
    pub fn stream_addr(&self) -> String {
        self.rtsp_server_addr
            .clone()
            .or_else(get_local_ip)
            .unwrap_or_else(|| Ipv4Addr::LOCALHOST.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct V4l2Config {
    /// Device names (`video1`) never exposed
    #[serde(default)]
    pub blacklist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageCaptureConfig {
    /// Directory still images are written to
    #[serde(default = "default_capture_location")]
    pub location: PathBuf,
}

impl Default for ImageCaptureConfig {
    fn default() -> Self {
        Self {
            location: default_capture_location(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCaptureConfig {
    #[serde(default = "default_capture_location")]
    pub location: PathBuf,

    #[serde(default = "default_framerate")]
    pub framerate: u32,
}

impl Default for VideoCaptureConfig {
    fn default() -> Self {
        Self {
            location: default_capture_location(),
            framerate: default_framerate(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomCameraConfig {
    #[serde(default)]
    pub enabled: bool,
}

fn default_port() -> u16 {
    MAVLINK_UDP_PORT
}
fn default_broadcast_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::BROADCAST)
}
fn default_rtsp_port() -> u16 {
    DEFAULT_RTSP_PORT
}
fn default_heartbeat_interval_ms() -> u64 {
    1000
}
fn default_capture_location() -> PathBuf {
    std::env::temp_dir()
}
fn default_framerate() -> u32 {
    25
}

impl Config {
    /// Loads configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Loads from `path`, or defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(&path) {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            other => other,
        }
    }

    /// Loads configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mav = &self.mavlink;

        if mav.port == 0 {
            return Err(ConfigError::Invalid("mavlink.port must be > 0".to_string()));
        }

        if mav.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "mavlink.heartbeat_interval_ms must be > 0".to_string(),
            ));
        }

        if let Some(id) = mav.system_id {
            if !(1..=254).contains(&id) {
                return Err(ConfigError::Invalid(format!(
                    "mavlink.system_id must be between 1 and 254, got {}",
                    id
                )));
            }
        }

        if self.vidcap.framerate == 0 {
            return Err(ConfigError::Invalid("vidcap.framerate must be > 0".to_string()));
        }

        Ok(())
    }

    /// Camera definition URI configured for a device
    pub fn definition_uri(&self, device_id: &str) -> Option<&str> {
        self.uri.get(device_id).map(String::as_str)
    }
}

/// First non-loopback IPv4 address, found by routing a UDP socket outward
fn get_local_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let local_addr = socket.local_addr().ok()?;
    let ip = local_addr.ip();
    (!ip.is_loopback() && !ip.is_unspecified()).then(|| ip.to_string())
}

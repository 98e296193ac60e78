//! MAVLink camera protocol daemon
//!
//! Exposes local cameras as MAVLink camera components over UDP:
//! - MAVLink v1/v2 framing and the common dialect from the `mavlink` crate
//! - One component id per camera, announced by heartbeat
//! - Camera commands, PARAM_EXT parameters and video stream discovery
//! - Still and video capture running off the protocol loop
//!
//! # Example
//!
//! ```no_run
//! use camera_streaming_daemon::camera::{CustomDevice, DeviceCameraComponent};
//! use camera_streaming_daemon::server::{ComponentRegistry, MavlinkServer, ServerConfig, SystemId};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut registry = ComponentRegistry::new();
//! let camera = DeviceCameraComponent::with_raw_capture(CustomDevice::new(), "/tmp", "/tmp", 25)?;
//! registry.add(Box::new(camera))?;
//!
//! let config = ServerConfig {
//!     bind_addr: "0.0.0.0:14550".parse()?,
//!     broadcast_addr: "255.255.255.255:14550".parse()?,
//!     heartbeat_interval: std::time::Duration::from_secs(1),
//! };
//! let server = MavlinkServer::bind(&config, registry, SystemId::discover()).await?;
//! server.run(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! # Ok(())
//! # }
//! ```

pub mod camera;
pub mod capture;
pub mod config;
pub mod protocol;
pub mod server;
pub mod stream;

// Re-exports for convenience
pub use camera::{CameraComponent, DeviceCameraComponent};
pub use config::Config;
pub use server::{ComponentRegistry, Dispatcher, MavlinkServer, ServerConfig, SystemId};
pub use stream::{FrameSize, Stream};

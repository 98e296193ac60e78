//! Camera streaming daemon: serves local cameras as MAVLink camera components

use anyhow::{Context, Result};
use camera_streaming_daemon::camera::{
    device_file_prefix, CameraDevice, CustomDevice, DeviceCameraComponent,
};
use camera_streaming_daemon::config::Config;
use camera_streaming_daemon::server::{
    ComponentRegistry, MavlinkServer, ServerConfig, SystemId,
};
use camera_streaming_daemon::stream::{RtspUriResolver, Stream};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "csd")]
#[command(about = "MAVLink camera protocol daemon")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();

    info!(config_path = %cli.config, "Loading configuration");
    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config))?;

    let (registry, streams) = build_cameras(&config)?;
    if registry.is_empty() {
        warn!("no cameras available, only answering as an empty system");
    }

    let system_id = match config.mavlink.system_id {
        Some(id) => SystemId::fixed(id),
        None => SystemId::discover(),
    };

    let server_config = ServerConfig {
        bind_addr: config.mavlink.bind_addr(),
        broadcast_addr: config.mavlink.broadcast_target(),
        heartbeat_interval: config.mavlink.heartbeat_interval(),
    };
    let server = MavlinkServer::bind(&server_config, registry, system_id)
        .await
        .context("failed to start MAVLink server")?
        .with_streams(streams)
        .with_uri_resolver(
            Box::new(RtspUriResolver::new(config.mavlink.rtsp_port)),
            config.mavlink.stream_addr(),
        );

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    info!("Shutdown complete");
    Ok(())
}

/// Registers every configured camera and the stream that goes with it
fn build_cameras(config: &Config) -> Result<(ComponentRegistry, Vec<Stream>)> {
    let mut registry = ComponentRegistry::new();
    let mut streams = Vec::new();

    if config.custom.enabled {
        registry = registry.with_reserved_slot();
        let base = registry.base();
        register(CustomDevice::new(), Some(base), config, &mut registry, &mut streams)
            .context("failed to register custom camera")?;
    }

    #[cfg(feature = "v4l2")]
    for device in camera_streaming_daemon::camera::v4l2::discover_devices(
        "/dev",
        &config.v4l2.blacklist,
    ) {
        let path = device.device_id().to_string();
        if let Err(e) = register(device, None, config, &mut registry, &mut streams) {
            warn!(device = %path, error = %e, "camera not registered");
        }
    }

    info!(cameras = registry.len(), streams = streams.len(), "cameras registered");
    Ok((registry, streams))
}

fn register<D: CameraDevice + 'static>(
    device: D,
    slot: Option<u8>,
    config: &Config,
    registry: &mut ComponentRegistry,
    streams: &mut Vec<Stream>,
) -> Result<()> {
    let device_id = device.device_id().to_string();
    let formats = device.formats();

    let mut component = DeviceCameraComponent::with_raw_capture(
        device,
        &config.imgcap.location,
        &config.vidcap.location,
        config.vidcap.framerate,
    )?;
    if let Some(uri) = config.definition_uri(&device_id) {
        component.set_definition_uri(uri);
    }

    let id = match slot {
        Some(id) => {
            registry.insert(id, Box::new(component))?;
            id
        }
        None => registry.add(Box::new(component))?,
    };

    streams.push(Stream::new(
        device_file_prefix(&device_id),
        device_id.as_str(),
        config.vidcap.framerate as f32,
        formats,
    ));
    info!(component = id, device = %device_id, "camera registered");
    Ok(())
}

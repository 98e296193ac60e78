//! MAVLink camera protocol server
//!
//! One UDP socket, one loop. The loop multiplexes inbound datagrams, the
//! heartbeat timer, notifications from capture workers and a shutdown
//! signal, and hands each to the [`Dispatcher`] in turn.

mod ack;
pub mod dispatcher;
mod heartbeat;
pub mod registry;
mod stats;
pub mod transport;

pub use ack::command_ack;
pub use dispatcher::{
    flag_set, Dispatcher, PendingCaptureRequest, ServerEvent, SystemId, DEFAULT_SYSTEM_ID,
};
pub use heartbeat::HeartbeatEmitter;
pub use registry::{ComponentRegistry, RegistryError};
pub use stats::{ServerStats, ServerStatsSnapshot};
pub use transport::{Outbox, RecordingTransport, Transport};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::stream::{Stream, UriResolver};

/// Largest datagram read from the socket; a MAVLink 2 frame is at most 280 bytes
const RECV_BUFFER_LEN: usize = 2048;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Socket and timing settings of the protocol endpoint
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Where heartbeats go
    pub broadcast_addr: SocketAddr,
    pub heartbeat_interval: Duration,
}

pub struct MavlinkServer {
    socket: Arc<UdpSocket>,
    dispatcher: Dispatcher,
    heartbeat: HeartbeatEmitter,
    heartbeat_interval: Duration,
    events: UnboundedReceiver<ServerEvent>,
}

impl MavlinkServer {
    /// Binds the socket (broadcast enabled) and sets up the dispatcher
    ///
    /// ```
    /// use camera_streaming_daemon::server::{ComponentRegistry, MavlinkServer, ServerConfig, SystemId};
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let config = ServerConfig {
    ///     bind_addr: "127.0.0.1:0".parse().unwrap(),
    ///     broadcast_addr: "127.0.0.1:14550".parse().unwrap(),
    ///     heartbeat_interval: Duration::from_secs(1),
    /// };
    /// let server = MavlinkServer::bind(&config, ComponentRegistry::new(), SystemId::fixed(1))
    ///     .await
    ///     .unwrap();
    /// assert_ne!(server.local_addr().unwrap().port(), 0);
    /// # })
    /// ```
    pub async fn bind(
        config: &ServerConfig,
        registry: ComponentRegistry,
        system_id: SystemId,
    ) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        socket.set_broadcast(true)?;
        let socket = Arc::new(socket);

        let (tx, events) = mpsc::unbounded_channel();
        let transport: Arc<dyn Transport> = socket.clone();
        let dispatcher = Dispatcher::new(registry, system_id, transport, tx);

        info!(
            addr = %socket.local_addr()?,
            broadcast = %config.broadcast_addr,
            components = dispatcher.registry().len(),
            system_id = system_id.get(),
            "MAVLink server bound"
        );

        Ok(Self {
            socket,
            dispatcher,
            heartbeat: HeartbeatEmitter::new(config.broadcast_addr),
            heartbeat_interval: config.heartbeat_interval,
            events,
        })
    }

    pub fn with_streams(mut self, streams: Vec<Stream>) -> Self {
        self.dispatcher = self.dispatcher.with_streams(streams);
        self
    }

    pub fn with_uri_resolver(
        mut self,
        resolver: Box<dyn UriResolver>,
        stream_addr: impl Into<String>,
    ) -> Self {
        self.dispatcher = self.dispatcher.with_uri_resolver(resolver, stream_addr);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        self.dispatcher.stats()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Serves until `shutdown` resolves
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        let mut buf = vec![0u8; RECV_BUFFER_LEN];
        let mut heartbeat = tokio::time::interval(self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_ms = self.heartbeat_interval.as_millis() as u64, "MAVLink server running");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("MAVLink server shutting down");
                    break;
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, from)) => {
                        debug!(%from, len, "datagram");
                        self.dispatcher.handle_datagram(&buf[..len], from);
                    }
                    Err(e) => warn!(error = %e, "receive failed"),
                },
                _ = heartbeat.tick() => {
                    self.dispatcher.emit_heartbeat(&self.heartbeat);
                }
                Some(event) = self.events.recv() => {
                    self.dispatcher.handle_event(event);
                }
            }
        }

        let stats = self.dispatcher.stats().snapshot();
        info!(
            received = stats.messages_received,
            sent = stats.messages_sent,
            acks = stats.acks_sent,
            dropped = stats.messages_dropped,
            parse_errors = stats.parse_errors,
            "MAVLink server stopped"
        );
        Ok(())
    }
}

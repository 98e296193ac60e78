//! Outbound datagram path

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tracing::{trace, warn};

use super::stats::ServerStats;
use crate::protocol::{encode, MavHeader, MavMessage, Message};

/// Best-effort datagram sink
///
/// Sends never block the protocol loop: a datagram that cannot be queued
/// right away is reported as an error and lost.
pub trait Transport: Send + Sync {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;
}

impl Transport for UdpSocket {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.try_send_to(buf, target)
    }
}

/// Keeps every datagram instead of sending it
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(SocketAddr, Bytes)>>,
    fail: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose sends all fail
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Drains the datagrams recorded so far
    pub fn take(&self) -> Vec<(SocketAddr, Bytes)> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

impl Transport for RecordingTransport {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::Other, "transport down"));
        }
        self.sent.lock().push((target, Bytes::copy_from_slice(buf)));
        Ok(buf.len())
    }
}

/// Frames messages and hands them to the transport
///
/// Owns the outbound sequence counter, which advances once per frame.
pub struct Outbox {
    transport: Arc<dyn Transport>,
    sequence: u8,
    stats: Arc<ServerStats>,
    started: Instant,
}

impl Outbox {
    pub fn new(transport: Arc<dyn Transport>, stats: Arc<ServerStats>) -> Self {
        Self {
            transport,
            sequence: 0,
            stats,
            started: Instant::now(),
        }
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Milliseconds since the outbox was created, wrapping like MAVLink boot time
    pub fn time_boot_ms(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }

    /// Sends one message; failures are logged and counted, never retried
    pub fn send(
        &mut self,
        msg: &MavMessage,
        system_id: u8,
        component_id: u8,
        target: SocketAddr,
    ) -> bool {
        let header = MavHeader {
            system_id,
            component_id,
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);

        let frame = match encode(header, msg) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to encode message");
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };

        match self.transport.send_to(&frame, target) {
            Ok(_) => {
                trace!(msg = msg.message_name(), %target, seq = header.sequence, "sent");
                self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                warn!(msg = msg.message_name(), %target, error = %e, "failed to send message");
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

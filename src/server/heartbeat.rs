//! Periodic HEARTBEAT per registered camera component

use std::net::SocketAddr;
use std::sync::atomic::Ordering;

use tracing::{trace, warn};

use super::dispatcher::SystemId;
use super::registry::ComponentRegistry;
use super::transport::Outbox;
use crate::protocol::{
    MavAutopilot, MavMessage, MavModeFlag, MavState, MavType, HEARTBEAT_DATA, MAVLINK_VERSION,
};

pub struct HeartbeatEmitter {
    target: SocketAddr,
}

impl HeartbeatEmitter {
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    fn message() -> MavMessage {
        MavMessage::HEARTBEAT(HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_GENERIC,
            autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
            base_mode: MavModeFlag::empty(),
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: MAVLINK_VERSION,
        })
    }

    /// One tick: a heartbeat for every registered id, or nothing at all if
    /// the system id is not usable. Returns the number sent.
    pub fn emit(&self, registry: &ComponentRegistry, system_id: &SystemId, outbox: &mut Outbox) -> usize {
        if !system_id.is_valid() {
            warn!(system_id = system_id.get(), "invalid system id, skipping heartbeat");
            return 0;
        }

        let msg = Self::message();
        let mut sent = 0;
        for id in registry.ids() {
            if outbox.send(&msg, system_id.get(), id, self.target) {
                sent += 1;
            }
        }
        outbox
            .stats()
            .heartbeats_sent
            .fetch_add(sent as u64, Ordering::Relaxed);
        trace!(sent, "heartbeat");
        sent
    }
}

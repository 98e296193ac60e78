//! Command acknowledgements

use std::net::SocketAddr;
use std::sync::atomic::Ordering;

use tracing::debug;

use super::transport::Outbox;
use crate::protocol::{mav_result, MavCmd, MavHeader, MavMessage, COMMAND_ACK_DATA};

/// COMMAND_ACK answering `command`, addressed back to its sender
pub fn command_ack(command: MavCmd, success: bool, requester: &MavHeader) -> COMMAND_ACK_DATA {
    COMMAND_ACK_DATA {
        command,
        result: mav_result(success),
        target_system: requester.system_id,
        target_component: requester.component_id,
        ..Default::default()
    }
}

impl Outbox {
    /// Sends the single ack owed for a handled command
    pub fn send_ack(
        &mut self,
        system_id: u8,
        component_id: u8,
        requester: &MavHeader,
        target: SocketAddr,
        command: MavCmd,
        success: bool,
    ) {
        let ack = command_ack(command, success, requester);
        debug!(component = component_id, command = ?command, success, "ack");
        if self.send(&MavMessage::COMMAND_ACK(ack), system_id, component_id, target) {
            self.stats().acks_sent.fetch_add(1, Ordering::Relaxed);
        }
    }
}

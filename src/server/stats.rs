//! Protocol server statistics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters, shared between the server loop and observers
#[derive(Debug, Default)]
pub struct ServerStats {
    pub messages_received: AtomicU64,
    pub messages_sent: AtomicU64,
    pub commands_handled: AtomicU64,
    pub acks_sent: AtomicU64,
    /// Messages dropped by the addressing check
    pub messages_dropped: AtomicU64,
    pub unknown_messages: AtomicU64,
    pub parse_errors: AtomicU64,
    pub send_errors: AtomicU64,
    pub heartbeats_sent: AtomicU64,
}

impl ServerStats {
    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            commands_handled: self.commands_handled.load(Ordering::Relaxed),
            acks_sent: self.acks_sent.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            unknown_messages: self.unknown_messages.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ServerStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatsSnapshot {
    pub messages_received: u64,
    pub messages_sent: u64,
    pub commands_handled: u64,
    pub acks_sent: u64,
    pub messages_dropped: u64,
    pub unknown_messages: u64,
    pub parse_errors: u64,
    pub send_errors: u64,
    pub heartbeats_sent: u64,
}

impl ServerStatsSnapshot {
    /// Share of received messages that were dropped by addressing
    pub fn drop_rate(&self) -> f64 {
        if self.messages_received == 0 {
            return 0.0;
        }
        self.messages_dropped as f64 / self.messages_received as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_copies_counters() {
        let stats = ServerStats::default();
        stats.messages_received.fetch_add(4, Ordering::Relaxed);
        stats.messages_dropped.fetch_add(1, Ordering::Relaxed);

        let snap = stats.snapshot();
        assert_eq!(snap.messages_received, 4);
        assert_eq!(snap.drop_rate(), 0.25);
        assert_eq!(ServerStatsSnapshot::default().drop_rate(), 0.0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snap = ServerStatsSnapshot {
            acks_sent: 2,
            ..Default::default()
        };
        let text = toml::to_string(&snap).unwrap();
        assert!(text.contains("acks_sent = 2"));
    }
}

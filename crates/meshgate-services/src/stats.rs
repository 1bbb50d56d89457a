//! Relay counters. Monotonic for the life of the process.

use meshgate_core::message::GatewayStats;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatistics {
    pub packets_received: u32,
    pub packets_sent: u32,
    pub packets_forwarded: u32,
    pub packets_failed: u32,
}

impl RelayStatistics {
    pub fn record_received(&mut self) {
        self.packets_received = self.packets_received.wrapping_add(1);
    }

    pub fn record_forwarded(&mut self) {
        self.packets_forwarded = self.packets_forwarded.wrapping_add(1);
    }

    pub fn record_transmit(&mut self, ok: bool) {
        if ok {
            self.packets_sent = self.packets_sent.wrapping_add(1);
        } else {
            self.packets_failed = self.packets_failed.wrapping_add(1);
        }
    }

    /// Bus report at `now_ms` of uptime.
    pub fn report(&self, now_ms: u64) -> GatewayStats {
        GatewayStats {
            timestamp: now_ms,
            uptime: now_ms / 1000,
            packets_received: self.packets_received,
            packets_sent: self.packets_sent,
            packets_forwarded: self.packets_forwarded,
            packets_failed: self.packets_failed,
        }
    }
}

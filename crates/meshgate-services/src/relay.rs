//! Relay engine.
//!
//! `RelayCore` owns every piece of relay state (dedup memory, neighbours,
//! counters) and makes every decision, but performs no I/O. Each entry point
//! returns the list of [`Effect`]s the caller must carry out, in order.
//! Transmit outcomes are reported back through [`RelayCore::record_transmit`]
//! and [`RelayCore::confirm_repeat`].

use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use serde::Serialize;

use meshgate_core::config::GatewayConfig;
use meshgate_core::message::{
    AdvertEnvelope, AdvertEvent, GatewayStatus, MessageEnvelope, NeighborsReport, NodeInfo,
    RawEnvelope, RawPacketEvent, TextMessageEvent,
};
use meshgate_core::topic::{BridgeKind, TopicClass, TopicRouter};
use meshgate_core::wire::{fnv1a_32, is_printable, AdvertMessage};

use crate::access::AccessGate;
use crate::cache::RecentPacketCache;
use crate::peer::NeighborTable;
use crate::stats::RelayStatistics;

// ── Inputs and outputs ────────────────────────────────────────────────────────

/// One frame as the radio delivered it.
#[derive(Debug, Clone)]
pub struct RadioPacket {
    pub payload: Bytes,
    pub rssi: i32,
    pub snr: f32,
    /// Monotonic uptime in milliseconds.
    pub received_at_ms: u64,
}

/// Something the caller must do on the relay's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Publish {
        topic: String,
        payload: String,
        retain: bool,
    },
    /// Wait `delay`, send `frame`, then `confirm_repeat(hash)` on success.
    Repeat {
        frame: Bytes,
        hash: u32,
        delay: Duration,
    },
    Transmit { frame: Bytes },
    Restart,
}

/// Snapshot of the config fields the relay reads.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub node_id: u32,
    pub node_name: String,
    /// Client id; stamped into envelopes and compared for self-loop checks.
    pub gateway_id: String,
    pub max_hops: u8,
    pub publish_raw: bool,
    pub publish_decoded: bool,
    pub subscribe_commands: bool,
    pub bridge_all: bool,
    pub dedup_window_ms: u64,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    pub latitude: f64,
    pub longitude: f64,
}

impl RelaySettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            node_id: config.repeater.node_id,
            node_name: config.repeater.node_name.clone(),
            gateway_id: config.gateway_id(),
            max_hops: config.repeater.max_hops,
            publish_raw: config.bus.publish_raw,
            publish_decoded: config.bus.publish_decoded,
            subscribe_commands: config.bus.subscribe_commands,
            bridge_all: config.bus.bridge_all,
            dedup_window_ms: config.relay.dedup_window_ms,
            jitter_min_ms: config.relay.jitter_min_ms,
            jitter_max_ms: config.relay.jitter_max_ms,
            latitude: config.location.latitude,
            longitude: config.location.longitude,
        }
    }

    fn jitter(&self) -> Duration {
        let lo = self.jitter_min_ms;
        let hi = self.jitter_max_ms.max(lo);
        let ms = if lo == hi {
            lo
        } else {
            rand::thread_rng().gen_range(lo..=hi)
        };
        Duration::from_millis(ms)
    }
}

// ── Core ──────────────────────────────────────────────────────────────────────

pub struct RelayCore {
    settings: RelaySettings,
    router: TopicRouter,
    gate: AccessGate,
    cache: RecentPacketCache,
    neighbors: NeighborTable,
    stats: RelayStatistics,
}

impl RelayCore {
    pub fn new(settings: RelaySettings, router: TopicRouter, gate: AccessGate) -> Self {
        Self {
            settings,
            router,
            gate,
            cache: RecentPacketCache::default(),
            neighbors: NeighborTable::default(),
            stats: RelayStatistics::default(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            RelaySettings::from_config(config),
            config.topic_router(),
            AccessGate::from_config(config),
        )
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    pub fn stats(&self) -> RelayStatistics {
        self.stats
    }

    pub fn cache(&self) -> &RecentPacketCache {
        &self.cache
    }

    /// Patterns to subscribe to on bus connect.
    pub fn subscriptions(&self) -> Vec<String> {
        self.router
            .subscriptions(self.settings.subscribe_commands, self.settings.bridge_all)
    }

    // ── Radio → bus ───────────────────────────────────────────────────────────

    pub fn on_packet_received(&mut self, packet: &RadioPacket, bus_connected: bool) -> Vec<Effect> {
        self.stats.record_received();
        let frame = &packet.payload;
        let now = packet.received_at_ms;

        let printable = is_printable(frame);
        let advert = if printable {
            AdvertMessage::parse(frame).ok()
        } else {
            None
        };

        tracing::debug!(
            len = frame.len(),
            rssi = packet.rssi,
            snr = packet.snr,
            printable,
            advert = advert.is_some(),
            "radio frame received"
        );

        if let Some(ref a) = advert {
            if self.gate.is_denied(a.node_id) {
                tracing::info!(node_id = format_args!("{:08X}", a.node_id), "advert dropped, node denied");
                return Vec::new();
            }
        }

        let mut neighbour_accepted = false;
        if let Some(ref a) = advert {
            let outcome = self.neighbors.upsert(
                a.node_id,
                &a.node_name,
                packet.rssi,
                packet.snr,
                a.latitude,
                a.longitude,
                now,
            );
            neighbour_accepted = outcome.accepted();
            tracing::debug!(
                node_id = format_args!("{:08X}", a.node_id),
                name = %a.node_name,
                ?outcome,
                "neighbour upsert"
            );
        }

        let mut effects = Vec::new();

        if bus_connected {
            let gw = self.settings.gateway_id.as_str();
            if let Some(ref a) = advert {
                effects.extend(publish(
                    self.router.bridge(BridgeKind::Adverts),
                    &AdvertEvent::new(a, gw, now),
                    false,
                ));
                if neighbour_accepted {
                    let info = NodeInfo {
                        node_id: a.node_id,
                        name: a.node_name.clone(),
                        online: true,
                        timestamp: now,
                        gateway: gw.to_string(),
                    };
                    effects.extend(publish(self.router.node(a.node_id), &info, true));
                }
            }
            if self.settings.publish_raw {
                effects.extend(publish(
                    self.router.bridge(BridgeKind::Raw),
                    &RawPacketEvent::new(frame, packet.rssi, packet.snr, gw, now),
                    false,
                ));
            }
            if self.settings.publish_decoded && printable {
                let from = match advert {
                    Some(ref a) if a.node_id != 0 => a.node_id,
                    _ => self.settings.node_id,
                };
                let text = String::from_utf8_lossy(frame);
                effects.extend(publish(
                    self.router.bridge(BridgeKind::Messages),
                    &TextMessageEvent::new(from, text, packet.rssi, packet.snr, gw, now),
                    false,
                ));
            }
            self.stats.record_forwarded();
        }

        if self.settings.max_hops > 0 && !frame.is_empty() {
            let hash = fnv1a_32(frame);
            if self.cache.seen(hash, now, self.settings.dedup_window_ms) {
                tracing::debug!(hash = format_args!("{hash:08x}"), "duplicate seen recently, not repeating");
            } else {
                effects.push(Effect::Repeat {
                    frame: frame.clone(),
                    hash,
                    delay: self.settings.jitter(),
                });
            }
        }

        effects
    }

    /// Remember a repeated frame once it actually went out.
    pub fn confirm_repeat(&mut self, hash: u32, now_ms: u64) {
        self.cache.remember(hash, now_ms);
    }

    pub fn record_transmit(&mut self, ok: bool) {
        self.stats.record_transmit(ok);
    }

    // ── Bus → radio ───────────────────────────────────────────────────────────

    pub fn on_bus_message(&mut self, topic: &str, payload: &[u8]) -> Vec<Effect> {
        match self.router.classify(topic) {
            TopicClass::Command(command) => self.on_command(&command, payload),
            TopicClass::BridgePayload(kind) if self.settings.bridge_all => {
                self.on_bridge_payload(kind, payload).into_iter().collect()
            }
            TopicClass::BridgePayload(_) => Vec::new(),
            TopicClass::Ignored => {
                tracing::trace!(%topic, "bus message ignored");
                Vec::new()
            }
        }
    }

    fn on_command(&mut self, command: &str, payload: &[u8]) -> Vec<Effect> {
        match command {
            "send" => {
                tracing::info!(len = payload.len(), "send command, forwarding to radio");
                vec![Effect::Transmit {
                    frame: Bytes::copy_from_slice(payload),
                }]
            }
            "restart" => {
                tracing::info!("restart command received");
                vec![Effect::Restart]
            }
            other => {
                tracing::debug!(command = %other, "unknown command ignored");
                Vec::new()
            }
        }
    }

    fn on_bridge_payload(&self, kind: BridgeKind, payload: &[u8]) -> Option<Effect> {
        let frame = match kind {
            BridgeKind::Raw => {
                let env: RawEnvelope = decode_envelope(kind, payload)?;
                if self.is_own(env.gateway.as_deref()) {
                    return None;
                }
                match hex::decode(env.data.trim()) {
                    Ok(bytes) if !bytes.is_empty() => Bytes::from(bytes),
                    Ok(_) => return None,
                    Err(e) => {
                        tracing::debug!(error = %e, "bridged raw frame has bad hex, dropped");
                        return None;
                    }
                }
            }
            BridgeKind::Messages => {
                let env: MessageEnvelope = decode_envelope(kind, payload)?;
                if self.is_own(env.gateway.as_deref()) {
                    return None;
                }
                Bytes::from(env.message.into_bytes())
            }
            BridgeKind::Adverts => {
                let env: AdvertEnvelope = decode_envelope(kind, payload)?;
                if self.is_own(env.gateway.as_deref()) {
                    return None;
                }
                if self.gate.is_denied(env.node_id) {
                    tracing::info!(
                        node_id = format_args!("{:08X}", env.node_id),
                        "bridged advert dropped, node denied"
                    );
                    return None;
                }
                Bytes::from(env.to_advert().encode().into_bytes())
            }
            BridgeKind::Status | BridgeKind::Stats | BridgeKind::Floods => return None,
        };

        tracing::debug!(kind = kind.as_str(), len = frame.len(), "bridging bus payload to radio");
        Some(Effect::Transmit { frame })
    }

    fn is_own(&self, gateway: Option<&str>) -> bool {
        let own = gateway == Some(self.settings.gateway_id.as_str());
        if own {
            tracing::trace!("own publication echoed back, dropped");
        }
        own
    }

    // ── Reports ───────────────────────────────────────────────────────────────

    pub fn status_effect(&self, online: bool, now_ms: u64) -> Option<Effect> {
        let status = GatewayStatus {
            online,
            timestamp: now_ms,
            latitude: self.settings.latitude,
            longitude: self.settings.longitude,
        };
        publish(self.router.gateway_status(&self.settings.gateway_id), &status, true)
    }

    /// Stats and neighbour report, published together.
    pub fn stats_effects(&self, now_ms: u64) -> Vec<Effect> {
        let gw = &self.settings.gateway_id;
        let neighbors: Vec<_> = self.neighbors.all().iter().map(|r| r.report()).collect();
        let report = NeighborsReport {
            timestamp: now_ms,
            gateway: gw.clone(),
            count: neighbors.len(),
            gateway_lat: self.settings.latitude,
            gateway_lon: self.settings.longitude,
            neighbors,
        };

        publish(self.router.gateway_stats(gw), &self.stats.report(now_ms), false)
            .into_iter()
            .chain(publish(self.router.gateway_neighbors(gw), &report, false))
            .collect()
    }

    /// Our own beacon on the radio, plus its bus event when connected.
    pub fn advert_effects(&self, bus_connected: bool, now_ms: u64) -> Vec<Effect> {
        let advert = AdvertMessage::new(
            self.settings.node_id,
            self.settings.node_name.as_str(),
            self.settings.latitude,
            self.settings.longitude,
        );
        let mut effects = vec![Effect::Transmit {
            frame: Bytes::from(advert.encode().into_bytes()),
        }];
        if bus_connected {
            effects.extend(publish(
                self.router.bridge(BridgeKind::Adverts),
                &AdvertEvent::new(&advert, &self.settings.gateway_id, now_ms),
                false,
            ));
        }
        effects
    }
}

fn publish<T: Serialize>(topic: String, value: &T, retain: bool) -> Option<Effect> {
    match serde_json::to_string(value) {
        Ok(payload) => Some(Effect::Publish {
            topic,
            payload,
            retain,
        }),
        Err(e) => {
            tracing::warn!(error = %e, %topic, "failed to encode bus payload");
            None
        }
    }
}

fn decode_envelope<T: serde::de::DeserializeOwned>(kind: BridgeKind, payload: &[u8]) -> Option<T> {
    match serde_json::from_slice(payload) {
        Ok(env) => Some(env),
        Err(e) => {
            tracing::debug!(kind = kind.as_str(), error = %e, "malformed bridge envelope dropped");
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

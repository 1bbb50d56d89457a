//! Gateway actor.
//!
//! A single task owns the [`RelayCore`] and the collaborators, and processes
//! one command at a time. The repeat jitter is awaited inside the task, so no
//! other frame or bus message is handled while a repeat is pending.

use std::time::Instant;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use meshgate_core::message::NeighborReport;
use meshgate_core::wire::MAX_FRAME_LEN;

use crate::relay::{Effect, RadioPacket, RelayCore};
use crate::service::{BusTransport, HostControl, RadioError, RadioTransport};
use crate::stats::RelayStatistics;

const COMMAND_QUEUE: usize = 256;

pub enum GatewayCommand {
    /// A frame heard on the radio.
    Frame {
        payload: Bytes,
        rssi: i32,
        snr: f32,
    },
    /// A message delivered by the bus for one of our subscriptions.
    Bus { topic: String, payload: Bytes },
    SendAdvert,
    PublishStats,
    /// Transmit a frame; replies with whether the radio accepted it.
    Transmit {
        frame: Bytes,
        reply: oneshot::Sender<bool>,
    },
    Snapshot(oneshot::Sender<GatewaySnapshot>),
    Shutdown,
}

/// Point-in-time view for the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySnapshot {
    pub node_id: u32,
    pub node_name: String,
    pub gateway_id: String,
    pub prefix: String,
    pub uptime_secs: u64,
    pub bus_connected: bool,
    pub stats: RelayStatistics,
    pub neighbors: Vec<NeighborReport>,
    pub subscriptions: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway task is not running")]
    Closed,
}

/// Cloneable sender side of the actor.
#[derive(Clone)]
pub struct GatewayHandle {
    tx: mpsc::Sender<GatewayCommand>,
}

impl GatewayHandle {
    pub async fn frame(&self, payload: Bytes, rssi: i32, snr: f32) -> Result<(), GatewayError> {
        self.send(GatewayCommand::Frame { payload, rssi, snr }).await
    }

    pub async fn bus_message(&self, topic: String, payload: Bytes) -> Result<(), GatewayError> {
        self.send(GatewayCommand::Bus { topic, payload }).await
    }

    pub async fn send_advert(&self) -> Result<(), GatewayError> {
        self.send(GatewayCommand::SendAdvert).await
    }

    pub async fn publish_stats(&self) -> Result<(), GatewayError> {
        self.send(GatewayCommand::PublishStats).await
    }

    pub async fn transmit(&self, frame: Bytes) -> Result<bool, GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.send(GatewayCommand::Transmit { frame, reply }).await?;
        rx.await.map_err(|_| GatewayError::Closed)
    }

    pub async fn snapshot(&self) -> Result<GatewaySnapshot, GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.send(GatewayCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| GatewayError::Closed)
    }

    pub async fn shutdown(&self) -> Result<(), GatewayError> {
        self.send(GatewayCommand::Shutdown).await
    }

    async fn send(&self, cmd: GatewayCommand) -> Result<(), GatewayError> {
        self.tx.send(cmd).await.map_err(|_| GatewayError::Closed)
    }
}

pub struct Gateway<R, B, H> {
    core: RelayCore,
    radio: R,
    bus: Option<B>,
    host: H,
    started: Instant,
    rx: mpsc::Receiver<GatewayCommand>,
}

impl<R, B, H> Gateway<R, B, H>
where
    R: RadioTransport,
    B: BusTransport,
    H: HostControl,
{
    /// `bus` is `None` when the bus is disabled.
    pub fn new(core: RelayCore, radio: R, bus: Option<B>, host: H) -> (Self, GatewayHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let gateway = Self {
            core,
            radio,
            bus,
            host,
            started: Instant::now(),
            rx,
        };
        (gateway, GatewayHandle { tx })
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn bus_connected(&self) -> bool {
        self.bus.as_ref().is_some_and(|b| b.connected())
    }

    /// Subscribe and announce ourselves online.
    pub fn connect(&mut self) {
        let Some(bus) = self.bus.as_ref() else {
            tracing::info!("bus disabled, radio-only mode");
            return;
        };
        if !bus.connected() {
            tracing::warn!("bus not connected, skipping subscriptions");
            return;
        }
        for pattern in self.core.subscriptions() {
            if let Err(e) = bus.subscribe(&pattern) {
                tracing::warn!(error = %e, %pattern, "subscribe failed");
            }
        }
        let now = self.now_ms();
        if let Some(status) = self.core.status_effect(true, now) {
            self.publish_effect(status);
        }
        tracing::info!(
            prefix = %self.core.router().prefix(),
            gateway = %self.core.settings().gateway_id,
            "gateway online"
        );
    }

    /// Process commands until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        self.connect();

        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                GatewayCommand::Frame { payload, rssi, snr } => {
                    let packet = RadioPacket {
                        payload,
                        rssi,
                        snr,
                        received_at_ms: self.now_ms(),
                    };
                    let connected = self.bus_connected();
                    let effects = self.core.on_packet_received(&packet, connected);
                    self.apply(effects).await;
                }
                GatewayCommand::Bus { topic, payload } => {
                    let effects = self.core.on_bus_message(&topic, &payload);
                    self.apply(effects).await;
                }
                GatewayCommand::SendAdvert => {
                    let effects = self.core.advert_effects(self.bus_connected(), self.now_ms());
                    self.apply(effects).await;
                }
                GatewayCommand::PublishStats => {
                    if self.bus_connected() {
                        let effects = self.core.stats_effects(self.now_ms());
                        self.apply(effects).await;
                    }
                }
                GatewayCommand::Transmit { frame, reply } => {
                    let ok = self.transmit(&frame);
                    let _ = reply.send(ok);
                }
                GatewayCommand::Snapshot(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                GatewayCommand::Shutdown => {
                    tracing::info!("gateway shutdown requested");
                    break;
                }
            }
        }

        if self.bus_connected() {
            if let Some(status) = self.core.status_effect(false, self.now_ms()) {
                self.publish_effect(status);
            }
        }
        tracing::info!(stats = ?self.core.stats(), "gateway stopped");
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Publish { .. } => self.publish_effect(effect),
                Effect::Repeat { frame, hash, delay } => {
                    tokio::time::sleep(delay).await;
                    if self.transmit(&frame) {
                        let now = self.now_ms();
                        self.core.confirm_repeat(hash, now);
                        tracing::debug!(hash = format_args!("{hash:08x}"), "frame repeated");
                    }
                }
                Effect::Transmit { frame } => {
                    self.transmit(&frame);
                }
                Effect::Restart => {
                    self.host.request_restart();
                }
            }
        }
    }

    fn publish_effect(&self, effect: Effect) {
        let Effect::Publish {
            topic,
            payload,
            retain,
        } = effect
        else {
            return;
        };
        let Some(bus) = self.bus.as_ref() else {
            return;
        };
        if let Err(e) = bus.publish(&topic, &payload, retain) {
            tracing::warn!(error = %e, %topic, "bus publish failed");
        }
    }

    /// Send a frame; every attempt counts as sent or failed.
    fn transmit(&mut self, frame: &[u8]) -> bool {
        let result = if frame.is_empty() {
            Err(RadioError::Empty)
        } else if frame.len() > MAX_FRAME_LEN {
            Err(RadioError::TooLong(frame.len()))
        } else {
            self.radio.transmit(frame)
        };

        let ok = match result {
            Ok(()) => {
                tracing::debug!(len = frame.len(), "frame transmitted");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, len = frame.len(), "transmit failed");
                false
            }
        };
        self.core.record_transmit(ok);
        ok
    }

    fn snapshot(&self) -> GatewaySnapshot {
        let settings = self.core.settings();
        GatewaySnapshot {
            node_id: settings.node_id,
            node_name: settings.node_name.clone(),
            gateway_id: settings.gateway_id.clone(),
            prefix: self.core.router().prefix().to_string(),
            uptime_secs: self.started.elapsed().as_secs(),
            bus_connected: self.bus_connected(),
            stats: self.core.stats(),
            neighbors: self.core.neighbors().all().iter().map(|r| r.report()).collect(),
            subscriptions: self.core.subscriptions(),
        }
    }
}

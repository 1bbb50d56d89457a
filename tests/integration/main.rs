//! meshgate integration harness.
//!
//! Each test drives a full gateway actor in-process: a recording radio on one
//! side, the loopback bus on the other, and a forwarding task carrying bus
//! deliveries back into the gateway the same way meshgated wires them.

mod bridge;
mod relay;
mod reports;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;

use meshgate_core::config::GatewayConfig;
use meshgate_services::bus::{BusMessage, LoopbackBus};
use meshgate_services::{
    BusTransport, Gateway, GatewayHandle, GatewaySnapshot, HostControl, RadioError,
    RadioTransport, RelayCore,
};

// ── Collaborators ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingRadio {
    pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RadioTransport for RecordingRadio {
    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        self.sent.lock().unwrap().push(frame.to_vec());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct CountingHost {
    pub restarts: Arc<AtomicUsize>,
}

impl HostControl for CountingHost {
    fn request_restart(&self) {
        self.restarts.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

pub const GATEWAY_ID: &str = "gw-test";
pub const NODE_ID: u32 = 0x0000_0A0A;
const FLUSH_MARKER: &[u8] = b"flush";

/// Defaults with a fixed identity and no repeat jitter.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.repeater.node_id = NODE_ID;
    config.repeater.node_name = "TestGW".into();
    config.bus.client_id = GATEWAY_ID.into();
    config.relay.jitter_min_ms = 0;
    config.relay.jitter_max_ms = 0;
    config
}

pub struct Rig {
    pub bus: Arc<LoopbackBus>,
    pub handle: GatewayHandle,
    pub radio: RecordingRadio,
    pub host: CountingHost,
    task: JoinHandle<()>,
}

impl Rig {
    /// Start a gateway and wait until it has subscribed.
    pub async fn start(config: GatewayConfig) -> Self {
        let core = RelayCore::from_config(&config);
        let radio = RecordingRadio::default();
        let host = CountingHost::default();
        let (bus, mut deliveries) = LoopbackBus::new();
        let (gateway, handle) = Gateway::new(core, radio.clone(), Some(bus.clone()), host.clone());
        let task = tokio::spawn(gateway.run());

        let forward = handle.clone();
        tokio::spawn(async move {
            while let Some(msg) = deliveries.recv().await {
                let payload = Bytes::from(msg.payload.into_bytes());
                if forward.bus_message(msg.topic, payload).await.is_err() {
                    break;
                }
            }
        });

        handle.snapshot().await.unwrap();
        Self {
            bus,
            handle,
            radio,
            host,
            task,
        }
    }

    /// Hand a frame to the gateway as if heard over the air, and wait for it
    /// to be fully processed.
    pub async fn hear(&self, frame: &[u8]) -> GatewaySnapshot {
        self.handle
            .frame(Bytes::copy_from_slice(frame), -70, 9.5)
            .await
            .unwrap();
        self.handle.snapshot().await.unwrap()
    }

    /// Publish onto the bus from an outside client.
    pub fn inject(&self, topic: &str, payload: &str) {
        self.bus.publish(topic, payload, false).unwrap();
    }

    /// Everything the radio has transmitted, flush markers excluded.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.radio
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.as_slice() != FLUSH_MARKER)
            .cloned()
            .collect()
    }

    /// Bus publications on `topic`, oldest first.
    pub fn published(&self, topic: &str) -> Vec<serde_json::Value> {
        self.bus
            .recent()
            .into_iter()
            .filter(|m| m.topic == topic)
            .map(|m| serde_json::from_str(&m.payload).unwrap())
            .collect()
    }

    /// Topics of the gateway's own publications, oldest first.
    pub fn published_topics(&self) -> Vec<String> {
        self.bus.recent().into_iter().map(|m: BusMessage| m.topic).collect()
    }

    /// Wait until every bus message injected so far has been handled.
    ///
    /// Deliveries are FIFO through one forwarder, so once a send command
    /// published after them reaches the radio, the earlier ones are done.
    pub async fn flush(&self) {
        let prefix = self.handle.snapshot().await.unwrap().prefix;
        let markers = || {
            self.radio
                .sent
                .lock()
                .unwrap()
                .iter()
                .filter(|f| f.as_slice() == FLUSH_MARKER)
                .count()
        };
        let before = markers();
        self.inject(
            &format!("{}/commands/send", prefix),
            std::str::from_utf8(FLUSH_MARKER).unwrap(),
        );
        assert!(wait_until(|| markers() > before).await, "bus flush timed out");
    }

    pub async fn stop(self) {
        self.handle.shutdown().await.unwrap();
        self.task.await.unwrap();
    }
}

pub async fn wait_until(cond: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

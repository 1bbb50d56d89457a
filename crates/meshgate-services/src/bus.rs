//! In-process loopback bus.
//!
//! Stands in for an MQTT broker: publications are matched against the
//! subscription filters (`+` one level, `#` the rest) and matching messages are
//! queued to the subscriber, the publisher included, exactly as a broker echoes
//! a client's own traffic back. Retained messages are kept per topic and a
//! bounded log of recent publications is kept for inspection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

use meshgate_core::topic::topic_matches;

use crate::service::{BusError, BusTransport};

/// Publications kept in the recent log.
pub const RECENT_LOG_LEN: usize = 128;

/// A message delivered to the subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

pub struct LoopbackBus {
    connected: AtomicBool,
    subscriptions: Mutex<Vec<String>>,
    retained: DashMap<String, String>,
    recent: Mutex<VecDeque<BusMessage>>,
    deliver: mpsc::UnboundedSender<BusMessage>,
}

impl LoopbackBus {
    /// Create a connected bus and the receiving end of its deliveries.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<BusMessage>) {
        let (deliver, rx) = mpsc::unbounded_channel();
        let bus = Arc::new(Self {
            connected: AtomicBool::new(true),
            subscriptions: Mutex::new(Vec::new()),
            retained: DashMap::new(),
            recent: Mutex::new(VecDeque::with_capacity(RECENT_LOG_LEN)),
            deliver,
        });
        (bus, rx)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Retained messages, sorted by topic.
    pub fn retained(&self) -> Vec<BusMessage> {
        let mut out: Vec<BusMessage> = self
            .retained
            .iter()
            .map(|e| BusMessage {
                topic: e.key().clone(),
                payload: e.value().clone(),
                retain: true,
            })
            .collect();
        out.sort_by(|a, b| a.topic.cmp(&b.topic));
        out
    }

    /// Most recent publications, oldest first.
    pub fn recent(&self) -> Vec<BusMessage> {
        self.recent
            .lock()
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn log(&self, message: &BusMessage) {
        if let Ok(mut recent) = self.recent.lock() {
            if recent.len() >= RECENT_LOG_LEN {
                recent.pop_front();
            }
            recent.push_back(message.clone());
        }
    }

    fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions
            .lock()
            .map(|subs| subs.iter().any(|f| topic_matches(f, topic)))
            .unwrap_or(false)
    }
}

impl BusTransport for LoopbackBus {
    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), BusError> {
        if !self.connected() {
            return Err(BusError::Disconnected);
        }
        if topic.is_empty() || topic.contains(['+', '#']) {
            return Err(BusError::InvalidTopic(topic.to_string()));
        }

        let message = BusMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retain,
        };
        if retain {
            // An empty retained payload clears the topic.
            if payload.is_empty() {
                self.retained.remove(topic);
            } else {
                self.retained.insert(topic.to_string(), payload.to_string());
            }
        }
        self.log(&message);
        tracing::trace!(%topic, retain, "bus publish");

        if self.is_subscribed(topic) && self.deliver.send(message).is_err() {
            tracing::debug!(%topic, "bus subscriber gone, message not delivered");
        }
        Ok(())
    }

    fn subscribe(&self, pattern: &str) -> Result<(), BusError> {
        if !self.connected() {
            return Err(BusError::Disconnected);
        }
        if pattern.is_empty() {
            return Err(BusError::InvalidTopic(pattern.to_string()));
        }
        let Ok(mut subs) = self.subscriptions.lock() else {
            return Err(BusError::Disconnected);
        };
        if !subs.iter().any(|s| s == pattern) {
            subs.push(pattern.to_string());
            tracing::debug!(%pattern, "subscribed");
        }
        Ok(())
    }
}

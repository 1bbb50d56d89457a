//! meshgate-core — shared types, wire format, topic layout and configuration.
//! All other meshgate crates depend on this one.

pub mod config;
pub mod message;
pub mod topic;
pub mod wire;

pub use config::GatewayConfig;
pub use topic::{BridgeKind, TopicClass, TopicRouter, TopicSegments};
pub use wire::{fnv1a_32, AdvertMessage};

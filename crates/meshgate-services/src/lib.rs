//! meshgate-services — the relay engine and the seams it talks through.
//!
//! State lives in [`relay::RelayCore`], which is pure: it takes events and
//! returns effects. [`gateway::Gateway`] owns the core and executes those
//! effects against the radio and bus collaborators.

pub mod access;
pub mod bus;
pub mod cache;
pub mod gateway;
pub mod peer;
pub mod relay;
pub mod service;
pub mod stats;

pub use gateway::{Gateway, GatewayCommand, GatewayHandle, GatewaySnapshot};
pub use relay::{Effect, RadioPacket, RelayCore, RelaySettings};
pub use service::{BusError, BusTransport, HostControl, RadioError, RadioTransport};

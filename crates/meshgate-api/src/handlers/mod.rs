//! HTTP API handlers. Expose gateway state as JSON and let operators inject traffic.

pub mod bus;
pub mod radio;
pub mod status;

use std::sync::Arc;

use axum::http::StatusCode;

use meshgate_services::bus::LoopbackBus;
use meshgate_services::gateway::GatewayError;
use meshgate_services::GatewayHandle;

#[derive(Clone)]
pub struct ApiState {
    pub gateway: GatewayHandle,
    /// `None` when the bus is disabled in config.
    pub bus: Option<Arc<LoopbackBus>>,
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn gateway_unavailable(e: GatewayError) -> (StatusCode, String) {
    (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
}

fn require_bus(state: &ApiState) -> Result<&Arc<LoopbackBus>, (StatusCode, String)> {
    state
        .bus
        .as_ref()
        .ok_or((StatusCode::CONFLICT, "bus is disabled".to_string()))
}

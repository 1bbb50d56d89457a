//! /status and /neighbors handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use meshgate_core::message::NeighborReport;
use meshgate_services::GatewaySnapshot;

use super::{gateway_unavailable, ApiState};

// ── /status ──────────────────────────────────────────────────────────────────

pub async fn handle_status(
    State(state): State<ApiState>,
) -> Result<Json<GatewaySnapshot>, (StatusCode, String)> {
    let snapshot = state.gateway.snapshot().await.map_err(gateway_unavailable)?;
    Ok(Json(snapshot))
}

// ── /neighbors ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct NeighborsResponse {
    pub count: usize,
    pub neighbors: Vec<NeighborReport>,
}

pub async fn handle_neighbors(
    State(state): State<ApiState>,
) -> Result<Json<NeighborsResponse>, (StatusCode, String)> {
    let snapshot = state.gateway.snapshot().await.map_err(gateway_unavailable)?;
    Ok(Json(NeighborsResponse {
        count: snapshot.neighbors.len(),
        neighbors: snapshot.neighbors,
    }))
}

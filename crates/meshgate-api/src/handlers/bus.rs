//! /bus handlers: inspect the loopback bus and publish onto it.
//!
//! Publishing here is how outside traffic reaches the gateway: the message is
//! routed through the same subscription matching a broker would apply.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use meshgate_services::bus::BusMessage;
use meshgate_services::BusTransport;

use super::{require_bus, ApiState};

#[derive(Serialize)]
pub struct MessagesResponse {
    pub count: usize,
    pub messages: Vec<BusMessage>,
}

// ── /bus/retained ─────────────────────────────────────────────────────────────

pub async fn handle_retained(
    State(state): State<ApiState>,
) -> Result<Json<MessagesResponse>, (StatusCode, String)> {
    let messages = require_bus(&state)?.retained();
    Ok(Json(MessagesResponse {
        count: messages.len(),
        messages,
    }))
}

// ── /bus/recent ───────────────────────────────────────────────────────────────

pub async fn handle_recent(
    State(state): State<ApiState>,
) -> Result<Json<MessagesResponse>, (StatusCode, String)> {
    let messages = require_bus(&state)?.recent();
    Ok(Json(MessagesResponse {
        count: messages.len(),
        messages,
    }))
}

// ── /bus/publish (POST) ───────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PublishRequest {
    pub topic: String,
    pub payload: String,
    #[serde(default)]
    pub retain: bool,
}

#[derive(Serialize)]
pub struct PublishResponse {
    pub published: bool,
    pub topic: String,
}

pub async fn handle_publish(
    State(state): State<ApiState>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<PublishResponse>, (StatusCode, String)> {
    let bus = require_bus(&state)?;
    bus.publish(&req.topic, &req.payload, req.retain)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    tracing::info!(topic = %req.topic, retain = req.retain, "published via API");
    Ok(Json(PublishResponse {
        published: true,
        topic: req.topic,
    }))
}

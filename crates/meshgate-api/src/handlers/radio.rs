//! /radio/send and /advert handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{gateway_unavailable, ApiState};

// ── /radio/send (POST) ────────────────────────────────────────────────────────

/// Exactly one of `text` or `hex` must be set.
#[derive(Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub hex: Option<String>,
}

#[derive(Serialize)]
pub struct SendResponse {
    pub sent: bool,
    pub length: usize,
}

fn frame_from(req: SendRequest) -> Result<Bytes, (StatusCode, String)> {
    match (req.text, req.hex) {
        (Some(text), None) => Ok(Bytes::from(text.into_bytes())),
        (None, Some(h)) => hex::decode(h.trim())
            .map(Bytes::from)
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid hex: {}", e))),
        _ => Err((
            StatusCode::BAD_REQUEST,
            "expected exactly one of 'text' or 'hex'".to_string(),
        )),
    }
}

pub async fn handle_send(
    State(state): State<ApiState>,
    Json(req): Json<SendRequest>,
) -> Result<Json<SendResponse>, (StatusCode, String)> {
    let frame = frame_from(req)?;
    let length = frame.len();
    let sent = state
        .gateway
        .transmit(frame)
        .await
        .map_err(gateway_unavailable)?;
    tracing::info!(length, sent, "radio send via API");
    Ok(Json(SendResponse { sent, length }))
}

// ── /advert (POST) ────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct AdvertResponse {
    pub queued: bool,
}

pub async fn handle_advert(
    State(state): State<ApiState>,
) -> Result<Json<AdvertResponse>, (StatusCode, String)> {
    state
        .gateway
        .send_advert()
        .await
        .map_err(gateway_unavailable)?;
    Ok(Json(AdvertResponse { queued: true }))
}

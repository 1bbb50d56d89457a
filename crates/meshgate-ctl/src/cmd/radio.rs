//! Direct radio transmit and advert trigger.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::http::{base_url, post_json, post_json_body};

#[derive(Serialize)]
struct SendRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hex: Option<&'a str>,
}

#[derive(Deserialize)]
struct SendResponse {
    sent: bool,
    length: usize,
}

#[derive(Deserialize)]
struct AdvertResponse {
    queued: bool,
}

async fn send(port: u16, req: SendRequest<'_>) -> Result<()> {
    let resp: SendResponse = post_json_body(&format!("{}/radio/send", base_url(port)), &req).await?;
    if resp.sent {
        println!("Sent {} bytes.", resp.length);
    } else {
        println!("Transmit failed ({} bytes).", resp.length);
    }
    Ok(())
}

pub async fn cmd_send_text(port: u16, text: &str) -> Result<()> {
    send(
        port,
        SendRequest {
            text: Some(text),
            hex: None,
        },
    )
    .await
}

pub async fn cmd_send_hex(port: u16, hex: &str) -> Result<()> {
    send(
        port,
        SendRequest {
            text: None,
            hex: Some(hex),
        },
    )
    .await
}

pub async fn cmd_advert(port: u16) -> Result<()> {
    let resp: AdvertResponse = post_json(&format!("{}/advert", base_url(port))).await?;
    if resp.queued {
        println!("Advert queued.");
    }
    Ok(())
}

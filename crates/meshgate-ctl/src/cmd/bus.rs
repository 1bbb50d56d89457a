//! Bus publish and inspection commands.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::http::{base_url, get_json, post_json_body};

#[derive(Serialize)]
struct PublishRequest<'a> {
    topic: &'a str,
    payload: &'a str,
    retain: bool,
}

#[derive(Deserialize)]
struct PublishResponse {
    published: bool,
    topic: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    count: usize,
    messages: Vec<BusMessage>,
}

#[derive(Deserialize)]
struct BusMessage {
    topic: String,
    payload: String,
    retain: bool,
}

pub async fn cmd_publish(port: u16, topic: &str, payload: &str, retain: bool) -> Result<()> {
    let req = PublishRequest {
        topic,
        payload,
        retain,
    };
    let resp: PublishResponse =
        post_json_body(&format!("{}/bus/publish", base_url(port)), &req).await?;
    if resp.published {
        println!("Published to {}{}", resp.topic, if retain { " (retained)" } else { "" });
    }
    Ok(())
}

pub async fn cmd_retained(port: u16) -> Result<()> {
    let resp: MessagesResponse = get_json(&format!("{}/bus/retained", base_url(port))).await?;
    print_messages("Retained", &resp);
    Ok(())
}

pub async fn cmd_recent(port: u16) -> Result<()> {
    let resp: MessagesResponse = get_json(&format!("{}/bus/recent", base_url(port))).await?;
    print_messages("Recent", &resp);
    Ok(())
}

fn print_messages(title: &str, resp: &MessagesResponse) {
    if resp.messages.is_empty() {
        println!("No messages.");
        return;
    }
    println!("═══════════════════════════════════════");
    println!("  {} Messages ({})", title, resp.count);
    println!("═══════════════════════════════════════");
    for m in &resp.messages {
        let marker = if m.retain { "R" } else { " " };
        println!("  {} {}", marker, m.topic);
        println!("      {}", m.payload);
    }
}

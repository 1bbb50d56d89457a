//! Bus payload schema.
//!
//! Every publication is a JSON object with camelCase keys. Timestamps are
//! gateway uptime in milliseconds. The three bridgeable events (raw,
//! messages, adverts) are also accepted inbound through the `*Envelope`
//! types, which read only the fields needed to rebuild a radio frame.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::wire::BROADCAST_NODE_ID;

// ── Bridgeable events ─────────────────────────────────────────────────────────

/// `{prefix}/raw`: one radio frame, hex encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPacketEvent {
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub rssi: i32,
    #[serde(default)]
    pub snr: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    /// Uppercase hex on output; either case accepted on input.
    pub data: String,
    #[serde(default)]
    pub length: usize,
}

impl RawPacketEvent {
    pub fn new(frame: &[u8], rssi: i32, snr: f32, gateway: &str, timestamp: u64) -> Self {
        Self {
            timestamp,
            rssi,
            snr,
            gateway: Some(gateway.to_string()),
            data: hex::encode_upper(frame),
            length: frame.len(),
        }
    }
}

/// `{prefix}/messages`: a printable frame as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageEvent {
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub from: u32,
    #[serde(default = "broadcast")]
    pub to: u32,
    pub message: String,
    #[serde(rename = "type", default)]
    pub message_type: u8,
    #[serde(default)]
    pub rssi: i32,
    #[serde(default)]
    pub snr: f32,
    #[serde(default)]
    pub hops: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

fn broadcast() -> u32 {
    BROADCAST_NODE_ID
}

impl TextMessageEvent {
    pub fn new(
        from: u32,
        message: impl Into<String>,
        rssi: i32,
        snr: f32,
        gateway: &str,
        timestamp: u64,
    ) -> Self {
        Self {
            timestamp,
            from,
            to: BROADCAST_NODE_ID,
            message: message.into(),
            message_type: 0,
            rssi,
            snr,
            hops: 0,
            gateway: Some(gateway.to_string()),
        }
    }
}

/// `{prefix}/adverts`: a decoded discovery beacon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvertEvent {
    #[serde(default)]
    pub timestamp: u64,
    pub node_id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

impl AdvertEvent {
    pub fn new(advert: &crate::wire::AdvertMessage, gateway: &str, timestamp: u64) -> Self {
        Self {
            timestamp,
            node_id: advert.node_id,
            name: advert.node_name.clone(),
            lat: advert.latitude,
            lon: advert.longitude,
            gateway: Some(gateway.to_string()),
        }
    }

    pub fn to_advert(&self) -> crate::wire::AdvertMessage {
        crate::wire::AdvertMessage::new(self.node_id, self.name.as_str(), self.lat, self.lon)
    }
}

// ── Inbound envelopes ─────────────────────────────────────────────────────────
//
// Other gateways may publish extra fields or different numeric types. Only
// the payload-bearing field is required; every other field falls back to its
// default when it is missing or carries the wrong JSON type.

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose<T> {
    Value(T),
    Other(IgnoredAny),
}

fn loose<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(match Loose::<T>::deserialize(de)? {
        Loose::Value(v) => v,
        Loose::Other(_) => T::default(),
    })
}

/// Inbound `{prefix}/raw`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawEnvelope {
    pub data: String,
    /// `None` when absent or not a string; either way the sender is foreign.
    #[serde(default, deserialize_with = "loose")]
    pub gateway: Option<String>,
}

/// Inbound `{prefix}/messages`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageEnvelope {
    pub message: String,
    #[serde(default, deserialize_with = "loose")]
    pub gateway: Option<String>,
}

/// Inbound `{prefix}/adverts`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvertEnvelope {
    pub node_id: u32,
    #[serde(default, deserialize_with = "loose")]
    pub name: String,
    #[serde(default, deserialize_with = "loose")]
    pub lat: f64,
    #[serde(default, deserialize_with = "loose")]
    pub lon: f64,
    #[serde(default, deserialize_with = "loose")]
    pub gateway: Option<String>,
}

impl AdvertEnvelope {
    pub fn to_advert(&self) -> crate::wire::AdvertMessage {
        crate::wire::AdvertMessage::new(self.node_id, self.name.as_str(), self.lat, self.lon)
    }
}

// ── Gateway reports ───────────────────────────────────────────────────────────

/// Retained `{prefix}/gateway/{id}/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    pub online: bool,
    pub timestamp: u64,
    pub latitude: f64,
    pub longitude: f64,
}

/// `{prefix}/gateway/{id}/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStats {
    pub timestamp: u64,
    /// Seconds.
    pub uptime: u64,
    pub packets_received: u32,
    pub packets_sent: u32,
    pub packets_forwarded: u32,
    pub packets_failed: u32,
}

/// One entry of the neighbour report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborReport {
    pub node_id: u32,
    pub name: String,
    pub rssi: i32,
    pub snr: f32,
    pub latitude: f64,
    pub longitude: f64,
    pub last_seen: u64,
}

/// `{prefix}/gateway/{id}/neighbors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborsReport {
    pub timestamp: u64,
    pub gateway: String,
    pub count: usize,
    pub gateway_lat: f64,
    pub gateway_lon: f64,
    pub neighbors: Vec<NeighborReport>,
}

/// Retained `{prefix}/nodes/{%08X}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub node_id: u32,
    pub name: String,
    pub online: bool,
    pub timestamp: u64,
    pub gateway: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::AdvertMessage;
    use serde_json::{json, Value};

    #[test]
    fn raw_event_is_uppercase_hex() {
        let event = RawPacketEvent::new(&[0xde, 0xad, 0x01], -90, 7.5, "gw", 1234);
        let v: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            v,
            json!({
                "timestamp": 1234,
                "rssi": -90,
                "snr": 7.5,
                "gateway": "gw",
                "data": "DEAD01",
                "length": 3,
            })
        );
    }

    #[test]
    fn message_event_uses_wire_keys() {
        let event = TextMessageEvent::new(42, "hi", -80, 1.0, "gw", 5);
        let v: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(v["to"], json!(0xFFFF_FFFFu32));
        assert_eq!(v["type"], json!(0));
        assert_eq!(v["hops"], json!(0));
        assert_eq!(v["from"], json!(42));
        assert!(v.get("messageType").is_none());
    }

    #[test]
    fn advert_event_keys_are_camel_case() {
        let advert = AdvertMessage::new(0x2A, "node1", -33.87, 151.21);
        let v: Value = serde_json::to_value(AdvertEvent::new(&advert, "gw", 0)).unwrap();
        assert_eq!(v["nodeId"], json!(42));
        assert_eq!(v["lat"], json!(-33.87));
        assert_eq!(v["gateway"], json!("gw"));
    }

    #[test]
    fn inbound_envelopes_need_only_the_payload_field() {
        let raw: RawEnvelope = serde_json::from_str(r#"{"data":"0a0b"}"#).unwrap();
        assert_eq!(raw.data, "0a0b");
        assert_eq!(raw.gateway, None);

        let msg: MessageEnvelope = serde_json::from_str(r#"{"message":"hey"}"#).unwrap();
        assert_eq!(msg.message, "hey");

        let adv: AdvertEnvelope = serde_json::from_str(r#"{"nodeId":7,"gateway":"other"}"#).unwrap();
        assert_eq!(adv.gateway.as_deref(), Some("other"));
        assert_eq!(adv.to_advert(), AdvertMessage::new(7, "", 0.0, 0.0));
    }

    #[test]
    fn inbound_envelopes_without_payload_field_fail() {
        assert!(serde_json::from_str::<RawEnvelope>(r#"{"gateway":"x"}"#).is_err());
        assert!(serde_json::from_str::<RawEnvelope>(r#"{"data":12}"#).is_err());
        assert!(serde_json::from_str::<MessageEnvelope>(r#"{"gateway":"x"}"#).is_err());
        assert!(serde_json::from_str::<AdvertEnvelope>(r#"{"name":"x"}"#).is_err());
        assert!(serde_json::from_str::<AdvertEnvelope>("not json").is_err());
    }

    #[test]
    fn inbound_envelopes_ignore_foreign_field_types() {
        let raw: RawEnvelope = serde_json::from_str(
            r#"{"data":"0A","rssi":-70.5,"snr":"high","timestamp":-1,"length":1.0}"#,
        )
        .unwrap();
        assert_eq!(raw.data, "0A");

        let msg: MessageEnvelope = serde_json::from_str(
            r#"{"message":"hi","gateway":"other","timestamp":1700000000.5,"from":"x"}"#,
        )
        .unwrap();
        assert_eq!(msg.gateway.as_deref(), Some("other"));

        let adv: AdvertEnvelope = serde_json::from_str(
            r#"{"nodeId":9,"name":42,"lat":"south","lon":151,"timestamp":-1,"gateway":7}"#,
        )
        .unwrap();
        assert_eq!(adv.to_advert(), AdvertMessage::new(9, "", 0.0, 151.0));
        assert_eq!(adv.gateway, None);
    }

    #[test]
    fn stats_and_neighbors_shapes() {
        let stats = GatewayStats {
            timestamp: 61_000,
            uptime: 61,
            packets_received: 3,
            ..Default::default()
        };
        let v = serde_json::to_value(&stats).unwrap();
        assert_eq!(v["packetsReceived"], json!(3));
        assert_eq!(v["packetsFailed"], json!(0));

        let report = NeighborsReport {
            timestamp: 1,
            gateway: "gw".into(),
            count: 0,
            gateway_lat: 1.5,
            gateway_lon: 2.5,
            neighbors: vec![],
        };
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["gatewayLat"], json!(1.5));
        assert_eq!(v["neighbors"], json!([]));
    }
}

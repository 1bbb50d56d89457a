//! Radio to bus: publication, repeat and suppression.

use std::sync::Arc;

use bytes::Bytes;
use meshgate_services::bus::LoopbackBus;
use meshgate_services::{Gateway, RelayCore};

use crate::*;

const ADVERT: &[u8] = b"ADVERT 0000ABCD relay-1 -33.870000 151.210000";

#[tokio::test]
async fn text_frame_is_published_and_repeated() {
    let rig = Rig::start(test_config()).await;

    let snap = rig.hear(b"hello mesh").await;

    let raw = rig.published("MESHCORE/raw");
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0]["data"], "68656C6C6F206D657368");
    assert_eq!(raw[0]["length"], 10);
    assert_eq!(raw[0]["gateway"], GATEWAY_ID);

    let messages = rig.published("MESHCORE/messages");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["message"], "hello mesh");
    assert_eq!(messages[0]["from"], NODE_ID);
    assert_eq!(messages[0]["rssi"], -70);

    assert_eq!(rig.sent(), vec![b"hello mesh".to_vec()]);
    assert_eq!(snap.stats.packets_received, 1);
    assert_eq!(snap.stats.packets_forwarded, 1);
    assert_eq!(snap.stats.packets_sent, 1);
    rig.stop().await;
}

#[tokio::test]
async fn duplicate_frame_is_published_but_not_repeated() {
    let rig = Rig::start(test_config()).await;

    rig.hear(b"twice").await;
    let snap = rig.hear(b"twice").await;

    assert_eq!(rig.sent().len(), 1);
    assert_eq!(rig.published("MESHCORE/raw").len(), 2);
    assert_eq!(snap.stats.packets_received, 2);
    assert_eq!(snap.stats.packets_forwarded, 2);
    assert_eq!(snap.stats.packets_sent, 1);
    rig.stop().await;
}

#[tokio::test]
async fn advert_publishes_in_order_and_records_neighbor() {
    let rig = Rig::start(test_config()).await;

    let snap = rig.hear(ADVERT).await;

    let order: Vec<String> = rig
        .published_topics()
        .into_iter()
        .filter(|t| !t.contains("/gateway/"))
        .collect();
    assert_eq!(
        order,
        vec![
            "MESHCORE/adverts",
            "MESHCORE/nodes/0000ABCD",
            "MESHCORE/raw",
            "MESHCORE/messages",
        ]
    );

    let advert = &rig.published("MESHCORE/adverts")[0];
    assert_eq!(advert["nodeId"], 0xABCD);
    assert_eq!(advert["name"], "relay-1");
    assert_eq!(rig.published("MESHCORE/messages")[0]["from"], 0xABCD);

    assert_eq!(snap.neighbors.len(), 1);
    assert_eq!(snap.neighbors[0].name, "relay-1");
    assert!(rig
        .bus
        .retained()
        .iter()
        .any(|m| m.topic == "MESHCORE/nodes/0000ABCD" && m.payload.contains("\"online\":true")));
    rig.stop().await;
}

#[tokio::test]
async fn denied_advert_is_dropped_entirely() {
    let mut config = test_config();
    config.access.deny_enabled = true;
    config.access.denylist = vec!["0x0000ABCD".into()];
    let rig = Rig::start(config).await;

    let snap = rig.hear(ADVERT).await;

    assert!(snap.neighbors.is_empty());
    assert!(rig.published("MESHCORE/adverts").is_empty());
    assert!(rig.published("MESHCORE/raw").is_empty());
    assert!(rig.sent().is_empty());
    assert_eq!(snap.stats.packets_received, 1);
    assert_eq!(snap.stats.packets_forwarded, 0);
    rig.stop().await;
}

#[tokio::test]
async fn denylist_ignored_when_disabled() {
    let mut config = test_config();
    config.access.denylist = vec!["0000ABCD".into()];
    let rig = Rig::start(config).await;

    let snap = rig.hear(ADVERT).await;

    assert_eq!(snap.neighbors.len(), 1);
    assert_eq!(rig.sent().len(), 1);
    rig.stop().await;
}

#[tokio::test]
async fn binary_frame_skips_decoded_message() {
    let rig = Rig::start(test_config()).await;

    rig.hear(&[0x00, 0xFF, 0x10]).await;

    assert_eq!(rig.published("MESHCORE/raw")[0]["data"], "00FF10");
    assert!(rig.published("MESHCORE/messages").is_empty());
    assert_eq!(rig.sent(), vec![vec![0x00, 0xFF, 0x10]]);
    rig.stop().await;
}

#[tokio::test]
async fn zero_hops_publishes_without_repeating() {
    let mut config = test_config();
    config.repeater.max_hops = 0;
    let rig = Rig::start(config).await;

    let snap = rig.hear(b"stay local").await;

    assert!(rig.sent().is_empty());
    assert_eq!(rig.published("MESHCORE/raw").len(), 1);
    assert_eq!(snap.stats.packets_sent, 0);
    rig.stop().await;
}

#[tokio::test]
async fn raw_and_decoded_toggles_are_honoured() {
    let mut config = test_config();
    config.bus.publish_raw = false;
    config.bus.publish_decoded = false;
    let rig = Rig::start(config).await;

    let snap = rig.hear(b"quiet").await;

    assert!(rig.published("MESHCORE/raw").is_empty());
    assert!(rig.published("MESHCORE/messages").is_empty());
    assert_eq!(snap.stats.packets_forwarded, 1);
    rig.stop().await;
}

#[tokio::test]
async fn radio_only_mode_still_repeats() {
    let radio = RecordingRadio::default();
    let core = RelayCore::from_config(&test_config());
    let (gateway, handle) =
        Gateway::new(core, radio.clone(), None::<Arc<LoopbackBus>>, CountingHost::default());
    let task = tokio::spawn(gateway.run());

    handle.frame(Bytes::from_static(b"offline"), -90, 1.0).await.unwrap();
    let snap = handle.snapshot().await.unwrap();

    assert_eq!(radio.sent.lock().unwrap().as_slice(), &[b"offline".to_vec()]);
    assert!(!snap.bus_connected);
    assert_eq!(snap.stats.packets_forwarded, 0);
    assert_eq!(snap.stats.packets_sent, 1);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

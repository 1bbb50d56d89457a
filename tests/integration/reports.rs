//! Gateway status, periodic reports and our own advert.

use crate::*;

#[tokio::test]
async fn status_is_retained_online_then_offline() {
    let mut config = test_config();
    config.location.latitude = 51.5;
    let rig = Rig::start(config).await;
    let bus = rig.bus.clone();
    let topic = format!("MESHCORE/gateway/{GATEWAY_ID}/status");

    let online = bus.retained();
    let status = online.iter().find(|m| m.topic == topic).unwrap();
    let value: serde_json::Value = serde_json::from_str(&status.payload).unwrap();
    assert_eq!(value["online"], true);
    assert_eq!(value["latitude"], 51.5);

    rig.stop().await;

    let offline = bus.retained();
    let status = offline.iter().find(|m| m.topic == topic).unwrap();
    assert!(status.payload.contains("\"online\":false"));
}

#[tokio::test]
async fn stats_report_carries_counters_and_neighbors() {
    let rig = Rig::start(test_config()).await;
    rig.hear(b"ADVERT 00000042 n1 0.000000 0.000000").await;
    rig.hear(b"plain").await;

    rig.handle.publish_stats().await.unwrap();
    rig.handle.snapshot().await.unwrap();

    let stats = rig.published(&format!("MESHCORE/gateway/{GATEWAY_ID}/stats"));
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0]["packetsReceived"], 2);
    assert_eq!(stats[0]["packetsForwarded"], 2);
    assert_eq!(stats[0]["packetsSent"], 2);

    let neighbors = rig.published(&format!("MESHCORE/gateway/{GATEWAY_ID}/neighbors"));
    assert_eq!(neighbors[0]["count"], 1);
    assert_eq!(neighbors[0]["gateway"], GATEWAY_ID);
    assert_eq!(neighbors[0]["neighbors"][0]["nodeId"], 0x42);
    assert_eq!(neighbors[0]["neighbors"][0]["name"], "n1");
    rig.stop().await;
}

#[tokio::test]
async fn own_advert_is_transmitted_and_published() {
    let mut config = test_config();
    config.location.latitude = -33.87;
    config.location.longitude = 151.21;
    let rig = Rig::start(config).await;

    rig.handle.send_advert().await.unwrap();
    rig.handle.snapshot().await.unwrap();

    assert_eq!(
        rig.sent(),
        vec![b"ADVERT 00000A0A TestGW -33.870000 151.210000".to_vec()]
    );
    let adverts = rig.published("MESHCORE/adverts");
    assert_eq!(adverts.len(), 1);
    assert_eq!(adverts[0]["nodeId"], NODE_ID);
    assert_eq!(adverts[0]["gateway"], GATEWAY_ID);

    // the echo of our own advert must not be bridged back to the radio
    rig.flush().await;
    assert_eq!(rig.sent().len(), 1);
    rig.stop().await;
}

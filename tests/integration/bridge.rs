//! Bus to radio: commands, bridged payloads and the self-loop guard.

use std::sync::atomic::Ordering;

use crate::*;

#[tokio::test]
async fn send_command_goes_out_over_radio() {
    let rig = Rig::start(test_config()).await;

    rig.inject("MESHCORE/commands/send", "ping");

    assert!(wait_until(|| rig.sent() == vec![b"ping".to_vec()]).await);
    rig.stop().await;
}

#[tokio::test]
async fn restart_command_reaches_host() {
    let rig = Rig::start(test_config()).await;

    rig.inject("MESHCORE/commands/restart", "");

    assert!(wait_until(|| rig.host.restarts.load(Ordering::SeqCst) == 1).await);
    rig.stop().await;
}

#[tokio::test]
async fn commands_below_prefix_accepted_when_region_unset() {
    let mut config = test_config();
    config.bus.country = "au".into();
    let rig = Rig::start(config).await;

    rig.inject("MESHCORE/AU/NSW/commands/send", "one level");
    rig.inject("MESHCORE/AU/NSW/SYD/commands/send", "two levels");
    rig.inject("MESHCORE/AU/NSW/SYD/CBD/commands/send", "too deep");
    rig.flush().await;

    assert_eq!(rig.sent(), vec![b"one level".to_vec(), b"two levels".to_vec()]);
    rig.stop().await;
}

#[tokio::test]
async fn region_pins_commands_to_exact_prefix() {
    let mut config = test_config();
    config.bus.country = "au".into();
    config.bus.region = "nsw".into();
    let rig = Rig::start(config).await;

    rig.inject("MESHCORE/AU/NSW/SYD/commands/send", "nested");
    rig.inject("MESHCORE/AU/NSW/commands/send", "direct");
    rig.flush().await;

    assert_eq!(rig.sent(), vec![b"direct".to_vec()]);
    rig.stop().await;
}

#[tokio::test]
async fn foreign_raw_frame_is_bridged() {
    let rig = Rig::start(test_config()).await;

    rig.inject("MESHCORE/raw", r#"{"data":"CAFE","gateway":"other-gw"}"#);
    rig.flush().await;

    assert_eq!(rig.sent(), vec![vec![0xCA, 0xFE]]);
    rig.stop().await;
}

#[tokio::test]
async fn foreign_message_and_advert_are_bridged() {
    let rig = Rig::start(test_config()).await;

    rig.inject(
        "MESHCORE/messages",
        r#"{"message":"from afar","gateway":"other-gw"}"#,
    );
    rig.inject(
        "MESHCORE/adverts",
        r#"{"nodeId":4660,"name":"far-node","lat":1.5,"lon":-2.25,"gateway":"other-gw"}"#,
    );
    rig.flush().await;

    assert_eq!(
        rig.sent(),
        vec![
            b"from afar".to_vec(),
            b"ADVERT 00001234 far-node 1.500000 -2.250000".to_vec(),
        ]
    );
    rig.stop().await;
}

#[tokio::test]
async fn own_publications_are_not_bridged_back() {
    let rig = Rig::start(test_config()).await;
    let own = GATEWAY_ID;

    rig.inject("MESHCORE/raw", &format!(r#"{{"data":"CAFE","gateway":"{own}"}}"#));
    rig.inject(
        "MESHCORE/messages",
        &format!(r#"{{"message":"echo","gateway":"{own}"}}"#),
    );
    rig.inject(
        "MESHCORE/adverts",
        &format!(r#"{{"nodeId":1,"name":"me","lat":0,"lon":0,"gateway":"{own}"}}"#),
    );
    rig.flush().await;

    assert!(rig.sent().is_empty());
    rig.stop().await;
}

#[tokio::test]
async fn gateway_echo_of_heard_frame_is_not_retransmitted() {
    let mut config = test_config();
    config.repeater.max_hops = 0;
    let rig = Rig::start(config).await;

    // raw and messages come straight back through our own subscriptions
    rig.hear(b"heard once").await;
    rig.flush().await;

    assert!(rig.sent().is_empty());
    rig.stop().await;
}

#[tokio::test]
async fn denied_node_advert_is_not_bridged() {
    let mut config = test_config();
    config.access.deny_enabled = true;
    config.access.denylist = vec!["1234".into()];
    let rig = Rig::start(config).await;

    rig.inject(
        "MESHCORE/adverts",
        r#"{"nodeId":4660,"name":"far-node","gateway":"other-gw"}"#,
    );
    rig.flush().await;

    assert!(rig.sent().is_empty());
    rig.stop().await;
}

#[tokio::test]
async fn report_topics_and_bad_payloads_are_ignored() {
    let rig = Rig::start(test_config()).await;

    rig.inject("MESHCORE/status", r#"{"online":true}"#);
    rig.inject("MESHCORE/stats", r#"{"uptime":5}"#);
    rig.inject("MESHCORE/raw", "not json");
    rig.inject("MESHCORE/raw", r#"{"data":"ZZ","gateway":"other-gw"}"#);
    rig.inject("MESHCORE/raw", r#"{"data":"","gateway":"other-gw"}"#);
    rig.flush().await;

    assert!(rig.sent().is_empty());
    rig.stop().await;
}

#[tokio::test]
async fn bridging_off_leaves_payload_topics_unsubscribed() {
    let mut config = test_config();
    config.bus.bridge_all = false;
    let rig = Rig::start(config).await;

    assert!(rig.bus.subscriptions().iter().all(|s| s.contains("/commands/")));
    rig.inject("MESHCORE/raw", r#"{"data":"CAFE","gateway":"other-gw"}"#);
    rig.flush().await;

    assert!(rig.sent().is_empty());
    rig.stop().await;
}

//! Ring formation through sequential joins
//! Checks neighbour pointers and finger tables against the sorted membership

use chord_integration_tests::integration::{NetworkInvariants, TestHarness};
use chord_lib::dht_messages::NodeSnapshot;
use chord_lib::Identifier;
use chord_node::node_identifier;

fn id(hex: &str) -> Identifier {
    Identifier::from_hex(hex).expect("valid hex")
}

#[tokio::test]
async fn test_single_node_network() {
    let harness = TestHarness::new();
    let addresses = harness
        .build_ring(&[node_identifier("localhost", 8001)], 8001)
        .await
        .expect("Failed to create network");

    let snapshot = harness.snapshot(addresses[0]).await.unwrap();
    let node = harness.get_node(addresses[0]).await.expect("Node should exist");
    assert_eq!(snapshot, NodeSnapshot::solo(node.info));

    let fingers = harness.fingers(addresses[0]).await.unwrap();
    assert_eq!(fingers.len(), 160);
    assert!(fingers.iter().all(|(_, finger)| *finger == node.info));
}

#[tokio::test]
async fn test_two_node_network() {
    let harness = TestHarness::new();
    let a = harness.add_node(node_identifier("localhost", 8001), 8001).await.unwrap();
    let b = harness.add_node(node_identifier("localhost", 8002), 8002).await.unwrap();

    harness.connect_node_to_network(a, None).await.unwrap();
    harness.connect_node_to_network(b, Some(a)).await.unwrap();

    let snap_a = harness.snapshot(a).await.unwrap();
    let snap_b = harness.snapshot(b).await.unwrap();
    assert_eq!(snap_a.successor.address, b);
    assert_eq!(snap_a.predecessor.address, b);
    assert_eq!(snap_b.successor.address, a);
    assert_eq!(snap_b.predecessor.address, a);

    // Mutual consistency: each node's successor names it as predecessor
    let after_a = harness.snapshot(snap_a.successor.address).await.unwrap();
    let after_b = harness.snapshot(snap_b.successor.address).await.unwrap();
    assert_eq!(after_a.predecessor.address, a);
    assert_eq!(after_b.predecessor.address, b);

    let violations = NetworkInvariants::check_all(&harness).await;
    assert!(violations.is_empty(), "{:?}", violations);
}

#[tokio::test]
async fn test_three_node_fingers_are_exact() {
    let harness = TestHarness::new();
    let ids = [
        id("2000000000000000000000000000000000000000"),
        id("6000000000000000000000000000000000000000"),
        id("C000000000000000000000000000000000000000"),
    ];
    harness.build_ring(&ids, 8001).await.unwrap();

    let violations = NetworkInvariants::check_all(&harness).await;
    assert!(violations.is_empty(), "{:?}", violations);
    let stale = NetworkInvariants::check_finger_accuracy(&harness).await;
    assert!(stale.is_empty(), "{:?}", stale);
}

#[tokio::test]
async fn test_eight_node_ring_joined_out_of_order() {
    let harness = TestHarness::new();
    let ids: Vec<Identifier> = ["80", "10", "F0", "30", "50", "A0", "70", "D0"]
        .iter()
        .map(|lead| id(&format!("{}{}", lead, "0".repeat(38))))
        .collect();
    harness.build_ring(&ids, 8101).await.unwrap();

    let violations = NetworkInvariants::check_all(&harness).await;
    assert!(violations.is_empty(), "{:?}", violations);
    let stale = NetworkInvariants::check_finger_accuracy(&harness).await;
    assert!(stale.is_empty(), "{:?}", stale);
}

#[tokio::test]
async fn test_tightly_packed_identifiers() {
    let harness = TestHarness::new();
    let ids = [id("40"), id("41"), id("42"), id("43")];
    harness.build_ring(&ids, 8201).await.unwrap();

    let violations = NetworkInvariants::check_all(&harness).await;
    assert!(violations.is_empty(), "{:?}", violations);
    let stale = NetworkInvariants::check_finger_accuracy(&harness).await;
    assert!(stale.is_empty(), "{:?}", stale);
}

#[tokio::test]
async fn test_hashed_port_identifiers() {
    let harness = TestHarness::new();
    let ids: Vec<Identifier> = (8301..8306)
        .map(|port| node_identifier("localhost", port))
        .collect();
    harness.build_ring(&ids, 8301).await.unwrap();

    let violations = NetworkInvariants::check_all(&harness).await;
    assert!(violations.is_empty(), "{:?}", violations);
    let stale = NetworkInvariants::check_finger_accuracy(&harness).await;
    assert!(stale.is_empty(), "{:?}", stale);
}

//! Populate and FindKey across a ring

use chord_integration_tests::integration::TestHarness;
use chord_lib::dataset::{record_key, DatasetBuilder};
use chord_lib::dht_messages::Dataset;
use chord_lib::Identifier;
use chord_node::node_identifier;

const CSV: &str = "player id,name,position,year,team,games\n\
                   billdemory/2512778,Bill Demory,QB,1974,NYJ,14\n\
                   billdemory/2512778,Bill Demory,QB,1974,SEA,2\n\
                   joenamath/2508048,Joe Namath,QB,1974,NYJ,14\n\
                   kenstabler/2506838,Ken Stabler,QB,1976,OAK,12\n\
                   terrybradshaw/2500296,Terry Bradshaw,QB,1975,PIT,14\n";

fn record(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

async fn ring(harness: &TestHarness, first_port: u16, size: u16) -> Vec<std::net::SocketAddr> {
    let ids: Vec<Identifier> = (first_port..first_port + size)
        .map(|port| node_identifier("localhost", port))
        .collect();
    harness.build_ring(&ids, first_port).await.unwrap()
}

#[tokio::test]
async fn test_find_key_on_empty_ring_is_not_found() {
    let harness = TestHarness::new();
    let addresses = ring(&harness, 8501, 3).await;

    for address in addresses {
        let found = harness.find_key(address, record_key("nobody", "1900")).await.unwrap();
        assert_eq!(found, None);
    }
}

#[tokio::test]
async fn test_single_key_round_trip() {
    let harness = TestHarness::new();
    let addresses = ring(&harness, 8511, 1).await;
    let key = record_key("joenamath/2508048", "1974");

    assert_eq!(harness.find_key(addresses[0], key).await.unwrap(), None);

    let mut dataset = Dataset::new();
    dataset.insert(key, vec![record(&["r"])]);
    harness.populate(addresses[0], dataset).await.unwrap();

    assert_eq!(
        harness.find_key(addresses[0], key).await.unwrap(),
        Some(vec![record(&["r"])])
    );
}

#[tokio::test]
async fn test_populated_records_are_found_from_every_node() {
    let harness = TestHarness::new();
    let addresses = ring(&harness, 8521, 5).await;
    let dataset = DatasetBuilder::from_csv(CSV).finish();

    harness.populate(addresses[2], dataset.clone()).await.unwrap();

    for address in &addresses {
        for (key, records) in &dataset {
            let found = harness.find_key(*address, *key).await.unwrap();
            assert_eq!(found.as_ref(), Some(records));
        }
    }

    let demory = harness
        .find_key(addresses[0], record_key("billdemory/2512778", "1974"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        demory,
        vec![
            record(&["Bill Demory", "QB", "NYJ", "14"]),
            record(&["Bill Demory", "QB", "SEA", "2"]),
        ]
    );
}

#[tokio::test]
async fn test_each_key_is_held_by_its_owner_only() {
    let harness = TestHarness::new();
    let addresses = ring(&harness, 8531, 4).await;
    let dataset = DatasetBuilder::from_csv(CSV).finish();
    harness.populate(addresses[0], dataset.clone()).await.unwrap();

    let nodes = harness.node_refs().await;
    for key in dataset.keys() {
        let owner = harness.find_successor(addresses[1], *key).await.unwrap();
        for node in &nodes {
            let chord_node = harness.get_node(node.address).await.unwrap();
            let key = *key;
            let held = chord_node
                .state()
                .with(move |state| state.records(&key).is_some())
                .await
                .unwrap();
            assert_eq!(held, *node == owner, "key {} on {}", key.short(), node);
        }
    }
}

#[tokio::test]
async fn test_populate_is_idempotent() {
    let harness = TestHarness::new();
    let addresses = ring(&harness, 8541, 3).await;
    let dataset = DatasetBuilder::from_csv(CSV).finish();

    harness.populate(addresses[0], dataset.clone()).await.unwrap();
    let mut first = Vec::new();
    for key in dataset.keys() {
        first.push(harness.find_key(addresses[1], *key).await.unwrap());
    }

    // Same dataset again, through a different node
    harness.populate(addresses[2], dataset.clone()).await.unwrap();
    let mut second = Vec::new();
    for key in dataset.keys() {
        second.push(harness.find_key(addresses[1], *key).await.unwrap());
    }

    assert_eq!(first, second);
    assert!(first.iter().all(|records| records.is_some()));
}

#[tokio::test]
async fn test_find_key_survives_an_unreachable_neighbour() {
    let harness = TestHarness::new();
    let addresses = ring(&harness, 8551, 4).await;
    let key = record_key("kenstabler/2506838", "1976");
    let mut dataset = Dataset::new();
    dataset.insert(key, vec![record(&["Ken Stabler"])]);
    harness.populate(addresses[0], dataset).await.unwrap();

    let owner = harness.find_successor(addresses[0], key).await.unwrap();
    let entry = harness
        .node_refs()
        .await
        .into_iter()
        .find(|n| n.address != owner.address)
        .unwrap();
    let snapshot = harness.snapshot(entry.address).await.unwrap();

    // Cut one side of the entry node off; the other side still reaches the owner
    for side in [snapshot.predecessor, snapshot.successor] {
        if side.address == owner.address {
            continue;
        }
        harness.fail_node(side.address).await;
        let found = harness.find_key(entry.address, key).await.unwrap();
        assert_eq!(found, Some(vec![record(&["Ken Stabler"])]));
        harness.recover_node(side.address).await;
    }
}

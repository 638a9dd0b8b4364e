//! Integration tests for Chord rings
//!
//! Rings of real nodes run in-process over the simulated network in
//! [`integration`]; the tests here exercise the harness itself.


#[cfg(test)]
mod tests {
    use crate::integration::{local_address, NetworkInvariants, TestHarness};
    use chord_lib::dht_messages::{DhtRequest, DhtResponse};
    use chord_lib::Identifier;
    use chord_node::RpcError;

    fn id(hex: &str) -> Identifier {
        Identifier::from_hex(hex).unwrap()
    }

    #[tokio::test]
    async fn test_unjoined_node_is_not_ready() {
        let harness = TestHarness::new();
        let address = harness.add_node(id("10"), 8001).await.unwrap();

        let response = harness
            .external_call(address, DhtRequest::GetNeighbors)
            .await
            .unwrap();
        assert_eq!(response, DhtResponse::NotReady);
    }

    #[tokio::test]
    async fn test_duplicate_address_is_rejected() {
        let harness = TestHarness::new();
        harness.add_node(id("10"), 8001).await.unwrap();
        assert!(harness.add_node(id("20"), 8001).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_node_looks_unreachable() {
        let harness = TestHarness::new();
        let address = harness.add_node(id("10"), 8001).await.unwrap();
        harness.connect_node_to_network(address, None).await.unwrap();

        harness.fail_node(address).await;
        let err = harness
            .external_call(address, DhtRequest::GetNeighbors)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RpcError>(),
            Some(RpcError::NoResponse { .. })
        ));

        harness.recover_node(address).await;
        assert!(harness
            .external_call(address, DhtRequest::GetNeighbors)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unknown_address_looks_unreachable() {
        let harness = TestHarness::new();
        assert!(harness
            .external_call(local_address(8999), DhtRequest::FindLowestNode)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_invariants_on_simple_network() {
        let harness = TestHarness::new();
        let ids = [
            id("2000000000000000000000000000000000000000"),
            id("6000000000000000000000000000000000000000"),
            id("C000000000000000000000000000000000000000"),
        ];
        harness.build_ring(&ids, 8001).await.unwrap();

        let ring_violations = NetworkInvariants::check_ring_connectivity(&harness).await;
        assert!(ring_violations.is_empty(), "Ring should be connected: {:?}", ring_violations);

        let all_violations = NetworkInvariants::check_all(&harness).await;
        assert!(all_violations.is_empty(), "All invariants should hold: {:?}", all_violations);
        assert!(harness.network().delivered_count() > 0);
    }
}

use std::collections::HashMap;

use chord_lib::dht_messages::{Dataset, DhtRequest, DhtResponse, Direction, NodeRef, Record};
use chord_lib::Identifier;
use log::debug;

use crate::error::NodeError;
use crate::network_client::NetworkClient;
use crate::node::ChordNode;

/// The records this node is responsible for.
#[derive(Debug, Default)]
pub struct Shard {
    records: HashMap<Identifier, Vec<Record>>,
}

impl Shard {
    /// Replaces anything already filed under `key`.
    pub fn insert(&mut self, key: Identifier, records: Vec<Record>) {
        self.records.insert(key, records);
    }

    pub fn get(&self, key: &Identifier) -> Option<&Vec<Record>> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The next hops a flooded request takes from one node.
///
/// The entry node relays both ways and names itself as origin; every relay
/// keeps going in its own direction and stops before reaching the origin
/// again, so each node sees the request once per direction at most.
struct Flood {
    origin: Option<u16>,
    hops: Vec<(NodeRef, Direction)>,
}

impl Flood {
    fn plan(me: NodeRef, successor: NodeRef, predecessor: NodeRef, direction: Direction, origin: Option<u16>) -> Self {
        let origin = match direction {
            Direction::Both => Some(me.port()),
            _ => origin,
        };
        let toward_predecessor = matches!(direction, Direction::Both | Direction::TowardPredecessor);
        let toward_successor = matches!(direction, Direction::Both | Direction::TowardSuccessor);

        let mut hops = Vec::with_capacity(2);
        let usable = |next: &NodeRef| next.id != me.id && !next.is_origin(origin);
        if toward_predecessor && usable(&predecessor) {
            hops.push((predecessor, Direction::TowardPredecessor));
        }
        // In a two-node ring the other node is both neighbours; one visit covers it
        if toward_successor && usable(&successor) && !hops.iter().any(|(n, _)| n.id == successor.id) {
            hops.push((successor, Direction::TowardSuccessor));
        }
        Self { origin, hops }
    }
}

impl<T: NetworkClient> ChordNode<T> {
    /// Keeps the part of `dataset` this node owns and relays the dataset on
    /// around the ring.
    pub async fn populate(
        &self,
        dataset: Dataset,
        direction: Direction,
        origin: Option<u16>,
    ) -> Result<NodeRef, NodeError> {
        let (stored, held, snapshot, dataset) = self
            .state
            .with(move |state| {
                let stored = state.store_owned(&dataset);
                (stored, state.shard().len(), state.snapshot(), dataset)
            })
            .await?;
        log_info!(
            self.info.address,
            "Stored {} of {} keys from populate ({} held)",
            stored,
            dataset.len(),
            held
        );

        let flood = Flood::plan(
            self.info,
            snapshot.successor,
            snapshot.predecessor,
            direction,
            origin,
        );
        for (next, direction) in flood.hops {
            let request = DhtRequest::Populate {
                dataset: dataset.clone(),
                direction,
            };
            match self.call(next, request, flood.origin).await {
                Ok(DhtResponse::Ack(_)) => debug!("Populate relayed to {}", next),
                Ok(other) => {
                    log_error!(self.info.address, "Unexpected populate reply from {}: {:?}", next, other)
                }
                Err(e) => log_error!(self.info.address, "Failed to relay populate to {}: {}", next, e),
            }
        }

        Ok(self.info)
    }

    /// Looks for `id` locally, then asks around the ring: the predecessor
    /// side first, then the successor side.
    pub async fn find_record(
        &self,
        id: Identifier,
        direction: Direction,
        origin: Option<u16>,
    ) -> Result<Option<Vec<Record>>, NodeError> {
        let (local, snapshot) = self
            .state
            .with(move |state| (state.records(&id), state.snapshot()))
            .await?;
        if let Some(records) = local {
            log_info!(self.info.address, "Found key {} locally", id.short());
            return Ok(Some(records));
        }

        let flood = Flood::plan(
            self.info,
            snapshot.successor,
            snapshot.predecessor,
            direction,
            origin,
        );
        for (next, direction) in flood.hops {
            match self
                .call(next, DhtRequest::FindKey { id, direction }, flood.origin)
                .await
            {
                Ok(DhtResponse::Records(Some(records))) => return Ok(Some(records)),
                Ok(DhtResponse::Records(None)) => {}
                Ok(other) => {
                    log_error!(self.info.address, "Unexpected find key reply from {}: {:?}", next, other)
                }
                Err(e) => log_error!(self.info.address, "Failed to ask {} for key: {}", next, e),
            }
        }

        debug!("Key {} not found from {}", id.short(), self.info);
        Ok(None)
    }
}

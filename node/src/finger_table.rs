use chord_lib::dht_messages::NodeRef;
use chord_lib::{in_interval, ring_start, Identifier, Interval, M};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finger {
    pub start: Identifier,
    pub node: NodeRef,
}

/// Routing entries indexed 1..=M; entry i starts at (owner + 2^(i-1)).
#[derive(Debug, Clone)]
pub struct FingerTable {
    owner: Identifier,
    fingers: Vec<Finger>,
}

impl FingerTable {
    /// Every entry points at `owner`, as on a ring with a single node.
    pub fn solo(owner: NodeRef) -> Self {
        let fingers = (1..=M)
            .map(|i| Finger {
                start: ring_start(&owner.id, i),
                node: owner,
            })
            .collect();
        Self {
            owner: owner.id,
            fingers,
        }
    }

    pub fn start(&self, index: usize) -> Option<Identifier> {
        self.finger(index).map(|f| f.start)
    }

    pub fn get(&self, index: usize) -> Option<NodeRef> {
        self.finger(index).map(|f| f.node)
    }

    fn finger(&self, index: usize) -> Option<&Finger> {
        index.checked_sub(1).and_then(|i| self.fingers.get(i))
    }

    /// Returns false when `index` is outside 1..=M.
    pub fn set(&mut self, index: usize, node: NodeRef) -> bool {
        match index.checked_sub(1).and_then(|i| self.fingers.get_mut(i)) {
            Some(finger) => {
                finger.node = node;
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self, node: NodeRef) {
        for finger in &mut self.fingers {
            finger.node = node;
        }
    }

    /// Highest-index finger whose node lies strictly inside (owner, id),
    /// skipping the node listening on `exclude`. `None` when no finger
    /// qualifies.
    pub fn closest_preceding(&self, id: &Identifier, exclude: Option<u16>) -> Option<NodeRef> {
        self.fingers
            .iter()
            .rev()
            .map(|f| f.node)
            .find(|node| {
                !node.is_origin(exclude) && in_interval(&self.owner, &node.id, id, Interval::Open)
            })
    }

    /// (index, finger) pairs from 1 to M.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Finger)> {
        self.fingers.iter().enumerate().map(|(i, f)| (i + 1, f))
    }

    pub fn len(&self) -> usize {
        self.fingers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingers.is_empty()
    }
}

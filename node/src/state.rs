use chord_lib::dht_messages::{Dataset, NodeRef, NodeSnapshot, Record};
use chord_lib::{in_interval, is_between, Identifier, Interval};
use tokio::sync::{mpsc, oneshot};

use crate::error::NodeError;
use crate::finger_table::FingerTable;
use crate::shard::Shard;

/// Everything about a node that changes after construction. It is owned by
/// one task (see [`StateHandle`]), so none of these methods ever waits on
/// the network.
#[derive(Debug)]
pub struct RingState {
    me: NodeRef,
    successor: NodeRef,
    predecessor: NodeRef,
    fingers: FingerTable,
    shard: Shard,
    joined: bool,
}

impl RingState {
    pub fn new(me: NodeRef) -> Self {
        Self {
            me,
            successor: me,
            predecessor: me,
            fingers: FingerTable::solo(me),
            shard: Shard::default(),
            joined: false,
        }
    }

    pub fn me(&self) -> NodeRef {
        self.me
    }

    pub fn successor(&self) -> NodeRef {
        self.successor
    }

    pub fn predecessor(&self) -> NodeRef {
        self.predecessor
    }

    pub fn fingers(&self) -> &FingerTable {
        &self.fingers
    }

    pub fn fingers_mut(&mut self) -> &mut FingerTable {
        &mut self.fingers
    }

    pub fn shard(&self) -> &Shard {
        &self.shard
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            node: self.me,
            successor: self.successor,
            predecessor: self.predecessor,
        }
    }

    pub fn is_solo(&self) -> bool {
        self.successor.id == self.me.id
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn mark_joined(&mut self) {
        self.joined = true;
    }

    /// First node of a new ring: every pointer refers to this node.
    pub fn init_solo(&mut self) {
        self.successor = self.me;
        self.predecessor = self.me;
        self.fingers.reset(self.me);
    }

    /// The successor and finger 1 always move together.
    pub fn set_successor(&mut self, node: NodeRef) {
        self.successor = node;
        self.fingers.set(1, node);
    }

    pub fn set_predecessor(&mut self, node: NodeRef) {
        self.predecessor = node;
    }

    /// Takes `candidate` as successor if this node is alone or the candidate
    /// sits strictly between this node and its current successor.
    pub fn offer_successor(&mut self, candidate: NodeRef) -> bool {
        if candidate.id == self.me.id {
            return false;
        }
        if self.is_solo()
            || in_interval(&self.me.id, &candidate.id, &self.successor.id, Interval::Open)
        {
            self.set_successor(candidate);
            return true;
        }
        false
    }

    /// Takes `candidate` as predecessor unconditionally. A lone node also
    /// takes it as successor, which closes a two-node ring.
    pub fn accept_predecessor(&mut self, candidate: NodeRef) {
        if candidate.id == self.me.id {
            return;
        }
        self.predecessor = candidate;
        if self.is_solo() {
            self.set_successor(candidate);
        }
    }

    /// Replaces finger `index` with `node` when `node` is a closer fit for
    /// that finger's start. Returns whether the entry changed.
    pub fn update_finger(&mut self, node: NodeRef, index: usize) -> bool {
        let (Some(start), Some(current)) = (self.fingers.start(index), self.fingers.get(index))
        else {
            return false;
        };
        if node.id == current.id || node.id == self.me.id {
            return false;
        }

        // A finger already sitting on its start cannot be improved on
        let closer = node.id == start
            || (current.id != start
                && in_interval(&start, &node.id, &current.id, Interval::LeftClosed));
        if closer {
            self.fingers.set(index, node);
            if index == 1 {
                self.successor = node;
            }
        }
        closer
    }

    pub fn closest_preceding_finger(&self, id: &Identifier, origin: Option<u16>) -> Option<NodeRef> {
        self.fingers.closest_preceding(id, origin)
    }

    /// A node owns `(predecessor, self]`; a node alone owns every key.
    pub fn owns(&self, key: &Identifier) -> bool {
        self.predecessor.id == self.me.id || is_between(key, &self.predecessor.id, &self.me.id)
    }

    /// Stores the entries of `dataset` this node owns, replacing whatever was
    /// held under the same key. Returns how many keys were stored.
    pub fn store_owned(&mut self, dataset: &Dataset) -> usize {
        let mut stored = 0;
        for (key, records) in dataset {
            if self.owns(key) {
                self.shard.insert(*key, records.clone());
                stored += 1;
            }
        }
        stored
    }

    pub fn records(&self, key: &Identifier) -> Option<Vec<Record>> {
        self.shard.get(key).cloned()
    }
}

type Command = Box<dyn FnOnce(&mut RingState) + Send>;

/// Handle to the task that owns a node's [`RingState`].
///
/// Each call queues a closure and waits for its result; closures run one at
/// a time, so every read or update of the state is atomic with respect to
/// the others.
#[derive(Debug, Clone)]
pub struct StateHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl StateHandle {
    pub fn spawn(mut state: RingState) -> Self {
        let (commands, mut receiver) = mpsc::unbounded_channel::<Command>();
        tokio::spawn(async move {
            while let Some(command) = receiver.recv().await {
                command(&mut state);
            }
        });
        Self { commands }
    }

    pub async fn with<F, R>(&self, f: F) -> Result<R, NodeError>
    where
        F: FnOnce(&mut RingState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Box::new(move |state: &mut RingState| {
                let _ = reply.send(f(state));
            }))
            .map_err(|_| NodeError::StateUnavailable)?;
        response.await.map_err(|_| NodeError::StateUnavailable)
    }

    pub async fn snapshot(&self) -> Result<NodeSnapshot, NodeError> {
        self.with(|state| state.snapshot()).await
    }
}

//! Calculator: owns the computation graph.
//!
//! Receives settled field values from the compute debounce tasks and runs
//! them through the graph. Being the only task that touches the graph, it
//! needs no locking.
//!
//! # Architecture
//!
//! ```text
//! FieldCell → debounce (compute) → inbox → Calculator → Graph
//!                                              ├─► per-node watch channels
//!                                              ├─► snapshot watch channel
//!                                              └─► EventBus (DerivedUpdated)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use sizer_domain::{DerivedValue, FieldId, FieldValue};
use sizer_engine::{Change, DerivedNode, DerivedSnapshot, Graph, NodeId};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::event_bus::{AppEvent, EventBus};

/// A field value that made it through the compute debounce.
#[derive(Debug, Clone)]
pub struct FieldSettled {
    pub field: FieldId,
    pub value: FieldValue,
}

/// Read side of the calculator outputs.
#[derive(Clone)]
pub struct DerivedChannels {
    snapshot: watch::Receiver<DerivedSnapshot>,
    nodes: BTreeMap<DerivedNode, watch::Receiver<DerivedValue>>,
}

impl DerivedChannels {
    /// Latest snapshot of all derived values
    pub fn snapshot(&self) -> DerivedSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified once per settled field value
    pub fn subscribe(&self) -> watch::Receiver<DerivedSnapshot> {
        self.snapshot.clone()
    }

    /// Receiver for a single node, notified every time it is recomputed
    pub fn node(&self, node: DerivedNode) -> watch::Receiver<DerivedValue> {
        match self.nodes.get(&node) {
            Some(rx) => rx.clone(),
            // Every node gets a channel in `Calculator::new`
            None => watch::channel(DerivedValue::Undefined).1,
        }
    }
}

/// Task owning the computation graph.
pub struct Calculator {
    graph: Graph,
    inbox: mpsc::UnboundedReceiver<FieldSettled>,
    snapshot: watch::Sender<DerivedSnapshot>,
    event_bus: Arc<EventBus>,
}

impl Calculator {
    /// Wire the graph's node subscriptions to watch channels.
    pub fn new(
        mut graph: Graph,
        inbox: mpsc::UnboundedReceiver<FieldSettled>,
        event_bus: Arc<EventBus>,
    ) -> (Self, DerivedChannels) {
        let (snapshot, snapshot_rx) = watch::channel(graph.snapshot().clone());

        let mut nodes = BTreeMap::new();
        for node in DerivedNode::ALL {
            let (tx, rx) = watch::channel(graph.value(node));
            graph.subscribe(
                NodeId::Derived(node),
                Box::new(move |change: &Change<'_>| {
                    if let Change::Derived(_, value) = change {
                        tx.send_replace(**value);
                    }
                }),
            );
            nodes.insert(node, rx);
        }

        let calculator = Self {
            graph,
            inbox,
            snapshot,
            event_bus,
        };
        let channels = DerivedChannels {
            snapshot: snapshot_rx,
            nodes,
        };
        (calculator, channels)
    }

    /// Process settled values until every sender is gone.
    pub async fn run(mut self) {
        while let Some(FieldSettled { field, value }) = self.inbox.recv().await {
            let recomputed = self.graph.set_field(field, value);
            let snapshot = self.graph.snapshot().clone();

            debug!(field = %field, recomputed = recomputed.len(), "Derived values recomputed");

            // Publish once per propagation so readers never see a half-updated set
            self.snapshot.send_replace(snapshot.clone());
            self.event_bus.send(AppEvent::DerivedUpdated {
                field,
                recomputed,
                snapshot,
            });
        }

        debug!("Calculator stopped");
    }
}

// =============================================================================
// Tests
// =============================================================================

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use corvus_common::Node;

/// Per-node failure accounting deciding availability.
///
/// The counter only moves through [`record_error`](Self::record_error) and
/// [`reset`](Self::reset); a node is available while the counter stays below
/// the threshold.
#[derive(Debug)]
pub struct NodeStatus {
    node: Node,
    error_times: AtomicU32,
    threshold: u32,
}

impl NodeStatus {
    pub fn new(node: Node, threshold: u32) -> Self {
        Self {
            node,
            error_times: AtomicU32::new(0),
            threshold,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn error_times(&self) -> u32 {
        self.error_times.load(Ordering::Acquire)
    }

    pub fn is_available(&self) -> bool {
        self.error_times() < self.threshold
    }

    /// Increments the failure counter and returns the new count.
    pub fn record_error(&self) -> u32 {
        self.error_times.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Clears the failure counter, making the node selectable again.
    pub fn reset(&self) {
        self.error_times.store(0, Ordering::Release);
    }
}

/// Concurrent Node → [`NodeStatus`] table, one instance per [`NodeManager`].
///
/// Status entries are created lazily on the first failure via an atomic
/// get-or-insert, so concurrent first failures for the same node still yield
/// exactly one instance.
///
/// [`NodeManager`]: crate::manager::NodeManager
pub struct StatusRegistry {
    statuses: DashMap<Node, Arc<NodeStatus>>,
    threshold: u32,
}

impl StatusRegistry {
    pub fn new(threshold: u32) -> Self {
        Self {
            statuses: DashMap::new(),
            threshold,
        }
    }

    /// Records one failure against `node`, creating its status entry if this
    /// is the first failure ever seen for it.
    pub fn server_error(&self, node: &Node) {
        let status = self
            .statuses
            .entry(node.clone())
            .or_insert_with(|| Arc::new(NodeStatus::new(node.clone(), self.threshold)))
            .clone();
        let count = status.record_error();
        if count == self.threshold {
            warn!(node = %node, failures = count, "node crossed failure threshold, removed from selection");
        }
    }

    /// Whether `node` may be selected. Nodes without a status entry have
    /// never failed and are available.
    pub fn is_available(&self, node: &Node) -> bool {
        self.statuses
            .get(node)
            .map(|s| s.is_available())
            .unwrap_or(true)
    }

    pub fn status_of(&self, node: &Node) -> Option<Arc<NodeStatus>> {
        self.statuses.get(node).map(|s| Arc::clone(&s))
    }

    pub fn error_times(&self, node: &Node) -> u32 {
        self.statuses.get(node).map(|s| s.error_times()).unwrap_or(0)
    }

    /// Clears the failure counter for `node` after a successful probe.
    pub fn mark_recovered(&self, node: &Node) {
        if let Some(status) = self.statuses.get(node) {
            if status.error_times() > 0 {
                status.reset();
                info!(node = %node, "node recovered, back in selection");
            }
        }
    }

    /// Drops the status entry entirely, e.g. when the node is removed.
    pub fn discard(&self, node: &Node) {
        self.statuses.remove(node);
    }

    /// Nodes currently carrying at least one recorded failure.
    pub fn failing_nodes(&self) -> Vec<Node> {
        self.statuses
            .iter()
            .filter(|entry| entry.value().error_times() > 0)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

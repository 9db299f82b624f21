use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{info, warn};

use corvus_common::{Connection, InboundHandler, Node, Result, RpcError};

use crate::config::ClientConfig;
use crate::load_balancer::{balancer_for, LoadBalancer};
use crate::pool::ConnectionPool;
use crate::status::StatusRegistry;

/// Owns cluster membership, per-node connection pools, and the status
/// registry; the sole mutation point for all three.
///
/// Membership and pool installation are paired under one write lock, so a
/// node is always either fully registered (membership entry, pool, status
/// slot on first failure) or fully absent. Selection health-filters the
/// candidates before the load balancer ever sees them.
pub struct NodeManager {
    membership: RwLock<Vec<Node>>,
    pools: DashMap<Node, Arc<ConnectionPool>>,
    statuses: Arc<StatusRegistry>,
    balancer: Box<dyn LoadBalancer>,
    handler: Arc<dyn InboundHandler>,
    pool_size: usize,
    connect_timeout: Duration,
    closed: AtomicBool,
}

impl NodeManager {
    pub fn new(
        config: &ClientConfig,
        statuses: Arc<StatusRegistry>,
        handler: Arc<dyn InboundHandler>,
    ) -> Self {
        Self {
            membership: RwLock::new(Vec::new()),
            pools: DashMap::new(),
            statuses,
            balancer: balancer_for(config.load_balance),
            handler,
            pool_size: config.pool_size_per_node,
            connect_timeout: config.connect_timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// Registers `node`, installing a fresh pool. Idempotent; a stale pool
    /// left over for the same address is closed and replaced.
    pub fn add_node(&self, node: Node) {
        if self.is_closed() {
            warn!(node = %node, "node manager closed, add ignored");
            return;
        }
        let mut membership = self.membership.write();
        if membership.contains(&node) {
            return;
        }
        if let Some((_, stale)) = self.pools.remove(&node) {
            stale.close();
        }
        self.pools.insert(
            node.clone(),
            Arc::new(ConnectionPool::new(
                node.clone(),
                self.pool_size,
                self.connect_timeout,
                Arc::clone(&self.handler),
            )),
        );
        membership.push(node.clone());
        info!(node = %node, "node registered");
    }

    pub fn add_cluster(&self, nodes: impl IntoIterator<Item = Node>) {
        for node in nodes {
            self.add_node(node);
        }
    }

    /// Deregisters `node`: membership, pool, and status entry go together.
    pub fn remove_node(&self, node: &Node) {
        let mut membership = self.membership.write();
        membership.retain(|n| n != node);
        if let Some((_, pool)) = self.pools.remove(node) {
            pool.close();
        }
        self.statuses.discard(node);
        info!(node = %node, "node removed");
    }

    pub fn all_nodes(&self) -> Vec<Node> {
        self.membership.read().clone()
    }

    pub fn node_count(&self) -> usize {
        self.membership.read().len()
    }

    pub fn statuses(&self) -> &Arc<StatusRegistry> {
        &self.statuses
    }

    pub fn pool_of(&self, node: &Node) -> Option<Arc<ConnectionPool>> {
        self.pools.get(node).map(|p| Arc::clone(&p))
    }

    /// Health-aware selection: drops unavailable candidates, then delegates
    /// to the load balancer. An unhealthy node is never selected.
    pub fn choose_ha_node(&self, candidates: &[Node]) -> Result<Node> {
        let available: Vec<Node> = candidates
            .iter()
            .filter(|node| self.statuses.is_available(node))
            .cloned()
            .collect();
        if available.is_empty() {
            return Err(RpcError::NoAvailableNode);
        }
        self.balancer
            .choose(&available)
            .ok_or(RpcError::NoAvailableNode)
    }

    /// Fetches a pooled connection to `node`. A connect-level failure is
    /// recorded against the node's status before it propagates.
    pub async fn choose_connection(&self, node: &Node) -> Result<Arc<Connection>> {
        let pool = self
            .pool_of(node)
            .ok_or_else(|| RpcError::NoConnectionPool(node.clone()))?;
        match pool.get().await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                if matches!(e, RpcError::Connection(_)) {
                    self.statuses.server_error(node);
                }
                Err(e)
            }
        }
    }

    /// Selects an available node among `candidates` and fetches one of its
    /// pooled connections.
    pub async fn choose_ha_connection(&self, candidates: &[Node]) -> Result<Arc<Connection>> {
        let node = self.choose_ha_node(candidates)?;
        self.choose_connection(&node).await
    }

    /// [`choose_ha_connection`](Self::choose_ha_connection) over the whole
    /// registered membership.
    pub async fn choose_ha_connection_any(&self) -> Result<Arc<Connection>> {
        let membership = self.all_nodes();
        if membership.is_empty() {
            return Err(RpcError::NoAvailableNode);
        }
        self.choose_ha_connection(&membership).await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// One-shot teardown: closes every pool, clears membership and the pool
    /// map. Idempotent.
    pub fn close_manager(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut membership = self.membership.write();
        for entry in self.pools.iter() {
            entry.value().close();
        }
        self.pools.clear();
        membership.clear();
        info!("node manager closed");
    }

    /// Records a failure against `node`'s status, creating the entry on
    /// first failure.
    pub fn server_error(&self, node: &Node) {
        self.statuses.server_error(node);
    }
}

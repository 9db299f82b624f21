use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use corvus_common::{Connection, InboundHandler, Node, Result, RpcError};

/// Bounded set of shared connections to one node.
///
/// The pool lazily dials up to `pool_size` connections and hands them out
/// round-robin; connections are shared between callers, not leased
/// exclusively. Closed handles are discarded on the way out, but the pool
/// never probes liveness itself — a connection is only observed dead through
/// its reader task. `close` is idempotent and terminates every connection;
/// afterwards `get` fails with `PoolClosed`.
pub struct ConnectionPool {
    node: Node,
    pool_size: usize,
    connect_timeout: Duration,
    handler: Arc<dyn InboundHandler>,
    connections: Mutex<Vec<Arc<Connection>>>,
    cursor: AtomicUsize,
    closed: AtomicBool,
}

impl ConnectionPool {
    pub fn new(
        node: Node,
        pool_size: usize,
        connect_timeout: Duration,
        handler: Arc<dyn InboundHandler>,
    ) -> Self {
        Self {
            node,
            pool_size,
            connect_timeout,
            handler,
            connections: Mutex::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Returns a ready connection, dialing a new one while the pool is
    /// below its size limit.
    pub async fn get(&self) -> Result<Arc<Connection>> {
        if self.is_closed() {
            return Err(RpcError::PoolClosed(self.node.clone()));
        }

        {
            let mut connections = self.connections.lock();
            connections.retain(|c| c.is_active());
            if connections.len() >= self.pool_size {
                let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % connections.len();
                return Ok(Arc::clone(&connections[idx]));
            }
        }

        // dial outside the lock; a concurrent get may have filled the pool
        // in the meantime, in which case the fresh connection is surplus
        let conn = Connection::connect(&self.node, self.connect_timeout, Arc::clone(&self.handler))
            .await?;

        let mut connections = self.connections.lock();
        if self.is_closed() {
            conn.close();
            return Err(RpcError::PoolClosed(self.node.clone()));
        }
        if connections.len() >= self.pool_size {
            conn.close();
            let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % connections.len();
            return Ok(Arc::clone(&connections[idx]));
        }
        connections.push(Arc::clone(&conn));
        debug!(node = %self.node, size = connections.len(), "pooled new connection");
        Ok(conn)
    }

    pub fn size(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Terminates every connection and marks the pool unusable. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut connections = self.connections.lock();
        for conn in connections.iter() {
            conn.close();
        }
        connections.clear();
        debug!(node = %self.node, "connection pool closed");
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.close();
    }
}

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use corvus_common::{Envelope, Node};

use crate::future::ResponseMapping;
use crate::manager::NodeManager;

/// How long a single PING may wait for its PONG, independent of the
/// configured request timeout.
pub(crate) const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);

/// Periodic liveness probing over every known node.
///
/// Each round sends a PING to every registered node and expects a PONG
/// body back. Failures need no handling here: connect errors and timeouts
/// feed the status registry through the normal send and wait paths.
pub struct HeartbeatTask {
    manager: Arc<NodeManager>,
    mapping: Arc<ResponseMapping>,
    interval: Duration,
}

impl HeartbeatTask {
    pub fn new(
        manager: Arc<NodeManager>,
        mapping: Arc<ResponseMapping>,
        interval: Duration,
    ) -> Self {
        Self {
            manager,
            mapping,
            interval,
        }
    }

    /// Starts the heartbeat task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        loop {
            interval.tick().await;
            self.beat_all().await;
        }
    }

    async fn beat_all(&self) {
        let probes: Vec<_> = self
            .manager
            .all_nodes()
            .into_iter()
            .map(|node| {
                let manager = Arc::clone(&self.manager);
                let mapping = Arc::clone(&self.mapping);
                async move {
                    let pong = probe_node(&manager, &mapping, &node, HEARTBEAT_TIMEOUT).await;
                    (node, pong)
                }
            })
            .collect();

        for (node, pong) in futures::future::join_all(probes).await {
            if pong {
                debug!(node = %node, "heartbeat pong");
            } else {
                warn!(node = %node, "heartbeat failed");
            }
        }
    }
}

/// One PING round-trip against `node`. Returns whether a PONG came back
/// within `timeout`. All failure modes feed the node's failure counter as a
/// side effect of the send and wait paths.
pub(crate) async fn probe_node(
    manager: &NodeManager,
    mapping: &Arc<ResponseMapping>,
    node: &Node,
    timeout: Duration,
) -> bool {
    let conn = match manager.choose_connection(node).await {
        Ok(conn) => conn,
        Err(e) => {
            debug!(node = %node, error = %e, "heartbeat connection unavailable");
            return false;
        }
    };

    let ping = Envelope::heartbeat();
    let seq = ping.seq;
    let future = ResponseMapping::register(mapping, seq, node.clone(), timeout, None);
    if let Err(e) = conn.send(&ping).await {
        mapping.discard(seq);
        manager.server_error(node);
        debug!(node = %node, error = %e, "heartbeat send failed");
        return false;
    }

    future.wait_for_response().await.is_pong()
}

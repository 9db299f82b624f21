use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::future::ResponseMapping;
use crate::heartbeat::{probe_node, HEARTBEAT_TIMEOUT};
use crate::manager::NodeManager;

/// Periodic status re-evaluation deciding node recovery.
///
/// Failure counters only ever increment on the request path, so without
/// this task a node that crossed the threshold would stay out of selection
/// forever. Each round probes every registered node currently carrying
/// failures; a successful PING/PONG round-trip resets its counter and the
/// node rejoins selection. A node that stays unreachable keeps failing its
/// probe and stays out.
pub struct NodeHealthCheckTask {
    manager: Arc<NodeManager>,
    mapping: Arc<ResponseMapping>,
    interval: Duration,
}

impl NodeHealthCheckTask {
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

    /// Starts the health check task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        loop {
            interval.tick().await;
            self.check_round().await;
        }
    }

    async fn check_round(&self) {
        let membership = self.manager.all_nodes();
        for node in self.manager.statuses().failing_nodes() {
            if !membership.contains(&node) {
                continue;
            }
            if probe_node(&self.manager, &self.mapping, &node, HEARTBEAT_TIMEOUT).await {
                self.manager.statuses().mark_recovered(&node);
            } else {
                debug!(node = %node, "health probe failed, node stays flagged");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::status::StatusRegistry;
    use corvus_common::transport::codec::{decode_envelope, encode_envelope};
    use corvus_common::{Envelope, InboundHandler, Node, ResponseCode, PONG};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn spawn_pong_server() -> Node {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    loop {
                        let mut len_buf = [0u8; 4];
                        if stream.read_exact(&mut len_buf).await.is_err() {
                            return;
                        }
                        let len = u32::from_be_bytes(len_buf) as usize;
                        let mut buf = vec![0u8; len];
                        if stream.read_exact(&mut buf).await.is_err() {
                            return;
                        }
                        let request = decode_envelope(&buf).unwrap();
                        let reply =
                            Envelope::response(request.seq, ResponseCode::Success, PONG.to_vec());
                        let encoded = encode_envelope(&reply).unwrap();
                        let frame_len = (encoded.len() as u32).to_be_bytes();
                        if stream.write_all(&frame_len).await.is_err()
                            || stream.write_all(&encoded).await.is_err()
                        {
                            return;
                        }
                    }
                });
            }
        });
        Node::new("127.0.0.1", addr.port())
    }

    fn task(threshold: u32) -> (NodeHealthCheckTask, Arc<NodeManager>) {
        let config = ClientConfig {
            failure_threshold: threshold,
            ..Default::default()
        };
        let statuses = Arc::new(StatusRegistry::new(threshold));
        let mapping = Arc::new(ResponseMapping::new(Arc::clone(&statuses)));
        let handler: Arc<dyn InboundHandler> = mapping.clone();
        let manager = Arc::new(NodeManager::new(&config, statuses, handler));
        let task = NodeHealthCheckTask::new(
            Arc::clone(&manager),
            mapping,
            Duration::from_secs(30),
        );
        (task, manager)
    }

    #[tokio::test]
    async fn test_reachable_node_recovers() {
        let node = spawn_pong_server().await;
        let (task, manager) = task(2);
        manager.add_node(node.clone());

        manager.server_error(&node);
        manager.server_error(&node);
        assert!(!manager.statuses().is_available(&node));

        task.check_round().await;

        assert!(manager.statuses().is_available(&node));
        assert_eq!(manager.statuses().error_times(&node), 0);
    }

    #[tokio::test]
    async fn test_unreachable_node_stays_flagged() {
        let (task, manager) = task(2);
        let node = Node::new("127.0.0.1", 1);
        manager.add_node(node.clone());

        manager.server_error(&node);
        manager.server_error(&node);

        task.check_round().await;

        assert!(!manager.statuses().is_available(&node));
        // the failed probe itself counted
        assert!(manager.statuses().error_times(&node) >= 3);
    }

    #[tokio::test]
    async fn test_removed_node_not_probed() {
        let (task, manager) = task(1);
        let node = Node::new("127.0.0.1", 1);
        manager.add_node(node.clone());
        manager.server_error(&node);
        manager.remove_node(&node);

        task.check_round().await;

        // no status entry reappears for a deregistered node
        assert!(manager.statuses().is_empty());
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use corvus_common::{Connection, Envelope, InboundHandler, Node, Result, RpcError};

use crate::config::ClientConfig;
use crate::discovery::ServiceDiscovery;
use crate::future::{ResponseCallback, ResponseFuture, ResponseMapping};
use crate::health_checker::NodeHealthCheckTask;
use crate::heartbeat::{probe_node, HeartbeatTask, HEARTBEAT_TIMEOUT};
use crate::manager::NodeManager;
use crate::status::StatusRegistry;

/// Builder for [`RpcClient`].
#[derive(Default)]
pub struct RpcClientBuilder {
    config: ClientConfig,
    discovery: Option<Arc<dyn ServiceDiscovery>>,
}

impl RpcClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn discovery(mut self, discovery: Arc<dyn ServiceDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Validates the configuration, wires the runtime together, and spawns
    /// the heartbeat and health-check tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(self) -> Result<RpcClient> {
        self.config.validate()?;

        let statuses = Arc::new(StatusRegistry::new(self.config.failure_threshold));
        let mapping = Arc::new(ResponseMapping::new(Arc::clone(&statuses)));
        let handler: Arc<dyn InboundHandler> = mapping.clone();
        let manager = Arc::new(NodeManager::new(&self.config, statuses, handler));

        let heartbeat = HeartbeatTask::new(
            Arc::clone(&manager),
            Arc::clone(&mapping),
            self.config.heartbeat_interval,
        )
        .spawn();
        let health_check = NodeHealthCheckTask::new(
            Arc::clone(&manager),
            Arc::clone(&mapping),
            self.config.health_check_interval,
        )
        .spawn();

        info!("rpc client started");
        Ok(RpcClient {
            config: self.config,
            manager,
            mapping,
            discovery: self.discovery,
            tasks: Mutex::new(vec![heartbeat, health_check]),
            stopped: AtomicBool::new(false),
        })
    }
}

/// Cluster-aware RPC client.
///
/// Orchestrates a call end to end: build the request envelope, pick a node
/// through the [`NodeManager`] (health-aware when more than one candidate
/// is given), send on a pooled connection, register the response future,
/// then either await it or hand the response to a callback.
///
/// Timeouts and interruptions come back as failed-status response
/// envelopes, not errors: a timeout is an expected network condition.
/// Selection and configuration problems surface as errors to the caller.
pub struct RpcClient {
    config: ClientConfig,
    manager: Arc<NodeManager>,
    mapping: Arc<ResponseMapping>,
    discovery: Option<Arc<dyn ServiceDiscovery>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl RpcClient {
    pub fn builder() -> RpcClientBuilder {
        RpcClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<NodeManager> {
        &self.manager
    }

    /// Registers a node with the runtime.
    pub fn add_node(&self, node: Node) {
        self.manager.add_node(node);
    }

    pub fn add_cluster(&self, nodes: impl IntoIterator<Item = Node>) {
        self.manager.add_cluster(nodes);
    }

    pub fn remove_node(&self, node: &Node) {
        self.manager.remove_node(node);
    }

    /// Invokes `cmd` and waits for the response.
    ///
    /// With one candidate the node is used directly; with several, selection
    /// is health-aware under the configured balancing policy; with none, the
    /// whole registered membership is the candidate list. A request that
    /// cannot be dispatched resolves to a client-error response.
    pub async fn invoke(&self, cmd: impl Into<String>, body: Vec<u8>, nodes: &[Node]) -> Envelope {
        let request = Envelope::request(cmd, body);
        let seq = request.seq;
        match self.dispatch(request, nodes, None).await {
            Ok(future) => future.wait_for_response().await,
            Err(e) => {
                error!(seq, error = %e, "request dispatch failed");
                Envelope::client_error(seq)
            }
        }
    }

    /// Typed convenience over [`invoke`](Self::invoke): the body is JSON
    /// encoded, and a success response is JSON decoded into `R`. A
    /// non-success response yields `None`.
    pub async fn invoke_as<R: DeserializeOwned>(
        &self,
        cmd: impl Into<String>,
        body: &impl Serialize,
        nodes: &[Node],
    ) -> Result<Option<R>> {
        let bytes = serde_json::to_vec(body)?;
        let response = self.invoke(cmd, bytes, nodes).await;
        if response.is_success() {
            Ok(Some(serde_json::from_slice(&response.body)?))
        } else {
            warn!(seq = response.seq, code = ?response.code, "request answered with non-success code");
            Ok(None)
        }
    }

    /// Invokes `cmd` without waiting; the callback runs with the response
    /// when it arrives. If the request times out instead, the entry is
    /// cleaned up and the callback is dropped uninvoked.
    pub async fn invoke_async(
        &self,
        cmd: impl Into<String>,
        body: Vec<u8>,
        callback: ResponseCallback,
        nodes: &[Node],
    ) -> Result<()> {
        let request = Envelope::request(cmd, body);
        let future = self.dispatch(request, nodes, Some(callback)).await?;
        // drive the timeout so the correlation entry dies with the request
        tokio::spawn(async move {
            let _ = future.wait_for_response().await;
        });
        Ok(())
    }

    /// Resolves `service_name` through the configured discovery backend and
    /// invokes over the discovered cluster.
    pub async fn invoke_with_registry(
        &self,
        cmd: impl Into<String>,
        body: Vec<u8>,
        service_name: &str,
    ) -> Result<Envelope> {
        let cluster = self.discover(service_name).await?;
        Ok(self.invoke(cmd, body, &cluster).await)
    }

    /// Async variant of [`invoke_with_registry`](Self::invoke_with_registry).
    pub async fn invoke_async_with_registry(
        &self,
        cmd: impl Into<String>,
        body: Vec<u8>,
        callback: ResponseCallback,
        service_name: &str,
    ) -> Result<()> {
        let cluster = self.discover(service_name).await?;
        self.invoke_async(cmd, body, callback, &cluster).await
    }

    /// Sends one PING to `node` and reports whether a PONG came back.
    pub async fn send_heartbeat(&self, node: &Node) -> bool {
        probe_node(&self.manager, &self.mapping, node, HEARTBEAT_TIMEOUT).await
    }

    /// Stops the runtime: periodic tasks are aborted, every pool is closed,
    /// and pending waiters resolve to client-error responses. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            warn!("rpc client already stopped");
            return;
        }
        info!("rpc client stopping");
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.manager.close_manager();
        self.mapping.clear();
        info!("rpc client stopped");
    }

    async fn dispatch(
        &self,
        request: Envelope,
        nodes: &[Node],
        callback: Option<ResponseCallback>,
    ) -> Result<ResponseFuture> {
        let conn: Arc<Connection> = match nodes {
            [] => self.manager.choose_ha_connection_any().await?,
            [single] => self.manager.choose_connection(single).await?,
            cluster => self.manager.choose_ha_connection(cluster).await?,
        };

        // entry goes in before the write so a fast response cannot miss it
        let future = ResponseMapping::register(
            &self.mapping,
            request.seq,
            conn.node().clone(),
            self.config.request_timeout,
            callback,
        );
        if let Err(e) = conn.send(&request).await {
            self.mapping.discard(request.seq);
            self.manager.server_error(conn.node());
            return Err(e);
        }
        Ok(future)
    }

    async fn discover(&self, service_name: &str) -> Result<Vec<Node>> {
        let discovery = self.discovery.as_ref().ok_or_else(|| {
            RpcError::Configuration("no service discovery backend configured".into())
        })?;
        let cluster = discovery.discover(service_name).await?;
        if cluster.is_empty() {
            return Err(RpcError::Discovery(format!(
                "service '{service_name}' resolved to no nodes"
            )));
        }
        // discovered nodes join the membership so pools exist for them
        self.manager.add_cluster(cluster.clone());
        Ok(cluster)
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        if !self.stopped.load(Ordering::Acquire) {
            self.stop();
        }
    }
}

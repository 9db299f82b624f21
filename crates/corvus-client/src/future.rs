use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use corvus_common::{CommandKind, Envelope, InboundHandler, Node};

use crate::status::StatusRegistry;

/// Continuation run by the completion path with the response.
pub type ResponseCallback = Box<dyn FnOnce(&Envelope) + Send + Sync + 'static>;

struct Pending {
    tx: oneshot::Sender<Envelope>,
    callback: Option<ResponseCallback>,
}

/// Sequence number → pending request table.
///
/// One entry exists per in-flight request; the entry is removed on every
/// terminal path — completion, timeout, and interruption alike — so the
/// table never accumulates abandoned requests. A completion for an unknown
/// sequence is a logged no-op: the response may be stale, duplicated, or
/// arrive after its request timed out.
pub struct ResponseMapping {
    pending: DashMap<u64, Pending>,
    statuses: Arc<StatusRegistry>,
}

impl ResponseMapping {
    pub fn new(statuses: Arc<StatusRegistry>) -> Self {
        Self {
            pending: DashMap::new(),
            statuses,
        }
    }

    /// Installs the pending entry for `seq` and returns the handle the
    /// caller waits on. At most one entry exists per sequence.
    pub fn register(
        mapping: &Arc<ResponseMapping>,
        seq: u64,
        node: Node,
        timeout: Duration,
        callback: Option<ResponseCallback>,
    ) -> ResponseFuture {
        let (tx, rx) = oneshot::channel();
        if mapping.pending.insert(seq, Pending { tx, callback }).is_some() {
            // sequence numbers are unique for the table's lifetime
            warn!(seq, "replaced an existing pending request for this sequence");
        }
        ResponseFuture {
            seq,
            node,
            timeout,
            rx,
            mapping: Arc::clone(mapping),
        }
    }

    /// Completion path, driven by connection reader tasks.
    ///
    /// Looks up and removes the pending entry, releases the waiter, then
    /// runs the registered callback. A callback panic is caught and logged,
    /// never propagated into the reader.
    pub fn complete(&self, response: Envelope) {
        let seq = response.seq;
        let Some((_, pending)) = self.pending.remove(&seq) else {
            debug!(seq, "no pending request for response, dropping");
            return;
        };

        let callback = pending.callback;
        if let Some(callback) = callback {
            // waiter first, then continuation
            let _ = pending.tx.send(response.clone());
            if let Err(panic) = catch_unwind(AssertUnwindSafe(move || callback(&response))) {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(seq, reason = %reason, "response callback panicked");
            }
        } else {
            let _ = pending.tx.send(response);
        }
    }

    /// Removes a pending entry without completing it.
    pub fn discard(&self, seq: u64) {
        self.pending.remove(&seq);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drops every pending entry. Waiters resolve to a client-error
    /// response; used on client shutdown.
    pub fn clear(&self) {
        self.pending.clear();
    }
}

impl InboundHandler for ResponseMapping {
    fn on_envelope(&self, envelope: Envelope) {
        match envelope.kind {
            CommandKind::Response | CommandKind::Heartbeat => self.complete(envelope),
            CommandKind::Request => {
                warn!(seq = envelope.seq, cmd = %envelope.cmd, "unexpected inbound request, dropping");
            }
        }
    }
}

/// Per-request handle correlating one request with its eventual response.
///
/// Resolves to exactly one of three outcomes: the response; a synthesized
/// timeout response after the wait elapses (recording one failure against
/// the remote node); or a synthesized client-error response if the runtime
/// shuts down while the request is in flight.
pub struct ResponseFuture {
    seq: u64,
    node: Node,
    timeout: Duration,
    rx: oneshot::Receiver<Envelope>,
    mapping: Arc<ResponseMapping>,
}

impl ResponseFuture {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Waits for the response up to the configured timeout.
    pub async fn wait_for_response(self) -> Envelope {
        match tokio::time::timeout(self.timeout, self.rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                // sender dropped before completing: runtime shut down
                self.mapping.discard(self.seq);
                error!(seq = self.seq, node = %self.node, "wait for response interrupted");
                Envelope::client_error(self.seq)
            }
            Err(_) => {
                self.mapping.discard(self.seq);
                error!(
                    seq = self.seq,
                    node = %self.node,
                    timeout = ?self.timeout,
                    "request timed out"
                );
                self.mapping.statuses.server_error(&self.node);
                Envelope::request_timeout(self.seq)
            }
        }
    }
}

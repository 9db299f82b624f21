use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::node::Node;
use crate::protocol::envelope::Envelope;
use crate::protocol::error::{Result, RpcError};
use crate::protocol::sequence::next_id;
use crate::transport::codec::{decode_envelope, encode_envelope};

/// Maximum frame size accepted on the wire (100 MB).
const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Receives inbound envelopes decoded by a connection's reader task.
///
/// Called on the reader task itself, so implementations must not block; the
/// client runtime's correlation table forwards completions from here.
pub trait InboundHandler: Send + Sync + 'static {
    fn on_envelope(&self, envelope: Envelope);
}

/// One transport channel to one node.
///
/// A connection owns the write half of a TCP stream and a spawned reader
/// task that drains the read half, decoding length-prefixed envelopes and
/// handing them to the [`InboundHandler`]. Connections are shared: several
/// callers may send on one connection concurrently, serialized by the
/// writer lock. Responses are matched by sequence number, not send order.
pub struct Connection {
    id: u64,
    node: Node,
    writer: Mutex<OwnedWriteHalf>,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Connects to `node` within `connect_timeout` and spawns the reader
    /// task delivering inbound envelopes to `handler`.
    pub async fn connect(
        node: &Node,
        connect_timeout: Duration,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<Arc<Self>> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(node.address()))
            .await
            .map_err(|_| {
                RpcError::Connection(format!("connect to {node} timed out after {connect_timeout:?}"))
            })?
            .map_err(|e| RpcError::Connection(format!("connect to {node} failed: {e}")))?;
        stream.set_nodelay(true).ok();

        let (read_half, write_half) = stream.into_split();
        let id = next_id();
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(
            read_half,
            handler,
            Arc::clone(&closed),
            node.clone(),
            id,
        ));

        debug!(conn = id, node = %node, "connection established");
        Ok(Arc::new(Self {
            id,
            node: node.clone(),
            writer: Mutex::new(write_half),
            closed,
            reader,
        }))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Whether the channel is still usable. Flips to false once the reader
    /// task observes EOF or an error, or after [`close`](Self::close).
    pub fn is_active(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Encodes and writes one envelope.
    pub async fn send(&self, envelope: &Envelope) -> Result<()> {
        if !self.is_active() {
            return Err(RpcError::SendFailure(format!(
                "connection {} to {} is closed",
                self.id, self.node
            )));
        }
        let frame = encode_envelope(envelope)?;
        let mut writer = self.writer.lock().await;
        if let Err(e) = write_frame(&mut writer, &frame).await {
            self.closed.store(true, Ordering::Release);
            return Err(RpcError::SendFailure(format!(
                "write to {} failed: {e}",
                self.node
            )));
        }
        Ok(())
    }

    /// Terminates the channel. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.reader.abort();
            debug!(conn = self.id, node = %self.node, "connection closed");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_loop(
    mut read_half: OwnedReadHalf,
    handler: Arc<dyn InboundHandler>,
    closed: Arc<AtomicBool>,
    node: Node,
    conn_id: u64,
) {
    loop {
        match read_frame(&mut read_half).await {
            Ok(frame) => match decode_envelope(&frame) {
                Ok(envelope) => handler.on_envelope(envelope),
                Err(e) => {
                    warn!(conn = conn_id, node = %node, error = %e, "undecodable frame, closing connection");
                    break;
                }
            },
            Err(e) => {
                debug!(conn = conn_id, node = %node, error = %e, "connection read ended");
                break;
            }
        }
    }
    closed.store(true, Ordering::Release);
}

/// Writes a message with its 4-byte big-endian length prefix.
async fn write_frame(stream: &mut OwnedWriteHalf, data: &[u8]) -> std::io::Result<()> {
    let len = data.len() as u32;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(data).await?;
    stream.flush().await
}

/// Reads a message with its 4-byte big-endian length prefix.
async fn read_frame(stream: &mut OwnedReadHalf) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(RpcError::Connection(format!(
            "frame too large: {len} bytes (max {MAX_FRAME_SIZE})"
        )));
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(buf)
}

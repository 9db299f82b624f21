use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::protocol::sequence::next_id;

/// Heartbeat request body.
pub const PING: &[u8] = b"PING";
/// Heartbeat response body.
pub const PONG: &[u8] = b"PONG";

/// What a wire message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    Heartbeat,
    Request,
    Response,
}

/// Outcome code carried by response envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ResponseCode {
    Success = 200,
    ClientError = 400,
    RequestTimeout = 408,
    ServerError = 500,
}

/// The single wire unit of the protocol.
///
/// Requests and responses share one envelope shape, distinguished by `kind`.
/// The `body` is opaque bytes; the runtime only inspects header fields.
///
/// # Fields
///
/// - `seq`: unique sequence number correlating a request with its response
/// - `kind`: heartbeat, request, or response
/// - `cmd`: command name (empty for heartbeats)
/// - `ts`: sender timestamp, milliseconds since the epoch
/// - `code`: outcome code, present on responses only
/// - `body`: opaque payload bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    pub kind: CommandKind,
    pub cmd: String,
    pub ts: u64,
    pub code: Option<ResponseCode>,
    pub body: Vec<u8>,
}

impl Envelope {
    /// Builds a request envelope with a fresh sequence number.
    pub fn request(cmd: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            seq: next_id(),
            kind: CommandKind::Request,
            cmd: cmd.into(),
            ts: now_millis(),
            code: None,
            body,
        }
    }

    /// Builds a heartbeat envelope carrying the PING body.
    pub fn heartbeat() -> Self {
        Self {
            seq: next_id(),
            kind: CommandKind::Heartbeat,
            cmd: String::new(),
            ts: now_millis(),
            code: None,
            body: PING.to_vec(),
        }
    }

    /// Builds a response envelope for the given request sequence.
    pub fn response(seq: u64, code: ResponseCode, body: Vec<u8>) -> Self {
        Self {
            seq,
            kind: CommandKind::Response,
            cmd: String::new(),
            ts: now_millis(),
            code: Some(code),
            body,
        }
    }

    /// Synthesized response for a request that timed out locally.
    pub fn request_timeout(seq: u64) -> Self {
        Self::response(seq, ResponseCode::RequestTimeout, Vec::new())
    }

    /// Synthesized response for a request that failed on the client side
    /// before or instead of a server answer.
    pub fn client_error(seq: u64) -> Self {
        Self::response(seq, ResponseCode::ClientError, Vec::new())
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(ResponseCode::Success)
    }

    pub fn is_pong(&self) -> bool {
        self.body == PONG
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

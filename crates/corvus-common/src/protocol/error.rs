use std::time::Duration;

use thiserror::Error;

use crate::node::Node;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("no available node")]
    NoAvailableNode,

    #[error("no connection pool for node {0}, add the node first")]
    NoConnectionPool(Node),

    #[error("connection pool for node {0} is closed")]
    PoolClosed(Node),

    #[error("failed to send request: {0}")]
    SendFailure(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("interrupted while waiting for response: {0}")]
    Interrupted(String),

    #[error("response callback failed: {0}")]
    Callback(String),

    #[error("service discovery failed: {0}")]
    Discovery(String),

    #[error("codec error: {0}")]
    Codec(#[from] postcard::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RpcError>;

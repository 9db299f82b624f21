use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::protocol::error::RpcError;

/// A remote service endpoint identified by host and port.
///
/// Nodes are immutable values with value equality, used as the key of every
/// per-node table in the runtime (pools, statuses, membership).
///
/// # Example
///
/// ```
/// use corvus_common::Node;
///
/// let node: Node = "127.0.0.1:8005".parse().unwrap();
/// assert_eq!(node.host(), "127.0.0.1");
/// assert_eq!(node.port(), 8005);
/// assert_eq!(node.to_string(), "127.0.0.1:8005");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    host: String,
    port: u16,
}

impl Node {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The `host:port` form used for socket address resolution.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Node {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| RpcError::Configuration(format!("invalid node address '{s}'")))?;
        if host.is_empty() {
            return Err(RpcError::Configuration(format!(
                "invalid node address '{s}': empty host"
            )));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| RpcError::Configuration(format!("invalid port in '{s}': {e}")))?;
        Ok(Node::new(host, port))
    }
}

//! Corvus RPC Client Runtime
//!
//! The client-side runtime of the corvus binary RPC protocol. It maintains
//! pooled connections to a cluster of remote nodes, selects a node per call
//! under a configurable load-balancing policy with health-aware failover,
//! correlates requests with responses by sequence number (awaited or
//! delivered to a callback) under a timeout, and monitors node health with
//! periodic heartbeats and failure counters.
//!
//! # Example
//!
//! ```no_run
//! use corvus_client::{ClientConfig, RpcClient};
//! use corvus_common::Node;
//!
//! # #[tokio::main]
//! # async fn main() -> corvus_common::Result<()> {
//! let client = RpcClient::builder().config(ClientConfig::default()).start()?;
//!
//! let node: Node = "127.0.0.1:8005".parse()?;
//! client.add_node(node.clone());
//!
//! let response = client.invoke("echo", b"hello".to_vec(), &[node]).await;
//! assert!(response.is_success());
//!
//! client.stop();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod discovery;
pub mod future;
pub mod health_checker;
pub mod heartbeat;
pub mod load_balancer;
pub mod manager;
pub mod pool;
pub mod status;

pub use client::{RpcClient, RpcClientBuilder};
pub use config::{ClientConfig, LoadBalancePolicy};
pub use discovery::{ServiceDiscovery, StaticDiscovery};
pub use future::{ResponseCallback, ResponseFuture, ResponseMapping};
pub use load_balancer::{balancer_for, LoadBalancer, RandomBalancer, RoundRobinBalancer};
pub use manager::NodeManager;
pub use pool::ConnectionPool;
pub use status::{NodeStatus, StatusRegistry};

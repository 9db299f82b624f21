use std::time::Duration;

use corvus_common::{Result, RpcError};

/// Node selection policy applied to the health-filtered candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadBalancePolicy {
    #[default]
    Random,
    RoundRobin,
}

/// Client runtime configuration.
///
/// # Default Configuration
///
/// - `pool_size_per_node`: 5 connections
/// - `request_timeout`: 30 seconds
/// - `connect_timeout`: 5 seconds
/// - `heartbeat_interval`: 30 seconds
/// - `health_check_interval`: 30 seconds
/// - `load_balance`: random
/// - `failure_threshold`: 3 failures before a node is considered unavailable
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum connections kept per node.
    pub pool_size_per_node: usize,
    /// How long a caller waits for a response before the request is failed.
    pub request_timeout: Duration,
    /// How long a connection attempt may take.
    pub connect_timeout: Duration,
    /// Interval between heartbeat rounds over all known nodes.
    pub heartbeat_interval: Duration,
    /// Interval between health re-evaluation rounds for failing nodes.
    pub health_check_interval: Duration,
    /// Node selection policy.
    pub load_balance: LoadBalancePolicy,
    /// Failure count at which a node stops being selectable.
    pub failure_threshold: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pool_size_per_node: 5,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(30),
            load_balance: LoadBalancePolicy::Random,
            failure_threshold: 3,
        }
    }
}

impl ClientConfig {
    /// Rejects configurations the runtime cannot operate under.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size_per_node == 0 {
            return Err(RpcError::Configuration(
                "pool_size_per_node must be at least 1".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(RpcError::Configuration(
                "request_timeout must be non-zero".into(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(RpcError::Configuration(
                "connect_timeout must be non-zero".into(),
            ));
        }
        if self.heartbeat_interval.is_zero() || self.health_check_interval.is_zero() {
            return Err(RpcError::Configuration(
                "heartbeat and health check intervals must be non-zero".into(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(RpcError::Configuration(
                "failure_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use corvus_common::{Node, Result, RpcError};

/// Name lookup seam for registry-backed invocation.
///
/// Backends (ZooKeeper, DNS, a config file) live outside this crate; the
/// runtime only needs an ordered node list per service name. Lookup
/// failures propagate as [`RpcError::Discovery`].
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    async fn discover(&self, service_name: &str) -> Result<Vec<Node>>;
}

/// In-memory discovery table, useful for tests and fixed deployments.
#[derive(Default)]
pub struct StaticDiscovery {
    services: RwLock<HashMap<String, Vec<Node>>>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, service_name: impl Into<String>, nodes: Vec<Node>) {
        self.services.write().insert(service_name.into(), nodes);
    }
}

#[async_trait]
impl ServiceDiscovery for StaticDiscovery {
    async fn discover(&self, service_name: &str) -> Result<Vec<Node>> {
        self.services
            .read()
            .get(service_name)
            .cloned()
            .ok_or_else(|| RpcError::Discovery(format!("unknown service '{service_name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registered_service_resolves_in_order() {
        let discovery = StaticDiscovery::new();
        let nodes = vec![Node::new("10.0.0.1", 9001), Node::new("10.0.0.2", 9001)];
        discovery.register("billing", nodes.clone());

        assert_eq!(discovery.discover("billing").await.unwrap(), nodes);
    }

    #[tokio::test]
    async fn test_unknown_service_fails() {
        let discovery = StaticDiscovery::new();
        assert!(matches!(
            discovery.discover("ghost").await,
            Err(RpcError::Discovery(_))
        ));
    }
}

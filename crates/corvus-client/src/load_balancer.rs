use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

use corvus_common::Node;

use crate::config::LoadBalancePolicy;

/// Pure selection strategy over an already health-filtered candidate list.
///
/// Implementations never see unavailable nodes; [`NodeManager`] filters the
/// candidates before delegating here.
///
/// [`NodeManager`]: crate::manager::NodeManager
pub trait LoadBalancer: Send + Sync {
    /// Picks one node. Returns `None` only for an empty candidate list.
    fn choose(&self, candidates: &[Node]) -> Option<Node>;
}

/// Uniform random selection.
pub struct RandomBalancer;

impl LoadBalancer for RandomBalancer {
    fn choose(&self, candidates: &[Node]) -> Option<Node> {
        if candidates.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..candidates.len());
        Some(candidates[idx].clone())
    }
}

/// Cyclic selection driven by an atomic counter.
///
/// For a fixed candidate list the sequence of picks is fully determined by
/// the counter state, so repeated calls walk the list in a stable cycle.
pub struct RoundRobinBalancer {
    counter: AtomicUsize,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobinBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for RoundRobinBalancer {
    fn choose(&self, candidates: &[Node]) -> Option<Node> {
        if candidates.is_empty() {
            return None;
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(candidates[idx].clone())
    }
}

/// Builds the balancer for a configured policy.
pub fn balancer_for(policy: LoadBalancePolicy) -> Box<dyn LoadBalancer> {
    match policy {
        LoadBalancePolicy::Random => Box::new(RandomBalancer),
        LoadBalancePolicy::RoundRobin => Box::new(RoundRobinBalancer::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(count: u16) -> Vec<Node> {
        (0..count).map(|i| Node::new("10.0.0.1", 9000 + i)).collect()
    }

    #[test]
    fn test_empty_candidates_returns_none() {
        assert!(RandomBalancer.choose(&[]).is_none());
        assert!(RoundRobinBalancer::new().choose(&[]).is_none());
    }

    #[test]
    fn test_round_robin_cycles() {
        let candidates = nodes(3);
        let lb = RoundRobinBalancer::new();

        assert_eq!(lb.choose(&candidates), Some(candidates[0].clone()));
        assert_eq!(lb.choose(&candidates), Some(candidates[1].clone()));
        assert_eq!(lb.choose(&candidates), Some(candidates[2].clone()));
        // wraps around
        assert_eq!(lb.choose(&candidates), Some(candidates[0].clone()));
    }

    #[test]
    fn test_round_robin_stable_over_many_calls() {
        let candidates = nodes(3);
        let lb = RoundRobinBalancer::new();

        for round in 0..10 {
            for expected in &candidates {
                assert_eq!(
                    lb.choose(&candidates).as_ref(),
                    Some(expected),
                    "cycle broke in round {round}"
                );
            }
        }
    }

    #[test]
    fn test_random_stays_within_candidates() {
        let candidates = nodes(4);
        let lb = RandomBalancer;
        for _ in 0..100 {
            let picked = lb.choose(&candidates).unwrap();
            assert!(candidates.contains(&picked));
        }
    }

    #[test]
    fn test_single_candidate() {
        let candidates = nodes(1);
        let lb = RoundRobinBalancer::new();
        assert_eq!(lb.choose(&candidates), Some(candidates[0].clone()));
        assert_eq!(lb.choose(&candidates), Some(candidates[0].clone()));
    }

    #[test]
    fn test_factory_maps_policies() {
        let candidates = nodes(2);
        assert!(balancer_for(LoadBalancePolicy::Random)
            .choose(&candidates)
            .is_some());
        assert!(balancer_for(LoadBalancePolicy::RoundRobin)
            .choose(&candidates)
            .is_some());
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static SEQUENCE: OnceLock<AtomicU64> = OnceLock::new();

/// Returns the next process-wide sequence number.
///
/// Ids are unique and strictly increasing within one process. The counter is
/// seeded from the epoch-millisecond clock shifted left so that ids from
/// successive process runs do not collide on a server that remembers recent
/// sequences.
pub fn next_id() -> u64 {
    let counter = SEQUENCE.get_or_init(|| {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        AtomicU64::new(millis << 20)
    });
    counter.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_ids_increase() {
        let a = next_id();
        let b = next_id();
        assert!(b > a);
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| (0..1000).map(|_| next_id()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate sequence number {id}");
            }
        }
    }
}

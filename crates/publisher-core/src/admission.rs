//! Admission control for listing jobs.
//!
//! At most one in-flight job per collection address and a bounded number of
//! jobs overall. Entries carry a TTL so a job that dies without releasing
//! its slot (process restart, task abort) stops blocking the address after
//! the timeout instead of forever.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long an unreleased admission entry keeps blocking its address.
pub const DEFAULT_ADMISSION_TTL: Duration = Duration::from_secs(5 * 60);

/// Outcome of an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    AlreadyInProgress,
    CapacityExceeded,
}

pub struct AdmissionCache {
    entries: Mutex<HashMap<String, Instant>>,
    capacity: usize,
    ttl: Duration,
}

impl AdmissionCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
            ttl,
        }
    }

    /// Atomically admit `key` if it is not already in flight and capacity
    /// remains. Expired entries are purged before the checks so a stale slot
    /// never counts against capacity.
    pub fn try_acquire(&self, key: &str) -> Admission {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("admission lock poisoned");
        entries.retain(|_, admitted| now.duration_since(*admitted) < self.ttl);

        if entries.contains_key(key) {
            return Admission::AlreadyInProgress;
        }
        if entries.len() >= self.capacity {
            return Admission::CapacityExceeded;
        }
        entries.insert(key.to_owned(), now);
        Admission::Admitted
    }

    pub fn release(&self, key: &str) {
        self.entries
            .lock()
            .expect("admission lock poisoned")
            .remove(key);
    }

    pub fn in_flight(&self) -> usize {
        self.entries.lock().expect("admission lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_single_admission_per_key() {
        let cache = Arc::new(AdmissionCache::new(10, DEFAULT_ADMISSION_TTL));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.try_acquire("0xabc"))
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|a| *a == Admission::Admitted)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(cache.in_flight(), 1);
    }

    #[test]
    fn test_release_frees_the_key() {
        let cache = AdmissionCache::new(10, DEFAULT_ADMISSION_TTL);
        assert_eq!(cache.try_acquire("0xabc"), Admission::Admitted);
        assert_eq!(cache.try_acquire("0xabc"), Admission::AlreadyInProgress);
        cache.release("0xabc");
        assert_eq!(cache.try_acquire("0xabc"), Admission::Admitted);
    }

    #[test]
    fn test_capacity_bounds_distinct_keys() {
        let cache = AdmissionCache::new(2, DEFAULT_ADMISSION_TTL);
        assert_eq!(cache.try_acquire("0x1"), Admission::Admitted);
        assert_eq!(cache.try_acquire("0x2"), Admission::Admitted);
        assert_eq!(cache.try_acquire("0x3"), Admission::CapacityExceeded);
        cache.release("0x1");
        assert_eq!(cache.try_acquire("0x3"), Admission::Admitted);
    }

    #[test]
    fn test_expired_entry_is_purged() {
        let cache = AdmissionCache::new(1, Duration::from_millis(20));
        assert_eq!(cache.try_acquire("0x1"), Admission::Admitted);
        std::thread::sleep(Duration::from_millis(40));
        // expired entry neither blocks the key nor counts against capacity
        assert_eq!(cache.try_acquire("0x2"), Admission::Admitted);
    }
}

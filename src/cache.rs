// Short-lived in-memory cache with per-entry expiry.
//
// Used for two things: the "comments:<post_id>" tier of the comment resolver,
// and recently finished analysis reports. Entries expire after a fixed TTL;
// an expired entry is dropped when its key is looked up, and every insert
// sweeps out whatever else has expired, so the map stays bounded by the
// entries written within one TTL.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A string-keyed cache whose entries expire `ttl` after insertion.
///
/// Lock hold times are a single HashMap operation, so a std Mutex is fine
/// here and the guard is never held across an await.
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A zero TTL disables caching entirely.
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some((inserted, value)) if inserted.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        if !self.is_enabled() {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let ttl = self.ttl;
        entries.retain(|_, (inserted, _)| inserted.elapsed() < ttl);
        entries.insert(key.into(), (Instant::now(), value));
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("comments:p1", vec![1, 2, 3]);
        assert_eq!(cache.get("comments:p1"), Some(vec![1, 2, 3]));
        assert_eq!(cache.get("comments:p2"), None);
    }

    #[test]
    fn test_entries_expire() {
        let cache = TtlCache::new(Duration::from_millis(20));
        cache.insert("k", "v".to_string());
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty(), "expired entry should be dropped on lookup");
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.insert("k", 1);
        assert!(!cache.is_enabled());
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_sweeps_expired_entries() {
        let cache = TtlCache::new(Duration::from_millis(20));
        for i in 0..50 {
            cache.insert(format!("comments:p{i}"), i);
        }
        std::thread::sleep(Duration::from_millis(40));
        cache.insert("comments:fresh", 99);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("comments:fresh"), Some(99));
    }

    #[test]
    fn test_remove() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("k", 5);
        assert_eq!(cache.remove("k"), Some(5));
        assert_eq!(cache.get("k"), None);
    }
}

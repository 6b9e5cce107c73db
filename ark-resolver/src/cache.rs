//! A 60s-TTL cache for secret/config lookups.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_TTL: Duration = Duration::from_secs(60);

struct Entry {
    value: String,
    expires_at: Instant,
}

pub struct TtlCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().await;
        entries.get(key).filter(|e| e.expires_at > Instant::now()).map(|e| e.value.clone())
    }

    pub async fn put(&self, key: String, value: String) {
        let mut entries = self.entries.lock().await;
        entries.insert(key, Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        });
    }

    /// Drop a cached value after a backend reports it as known-bad.
    pub async fn invalidate(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn expires_after_ttl() {
        let cache = TtlCache::with_ttl(Duration::from_millis(50));
        cache.put("k".to_string(), "v".to_string()).await;
        assert_eq!(cache.get("k").await, Some("v".to_string()));
        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = TtlCache::new();
        cache.put("k".to_string(), "v".to_string()).await;
        cache.invalidate("k").await;
        assert_eq!(cache.get("k").await, None);
    }
}

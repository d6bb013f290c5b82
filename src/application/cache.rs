// TTL cache - Per-series result cache with lazy expiry
use crate::domain::filter::{DailyQuery, Filter};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    /// Epoch milliseconds after which the entry is stale.
    pub expires_at: i64,
}

/// Key/value store whose entries expire after a per-entry TTL.
///
/// Expired entries are removed on the read that finds them; there is no
/// background sweep.
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    name: &'static str,
    entries: HashMap<String, CacheEntry<T>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: &str, now_ms: i64) -> Option<T> {
        match self.entries.get(key) {
            Some(entry) if now_ms <= entry.expires_at => {
                debug!(cache = self.name, key, "Cache hit");
                Some(entry.data.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                debug!(cache = self.name, key, "Evicted expired cache entry");
                None
            }
            None => {
                debug!(cache = self.name, key, "Cache miss");
                None
            }
        }
    }

    pub fn set(&mut self, key: String, data: T, ttl_ms: i64, now_ms: i64) {
        let expires_at = now_ms.saturating_add(ttl_ms);
        self.entries.insert(key, CacheEntry { data, expires_at });
    }

}

/// Stable JSON key for KPI and trend requests.
///
/// Field order comes from the `Filter` declaration, so logically equal filters
/// always serialize identically.
pub fn filter_cache_key(filter: &Filter) -> String {
    serde_json::to_string(filter).unwrap_or_else(|_| {
        format!(
            "{}|{}|{}",
            filter.date_from,
            filter.date_to,
            filter.customer_id.as_deref().unwrap_or("*")
        )
    })
}

/// Composite key for daily requests: `YYYY-MM|customer`.
pub fn daily_cache_key(query: &DailyQuery) -> String {
    format!(
        "{:04}-{:02}|{}",
        query.year,
        query.month,
        query.customer_id.as_deref().unwrap_or("*")
    )
}

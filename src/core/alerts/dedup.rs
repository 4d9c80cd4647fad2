// src/core/alerts/dedup.rs

//! A rolling deduplication cache keyed by an arbitrary string (the alert
//! pipeline uses `metric-level`; the ticketing adapter uses the same key
//! shape). Mutable, in-process, owned by its component — never shared
//! across components directly.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

pub struct DedupCache {
    window: Duration,
    last_seen: HashMap<String, DateTime<Utc>>,
}

impl DedupCache {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_seen: HashMap::new(),
        }
    }

    /// Returns `true` if `key` is still within its dedup window as of
    /// `now`. Does not mutate the cache.
    pub fn is_suppressed(&self, key: &str, now: DateTime<Utc>) -> bool {
        match self.last_seen.get(key) {
            Some(last) => {
                let elapsed = now.signed_duration_since(*last);
                elapsed.to_std().map(|e| e < self.window).unwrap_or(true)
            }
            None => false,
        }
    }

    /// Records an emission at `now`, refreshing the window.
    pub fn record(&mut self, key: &str, now: DateTime<Utc>) {
        self.last_seen.insert(key.to_string(), now);
        self.purge_expired(now);
    }

    /// Opportunistically drops entries that have fallen out of the window.
    fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.last_seen.retain(|_, last| {
            now.signed_duration_since(*last)
                .to_std()
                .map(|e| e < self.window * 4)
                .unwrap_or(true)
        });
    }
}

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};

const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Remembers recently seen webhook identities so redeliveries can be skipped.
pub struct WebhookDeduplicator {
    seen: DashMap<String, Instant>,
    ttl: Duration,
    max_entries: usize,
}

impl WebhookDeduplicator {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            seen: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Records `key` and returns `true` if it was not seen within the TTL.
    pub fn first_delivery(&self, key: &str) -> bool {
        let now = Instant::now();
        if self.seen.len() >= self.max_entries {
            self.prune(now);
        }

        match self.seen.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.ttl {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn prune(&self, now: Instant) {
        self.seen
            .retain(|_, seen_at| now.duration_since(*seen_at) < self.ttl);
        // Still full of live entries: drop the oldest half.
        if self.seen.len() >= self.max_entries {
            let mut stamps: Vec<Instant> = self.seen.iter().map(|e| *e.value()).collect();
            stamps.sort_unstable();
            let cutoff = stamps[stamps.len() / 2];
            self.seen.retain(|_, seen_at| *seen_at > cutoff);
        }
    }
}

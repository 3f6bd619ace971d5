//! In-memory counter store using DashMap.
//!
//! Expired entries are dropped lazily when touched; there is no sweeper task.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::StoreBackendType;
use crate::metrics::StoreMetrics;

use super::{CounterStore, StoreError};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local counter store.
///
/// Every operation runs under the shard lock of its key, which makes
/// increment and decrement atomic per key.
#[derive(Default)]
pub struct MemoryCounterStore {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn parse_counter(key: &str, value: &str) -> Result<i64, StoreError> {
        value.parse::<i64>().map_err(|_| {
            StoreMetrics::record_error("memory", "parse");
            StoreError::NotAnInteger {
                key: key.to_string(),
            }
        })
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    fn backend_type(&self) -> StoreBackendType {
        StoreBackendType::Memory
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let current = if entry.is_expired(now) {
                    0
                } else {
                    Self::parse_counter(key, &entry.value)?
                };
                entry.value = (current + 1).to_string();
                entry.expires_at = Some(now + ttl);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(MemoryEntry {
                    value: "1".to_string(),
                    expires_at: Some(now + ttl),
                });
            }
        }

        Ok(())
    }

    async fn decr(&self, key: &str) -> Result<(), StoreError> {
        let now = Instant::now();

        if let Entry::Occupied(mut occupied) = self.entries.entry(key.to_string()) {
            if occupied.get().is_expired(now) {
                occupied.remove();
                return Ok(());
            }

            let next = Self::parse_counter(key, &occupied.get().value)? - 1;
            if next <= 0 {
                occupied.remove();
            } else {
                occupied.get_mut().value = next.to_string();
            }
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();

        let value = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => None,
            None => return Ok(None),
        };

        // Expired: drop it unless someone refreshed it in between
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use stripelock_common::prelude::*;

use super::LockBackend;

/// In-process backend with the same conditional-put and TTL semantics as Redis. Expired entries
/// read as absent and are evicted lazily on access.
#[derive(Default)]
pub struct MemoryLockBackend {
    entries: DashMap<InlineStr, Entry>,
}

struct Entry {
    value: String,
    // None when the TTL does not fit in an `Instant`.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |expires_at| expires_at <= now)
    }
}

impl MemoryLockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys.
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
}

impl LockBackend for MemoryLockBackend {
    fn set_if_absent(&self, key: &str, value: &str, ttl_ms: i64) -> LockResult<bool> {
        if ttl_ms <= 0 {
            return fmt_err!(IllegalArgument, "invalid expire time {} for key {}", ttl_ms, key);
        }
        let now = Instant::now();
        let entry = Entry {
            value: value.to_string(),
            expires_at: now.checked_add(Duration::from_millis(ttl_ms as u64)),
        };

        match self.entries.entry(InlineStr::from(key)) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(entry);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(true)
            }
        }
    }

    fn get(&self, key: &str) -> LockResult<Option<String>> {
        let now = Instant::now();
        let live = self
            .entries
            .get(key)
            .map(|entry| (!entry.is_expired(now)).then(|| entry.value.clone()));

        match live {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.is_expired(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> LockResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

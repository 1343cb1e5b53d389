use std::sync::Weak;

use stripelock_common::prelude::*;
use uuid::Uuid;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// One registry's tokens on one thread.
struct OwnerTable {
    // Dead once the owning registry is dropped; the table is then pruned on this thread.
    alive: Weak<()>,
    tokens: HashMap<InlineStr, Uuid>,
}

thread_local! {
    /// registry id -> lock name -> ownership token, for the current thread only.
    static OWNER_TABLES: RefCell<HashMap<u64, OwnerTable>> = RefCell::new(HashMap::default());
}

/// Per-thread record of the ownership tokens this thread believes it holds.
///
/// Each registry instance has its own partition of the thread-local tables, so two managers in
/// one process never observe each other's tokens. Nothing is shared between threads, so no
/// locking is needed; a thread's tables go away with the thread.
///
/// Dropping a registry removes its partition on the dropping thread at once. Partitions it left
/// on other threads are removed by the next `set` those threads make on any registry.
pub struct OwnerRegistry {
    registry_id: u64,
    alive: Arc<()>,
}

impl OwnerRegistry {
    pub fn new() -> Self {
        Self {
            registry_id: NEXT_REGISTRY_ID.fetch_add(1, AtomicOrdering::Relaxed),
            alive: Arc::new(()),
        }
    }

    /// Returns the token previously recorded for `name` on this thread.
    pub fn set(&self, name: &str, id: Uuid) -> Option<Uuid> {
        OWNER_TABLES.with(|tables| {
            let mut tables = tables.borrow_mut();
            tables.retain(|_, table| table.alive.strong_count() > 0);
            tables
                .entry(self.registry_id)
                .or_insert_with(|| OwnerTable {
                    alive: Arc::downgrade(&self.alive),
                    tokens: HashMap::default(),
                })
                .tokens
                .insert(InlineStr::from(name), id)
        })
    }

    pub fn get(&self, name: &str) -> Option<Uuid> {
        OWNER_TABLES.with(|tables| {
            tables
                .borrow()
                .get(&self.registry_id)
                .and_then(|table| table.tokens.get(name).copied())
        })
    }

    pub fn remove(&self, name: &str) -> Option<Uuid> {
        OWNER_TABLES.with(|tables| {
            let mut tables = tables.borrow_mut();
            let table = tables.get_mut(&self.registry_id)?;
            let removed = table.tokens.remove(name);
            if table.tokens.is_empty() {
                tables.remove(&self.registry_id);
            }
            removed
        })
    }

    /// Number of names this registry tracks on the current thread.
    pub fn len(&self) -> usize {
        OWNER_TABLES.with(|tables| {
            tables
                .borrow()
                .get(&self.registry_id)
                .map_or(0, |table| table.tokens.len())
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for OwnerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OwnerRegistry {
    fn drop(&mut self) {
        // The thread-local may already be gone when a registry is dropped during thread exit.
        let _ = OWNER_TABLES.try_with(|tables| {
            if let Ok(mut tables) = tables.try_borrow_mut() {
                tables.remove(&self.registry_id);
            }
        });
    }
}

#[cfg(test)]
fn partitions_on_current_thread() -> usize {
    OWNER_TABLES.with(|tables| tables.borrow().len())
}

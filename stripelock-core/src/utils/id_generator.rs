use stripelock_common::prelude::*;
use uuid::Uuid;

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static UNIT_ID: u64 = NEXT_UNIT_ID.fetch_add(1, AtomicOrdering::Relaxed);
}

pub struct IdGenerator;

impl IdGenerator {
    /// Fresh ownership token, UUID v4.
    pub fn generate_token() -> Uuid {
        Uuid::new_v4()
    }

    /// Process-unique id of the calling thread, stable for the thread's lifetime and never reused.
    pub fn current_unit_id() -> u64 {
        UNIT_ID.with(|id| *id)
    }
}

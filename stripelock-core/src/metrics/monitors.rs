use ::metrics::{histogram, increment_counter};

pub struct Monitors;

impl Monitors {
    pub fn record_acquire_lock_unsuccessful() {
        increment_counter!("stripelock.acquire.unsuccessful");
    }

    pub fn record_acquire_wait_time(duration_ms: f64) {
        histogram!("stripelock.acquire.wait_ms", duration_ms);
    }

    pub fn record_backend_error(operation: &'static str) {
        increment_counter!("stripelock.backend.error", "operation" => operation);
    }
}

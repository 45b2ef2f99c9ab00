//! Process-wide incrementing counter.

use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Returns 0 on the first call, then 1, 2, ...
pub fn increment() -> u64 {
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

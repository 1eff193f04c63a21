//! A process-wide fake clock for tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(false);
static MILLIS: AtomicU64 = AtomicU64::new(0);

/// Pins the clock at `millis`.
pub fn enable(millis: u64) {
    MILLIS.store(millis, Ordering::SeqCst);
    ENABLED.store(true, Ordering::SeqCst);
}

/// Restores the real clock.
pub fn disable() {
    ENABLED.store(false, Ordering::SeqCst);
}

pub(crate) fn get() -> Option<u64> {
    if ENABLED.load(Ordering::SeqCst) {
        Some(MILLIS.load(Ordering::SeqCst))
    } else {
        None
    }
}

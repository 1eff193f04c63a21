//! Wall-clock access for the chain.
//!
//! All timestamp checks read the clock through this crate, so tests can pin
//! time with the `enable_faketime` feature instead of racing the real clock.

use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(feature = "enable_faketime")]
pub mod faketime;


fn system_time_as_millis() -> u64 {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock is before the unix epoch");
    duration.as_millis() as u64
}

/// Current unix time in milliseconds.
pub fn unix_time_as_millis() -> u64 {
    #[cfg(feature = "enable_faketime")]
    if let Some(millis) = faketime::get() {
        return millis;
    }
    system_time_as_millis()
}

/// Current unix time in whole seconds, as the signed type blocks carry.
pub fn unix_time_as_secs() -> i64 {
    (unix_time_as_millis() / 1000) as i64
}

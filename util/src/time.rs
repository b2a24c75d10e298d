//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if the nanosecond
/// count overflows.
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Number of whole cycles of a periodic task at `frequency_hz` that fit into
/// `duration_s`, rounded to the nearest cycle.
pub fn seconds_to_cycles(duration_s: f64, frequency_hz: f64) -> u64 {
    let cycles = (duration_s * frequency_hz).round();

    if cycles <= 0.0 {
        0
    } else {
        cycles as u64
    }
}

//! Monotonic timing utilities
//!
//! Latency stamps and elapsed-time math use a single process-wide monotonic
//! clock, so timestamps taken on different threads stay comparable.

use std::sync::OnceLock;
use std::time::Instant;

/// Origin of all timestamps in this process
static START: OnceLock<Instant> = OnceLock::new();

/// Current time in nanoseconds since the first call in this process.
#[inline]
pub fn time_ns() -> u64 {
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}

/// Current time in microseconds since the first call in this process.
#[inline]
pub fn time_us() -> u64 {
    time_ns() / 1_000
}

/// Convert a nanosecond interval to fractional seconds.
#[inline]
pub fn ns_to_secs(ns: u64) -> f64 {
    ns as f64 / 1e9
}

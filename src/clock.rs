//! Monotonic Milliseconds
//!
//! All deadlines in the server (idle timeouts, TTL expiry, the fsync
//! cadence) are compared on one process-relative monotonic clock, in
//! milliseconds. Wall-clock time never enters the picture, so clock
//! adjustments cannot expire keys early or keep them alive.

use std::sync::OnceLock;
use std::time::Instant;

static START: OnceLock<Instant> = OnceLock::new();

/// Milliseconds elapsed since the first call in this process.
pub fn now_ms() -> u64 {
    START.get_or_init(Instant::now).elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
    }
}

//! Shared utilities for the SWR engine.

use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current time in milliseconds since UNIX epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_is_positive() {
        let now = now_ms();
        assert!(now > 0);
    }

    #[test]
    fn test_now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
    }
}

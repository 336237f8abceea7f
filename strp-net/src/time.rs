//! Time utilities.
//!
//! The protocol engine works in absolute seconds as `f64`; this module is
//! the single place the wall clock is read.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current time as seconds since the Unix epoch.
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
}

/// Seconds elapsed since `earlier`, never negative.
pub fn since(earlier: f64) -> f64 {
    (now() - earlier).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_past_2024() {
        assert!(now() > 1_704_067_200.0);
    }

    #[test]
    fn test_now_monotonic_enough() {
        let t1 = now();
        let t2 = now();
        assert!(t2 >= t1);
    }

    #[test]
    fn test_since_never_negative() {
        assert_eq!(since(now() + 1000.0), 0.0);
        assert!(since(0.0) > 0.0);
    }
}

//! Server-assigned timestamps.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Hands out strictly increasing UTC instants at microsecond precision, the
/// resolution timestamps are stored at.
///
/// Two writes never share an instant, so ordering by timestamp is a total
/// order even when the wall clock stalls or steps backwards.
#[derive(Debug)]
pub struct ServerClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().trunc_subsecs(6);
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = match *last {
            Some(prev) if wall <= prev => prev + Duration::microseconds(1),
            _ => wall,
        };
        *last = Some(next);
        next
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strictly_increasing() {
        let clock = ServerClock::new();
        let mut prev = clock.now();
        for _ in 0..1_000 {
            let next = clock.now();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn microsecond_precision() {
        let clock = ServerClock::new();
        let ts = clock.now();
        assert_eq!(ts.timestamp_subsec_nanos() % 1_000, 0);
    }
}

//! Event timestamps.

use time::{Duration, OffsetDateTime};

/// Wall clock that never runs backwards within one engine.
///
/// A fixed clock is used by tests; it only moves when advanced.
#[derive(Clone, Debug)]
pub struct Clock {
    fixed: Option<OffsetDateTime>,
    last: Option<OffsetDateTime>,
}

impl Clock {
    pub fn system() -> Self {
        Self {
            fixed: None,
            last: None,
        }
    }

    pub fn fixed(at: OffsetDateTime) -> Self {
        Self {
            fixed: Some(at),
            last: None,
        }
    }

    /// Current time, clamped so it is never earlier than a previous reading.
    pub fn now(&mut self) -> OffsetDateTime {
        let wall = self.fixed.unwrap_or_else(OffsetDateTime::now_utc);
        let now = match self.last {
            Some(last) if last > wall => last,
            _ => wall,
        };
        self.last = Some(now);
        now
    }

    /// Move a fixed clock forward; a system clock ignores this.
    pub fn advance(&mut self, by: Duration) {
        if let Some(at) = self.fixed.as_mut() {
            *at += by;
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_moves_only_when_advanced() {
        let mut clock = Clock::fixed(OffsetDateTime::UNIX_EPOCH);
        assert_eq!(clock.now(), OffsetDateTime::UNIX_EPOCH);
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), OffsetDateTime::UNIX_EPOCH + Duration::minutes(5));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let mut clock = Clock::system();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}

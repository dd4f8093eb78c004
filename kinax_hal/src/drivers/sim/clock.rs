use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time source for simulated motors.
#[derive(Debug)]
pub enum SimClock {
    /// Real elapsed time since creation.
    Wall(Instant),
    /// Advances only through [`SimClock::advance`].
    Manual(Mutex<Duration>),
}

impl SimClock {
    pub fn wall() -> Arc<Self> {
        Arc::new(Self::Wall(Instant::now()))
    }

    pub fn manual() -> Arc<Self> {
        Arc::new(Self::Manual(Mutex::new(Duration::ZERO)))
    }

    /// Time since the clock's epoch.
    pub fn now(&self) -> Duration {
        match self {
            Self::Wall(epoch) => epoch.elapsed(),
            Self::Manual(t) => *t.lock(),
        }
    }

    /// Step a manual clock forward. Ignored on a wall clock.
    pub fn advance(&self, dt: Duration) {
        if let Self::Manual(t) = self {
            *t.lock() += dt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = SimClock::manual();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(Duration::from_millis(1500));
        assert_eq!(clock.now(), Duration::from_millis(1500));
    }

    #[test]
    fn wall_clock_ignores_advance() {
        let clock = SimClock::wall();
        clock.advance(Duration::from_secs(3600));
        assert!(clock.now() < Duration::from_secs(3600));
    }
}

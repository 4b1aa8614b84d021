//! Cancellable timers driven by an injectable clock.
//!
//! Nothing here schedules callbacks on its own. The owner polls with the
//! current time (usually from a host `tick`) and acts on what fired, which
//! keeps timer behavior deterministic under test.

use std::cell::Cell;
use std::rc::Rc;

#[cfg(not(target_arch = "wasm32"))]
pub use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
pub use web_time::{Duration, Instant};

/// Time source.
pub trait Clock {
    /// Monotonic now.
    fn now(&self) -> Instant;

    /// Wall clock, milliseconds since the Unix epoch.
    fn epoch_millis(&self) -> u64;
}

/// Real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_millis(&self) -> u64 {
        #[cfg(not(target_arch = "wasm32"))]
        use std::time::{SystemTime, UNIX_EPOCH};
        #[cfg(target_arch = "wasm32")]
        use web_time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Hand-advanced clock for tests and replay.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Rc<Cell<Duration>>,
    epoch_base: Rc<Cell<u64>>,
}

impl ManualClock {
    /// A clock whose wall time starts at `epoch_millis`.
    pub fn new(epoch_millis: u64) -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
            epoch_base: Rc::new(Cell::new(epoch_millis)),
        }
    }

    /// Move both monotonic and wall time forward.
    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }

    /// Jump the wall clock without touching monotonic time.
    pub fn set_epoch_millis(&self, epoch_millis: u64) {
        self.epoch_base
            .set(epoch_millis.saturating_sub(self.elapsed.get().as_millis() as u64));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed.get()
    }

    fn epoch_millis(&self) -> u64 {
        self.epoch_base.get() + self.elapsed.get().as_millis() as u64
    }
}

/// One-shot timer. Scheduling again replaces the pending deadline.
#[derive(Debug, Default)]
pub struct Timer {
    deadline: Cell<Option<Instant>>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire at `now + delay`, replacing any pending deadline.
    pub fn schedule(&self, now: Instant, delay: Duration) {
        self.deadline.set(Some(now + delay));
    }

    pub fn cancel(&self) {
        self.deadline.set(None);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.get().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.get()
    }

    /// Whether the deadline has passed. Does not consume it.
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.get().is_some_and(|d| now >= d)
    }

    /// Consume the deadline if it has passed.
    pub fn fire_if_due(&self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline.set(None);
            true
        } else {
            false
        }
    }
}

/// Repeating timer.
#[derive(Debug)]
pub struct Interval {
    period: Duration,
    next: Cell<Option<Instant>>,
}

impl Interval {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next: Cell::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn start(&self, now: Instant) {
        self.next.set(Some(now + self.period));
    }

    pub fn stop(&self) {
        self.next.set(None);
    }

    pub fn is_running(&self) -> bool {
        self.next.get().is_some()
    }

    /// Returns true once per elapsed period. Missed periods collapse into
    /// one firing.
    pub fn poll(&self, now: Instant) -> bool {
        match self.next.get() {
            Some(next) if now >= next => {
                self.next.set(Some(now + self.period));
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_reschedule_replaces_deadline() {
        let clock = ManualClock::new(0);
        let timer = Timer::new();
        timer.schedule(clock.now(), Duration::from_secs(2));
        clock.advance(Duration::from_secs(1));
        timer.schedule(clock.now(), Duration::from_secs(2));
        clock.advance(Duration::from_millis(1500));
        assert!(!timer.fire_if_due(clock.now()));
        clock.advance(Duration::from_millis(500));
        assert!(timer.fire_if_due(clock.now()));
        assert!(!timer.is_pending());
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let clock = ManualClock::new(0);
        let timer = Timer::new();
        timer.schedule(clock.now(), Duration::from_millis(10));
        timer.cancel();
        clock.advance(Duration::from_secs(1));
        assert!(!timer.fire_if_due(clock.now()));
    }

    #[test]
    fn test_interval_collapses_missed_periods() {
        let clock = ManualClock::new(0);
        let interval = Interval::new(Duration::from_secs(60));
        interval.start(clock.now());
        assert!(!interval.poll(clock.now()));
        clock.advance(Duration::from_secs(200));
        assert!(interval.poll(clock.now()));
        assert!(!interval.poll(clock.now()));
        interval.stop();
        clock.advance(Duration::from_secs(200));
        assert!(!interval.poll(clock.now()));
    }

    #[test]
    fn test_manual_clock_wall_time() {
        let clock = ManualClock::new(1_000);
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.epoch_millis(), 1_250);
        clock.set_epoch_millis(10_000);
        assert_eq!(clock.epoch_millis(), 10_000);
        clock.advance(Duration::from_millis(1));
        assert_eq!(clock.epoch_millis(), 10_001);
    }
}

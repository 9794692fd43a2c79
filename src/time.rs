use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Millisecond time source used by every rate limiter in the engine.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Monotonic wall time measured from construction.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Externally driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self { now: AtomicU64::new(start_millis) }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Lets at most one caller through per interval; concurrent callers race on a
/// compare-exchange so a slot is never claimed twice.
#[derive(Debug)]
pub struct Throttle {
    interval_ms: u64,
    last: AtomicU64,
}

const NEVER: u64 = u64::MAX;

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self { interval_ms: interval.as_millis() as u64, last: AtomicU64::new(NEVER) }
    }

    pub fn try_claim(&self, now_ms: u64) -> bool {
        let last = self.last.load(Ordering::Acquire);
        if last != NEVER && now_ms.saturating_sub(last) < self.interval_ms {
            return false;
        }
        self.last.compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    /// Forgets the last claim so the next call passes immediately.
    pub fn reset(&self) {
        self.last.store(NEVER, Ordering::Release);
    }
}

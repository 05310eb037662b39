//! Time primitives shared across the engine.

use std::{
    fmt,
    sync::atomic::{AtomicI64, Ordering},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Seconds since the Unix epoch, aligned to whatever timeframe the caller cares about.
///
/// Bars are keyed by the timestamp of the period open (spec.md §3); this type carries no
/// timeframe information of its own, just the instant.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixSeconds(pub i64);

impl UnixSeconds {
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }
}

impl fmt::Display for UnixSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add<i64> for UnixSeconds {
    type Output = UnixSeconds;
    fn add(self, rhs: i64) -> Self::Output {
        UnixSeconds(self.0 + rhs)
    }
}

impl std::ops::Sub<i64> for UnixSeconds {
    type Output = UnixSeconds;
    fn sub(self, rhs: i64) -> Self::Output {
        UnixSeconds(self.0 - rhs)
    }
}

/// A source of wall-clock time, abstracted so backtests can run against deterministic,
/// message-driven time instead of the real clock (spec.md §4.8: "no clock advancement beyond
/// message timestamps").
pub trait Clock: Send + Sync {
    fn now(&self) -> UnixSeconds;
}

/// The real system clock, used by live nodes.
#[derive(Default, Debug, Clone, Copy)]
pub struct LiveClock;

impl Clock for LiveClock {
    fn now(&self) -> UnixSeconds {
        UnixSeconds::now()
    }
}

/// A settable clock for deterministic tests and for replay, where "now" tracks the timestamp
/// of the most recently processed message rather than the wall clock.
#[derive(Debug)]
pub struct TestClock {
    current: AtomicI64,
}

impl TestClock {
    #[must_use]
    pub fn new(start: UnixSeconds) -> Self {
        Self {
            current: AtomicI64::new(start.0),
        }
    }

    pub fn set(&self, value: UnixSeconds) {
        self.current.store(value.0, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: i64) {
        self.current.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now(&self) -> UnixSeconds {
        UnixSeconds(self.current.load(Ordering::SeqCst))
    }
}

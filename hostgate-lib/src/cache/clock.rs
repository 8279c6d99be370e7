//! Wall-clock sources for cache entry ages.

use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

/// Source of the current time.
///
/// Cache entries are stamped with wall-clock time, so a clock that jumps
/// backwards can make entries look like they come from the future.
pub trait Clock: Send + Sync + Debug {
    /// Get the current time
    fn now(&self) -> SystemTime;
}

/// The system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
///
/// All clones share the same time, so a test can keep one handle and give
/// another to the client.
///
/// ```
/// use hostgate_lib::cache::{Clock, ManualClock};
/// use std::time::{Duration, SystemTime};
///
/// let clock = ManualClock::new(SystemTime::UNIX_EPOCH);
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now(), SystemTime::UNIX_EPOCH + Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<SystemTime>>,
}

impl ManualClock {
    /// Create a clock standing at `start`
    #[must_use]
    pub fn new(start: SystemTime) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }

    /// Move the clock backward
    pub fn rewind(&self, by: Duration) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) -= by;
    }

    /// Set the clock to `time`
    pub fn set(&self, time: SystemTime) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(SystemTime::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

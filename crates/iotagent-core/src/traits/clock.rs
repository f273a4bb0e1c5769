//! Time source abstraction

use chrono::{DateTime, Utc};

/// Source of the current time
///
/// Injected so expiry and throttle behavior can be tested with a manual
/// clock instead of sleeping.
pub trait Clock: Send + Sync {
    /// The current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Clock
///
/// Source of "now" for every visibility decision. Handlers read the time once
/// per request and hand it to the policy, so a request is judged against a
/// single instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// FixedClock
///
/// Always answers the same instant. Used by tests to pin scheduled posts
/// on either side of "now".
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub type ClockState = Arc<dyn Clock>;

use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;

/// Blocking wait used for device settle times.
///
/// Every settle delay the display driver needs goes through this trait, so tests can swap in a
/// virtual clock (see [crate::mock::MockClock]).
pub trait Delay: Debug + Send + Sync {
    fn delay(&self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&self, duration: Duration) {
        sleep(duration);
    }
}

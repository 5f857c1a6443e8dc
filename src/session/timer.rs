//! Per-session cancellable deadline.
//!
//! The timer is polled only by the session's own task, so expiry is always
//! observed on the session's serialized context. Rearming replaces the
//! previous deadline; a deadline that was replaced or cancelled never fires.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep_until, Instant, Sleep};

/// When a timed operation gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Relative to the moment the operation is applied.
    After(Duration),
    /// Absolute point in time.
    At(Instant),
}

impl Deadline {
    pub(crate) fn instant(self) -> Instant {
        match self {
            Deadline::After(duration) => Instant::now() + duration,
            Deadline::At(at) => at,
        }
    }
}

impl From<Duration> for Deadline {
    fn from(duration: Duration) -> Self {
        Deadline::After(duration)
    }
}

impl From<Instant> for Deadline {
    fn from(at: Instant) -> Self {
        Deadline::At(at)
    }
}

/// The operation an armed deadline is guarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Guard {
    Read,
    /// The write of one queued entry, named by its queue id.
    Write(u64),
    Wait,
}

#[derive(Debug, Default)]
pub(crate) struct Timer {
    armed: Option<Guard>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Timer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn arm(&mut self, deadline: Deadline, guard: Guard) {
        let at = deadline.instant();
        match self.sleep.as_mut() {
            Some(sleep) => sleep.as_mut().reset(at),
            None => self.sleep = Some(Box::pin(sleep_until(at))),
        }
        self.armed = Some(guard);
    }

    pub(crate) fn cancel(&mut self) {
        self.armed = None;
    }

    /// Cancels only if the armed deadline guards `guard`.
    pub(crate) fn cancel_if(&mut self, guard: Guard) {
        if self.armed == Some(guard) {
            self.armed = None;
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Resolves when the armed deadline passes, disarming the timer.
    ///
    /// Pends forever while disarmed. Dropping the future before it resolves
    /// leaves the timer untouched.
    pub(crate) async fn expired(&mut self) -> Guard {
        let (Some(guard), Some(sleep)) = (self.armed, self.sleep.as_mut()) else {
            return pending().await;
        };
        sleep.as_mut().await;
        self.armed = None;
        guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn fires_after_deadline() {
        let mut timer = Timer::new();
        timer.arm(Deadline::After(Duration::from_millis(50)), Guard::Read);

        let start = Instant::now();
        assert_eq!(timer.expired().await, Guard::Read);
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_supersedes_previous_deadline() {
        let mut timer = Timer::new();
        timer.arm(Deadline::After(Duration::from_millis(100)), Guard::Read);
        advance(Duration::from_millis(10)).await;
        timer.arm(Deadline::After(Duration::from_millis(500)), Guard::Write(1));

        let early = timeout(Duration::from_millis(400), timer.expired()).await;
        assert!(early.is_err());

        assert_eq!(timer.expired().await, Guard::Write(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let mut timer = Timer::new();
        timer.arm(Deadline::After(Duration::from_millis(5)), Guard::Wait);
        timer.cancel();

        let fired = timeout(Duration::from_secs(60), timer.expired()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_if_only_touches_matching_guard() {
        let mut timer = Timer::new();
        timer.arm(Deadline::After(Duration::from_millis(5)), Guard::Read);

        timer.cancel_if(Guard::Write(1));
        assert!(timer.is_armed());

        timer.cancel_if(Guard::Read);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn write_guard_is_cancelled_only_by_its_own_entry() {
        let mut timer = Timer::new();
        timer.arm(Deadline::After(Duration::from_millis(5)), Guard::Write(2));

        timer.cancel_if(Guard::Write(1));
        assert!(timer.is_armed());
        assert_eq!(timer.expired().await, Guard::Write(2));
    }

    #[test]
    fn absolute_deadline_is_kept() {
        let at = Instant::now() + Duration::from_secs(3);
        assert_eq!(Deadline::from(at).instant(), at);
    }
}

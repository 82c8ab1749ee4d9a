//! Per-target sliding window with a FIFO wait queue

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

/// At most `max_requests` grants per rolling `interval`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub max_requests: u32,
    pub interval: Duration,
}

impl Quota {
    pub fn new(max_requests: u32, interval: Duration) -> Self {
        Self {
            max_requests,
            interval,
        }
    }

    pub fn per_second(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(1))
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

/// What the window needs after a drain pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrainOutcome {
    /// Queue is empty, nothing to schedule
    Idle,
    /// Waiters remain; the next grant is possible at this instant
    WaitUntil(Instant),
    /// Waiters remain but the quota never admits anyone
    Blocked,
}

#[derive(Debug)]
pub(crate) struct TargetWindow {
    quota: Quota,
    /// Grant instants still inside the rolling window, oldest first
    grants: VecDeque<Instant>,
    waiters: VecDeque<oneshot::Sender<()>>,
    /// A timer task owns the next drain
    pub(crate) draining: bool,
}

impl TargetWindow {
    pub(crate) fn new(quota: Quota) -> Self {
        Self {
            quota,
            grants: VecDeque::new(),
            waiters: VecDeque::new(),
            draining: false,
        }
    }

    pub(crate) fn quota(&self) -> Quota {
        self.quota
    }

    pub(crate) fn set_quota(&mut self, quota: Quota) {
        self.quota = quota;
    }

    pub(crate) fn enqueue(&mut self, waiter: oneshot::Sender<()>) {
        self.waiters.push_back(waiter);
    }

    /// Waiters whose caller is still listening
    pub(crate) fn queue_depth(&self) -> usize {
        self.waiters.iter().filter(|w| !w.is_closed()).count()
    }

    /// Drop every queued waiter; their callers observe cancellation
    pub(crate) fn cancel_all(&mut self) -> usize {
        let cancelled = self.waiters.len();
        self.waiters.clear();
        self.draining = false;
        cancelled
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.grants.front() {
            if now.saturating_duration_since(oldest) >= self.quota.interval {
                self.grants.pop_front();
            } else {
                break;
            }
        }
    }

    /// Release queued waiters in arrival order while the window has room
    ///
    /// Waiters whose caller already gave up are skipped without consuming a
    /// grant. Once a waiter has been released the grant counts even if the
    /// caller abandons the request afterwards.
    pub(crate) fn drain(&mut self, now: Instant) -> DrainOutcome {
        self.prune(now);

        while (self.grants.len() as u64) < self.quota.max_requests as u64 {
            let Some(waiter) = self.waiters.pop_front() else {
                break;
            };
            if waiter.send(()).is_ok() {
                self.grants.push_back(now);
            }
        }

        // Leading waiters that hung up don't need a timer
        while self.waiters.front().is_some_and(|w| w.is_closed()) {
            self.waiters.pop_front();
        }

        if self.waiters.is_empty() {
            return DrainOutcome::Idle;
        }

        match self.grants.front() {
            Some(&oldest) => DrainOutcome::WaitUntil(oldest + self.quota.interval),
            None => DrainOutcome::Blocked,
        }
    }
}

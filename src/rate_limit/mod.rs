//! Per-target request throttling
//!
//! Each target (platform) gets an independent rolling window of
//! `max_requests` per `interval`. Callers that arrive while the window is
//! full wait in a FIFO queue and are released strictly in arrival order by a
//! single timer task per target.

mod window;

pub use window::Quota;

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ScrapeConfig;
use crate::error::{Result, ScrapeError};
use window::{DrainOutcome, TargetWindow};

/// Queue depth at which a backpressure warning is logged
const QUEUE_DEPTH_WARNING: usize = 64;

type SharedWindow = Arc<Mutex<TargetWindow>>;

/// FIFO rate limiter keyed by target
///
/// A quota with `max_requests == 0` admits nobody: every `throttle` call for
/// that target waits until the quota is reconfigured or the limiter is closed.
pub struct RateLimiter {
    targets: Arc<DashMap<String, SharedWindow>>,
    default_quota: Quota,
    max_queue_depth: Option<usize>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl RateLimiter {
    /// Create a limiter where unconfigured targets use `default_quota`
    pub fn new(default_quota: Quota) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            targets: Arc::new(DashMap::new()),
            default_quota,
            max_queue_depth: None,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Create a limiter with one quota per configured platform
    pub fn from_config(config: &ScrapeConfig) -> Self {
        let limiter = Self::new(config.default_quota()).with_max_queue_depth(config.max_queue_depth);
        for (platform, platform_config) in &config.platforms {
            limiter.configure(platform.as_str(), platform_config.quota());
        }
        limiter
    }

    /// Reject `throttle` calls once this many callers are already waiting
    pub fn with_max_queue_depth(mut self, depth: Option<usize>) -> Self {
        self.max_queue_depth = depth;
        self
    }

    /// Set or replace the quota for `target`
    pub fn configure(&self, target: &str, quota: Quota) {
        if quota.max_requests == 0 {
            warn!(
                "Quota for {} admits no requests; throttle calls will wait indefinitely",
                target
            );
        }

        let window = self
            .targets
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TargetWindow::new(quota))))
            .clone();

        window.lock().set_quota(quota);
        debug!(
            "Configured {} for {} requests per {:?}",
            target, quota.max_requests, quota.interval
        );
        self.schedule(target, &window);
    }

    /// Current quota for `target`
    pub fn quota(&self, target: &str) -> Quota {
        self.targets
            .get(target)
            .map(|w| w.lock().quota())
            .unwrap_or(self.default_quota)
    }

    /// Wait until a request to `target` may be issued
    ///
    /// Only fails when the limiter is closed while waiting, or when a queue
    /// cap is configured and already reached.
    pub async fn throttle(&self, target: &str) -> Result<()> {
        let window = self.window(target);
        let (tx, rx) = oneshot::channel();

        {
            let mut guard = window.lock();
            if self.is_closed() {
                return Err(ScrapeError::LimiterClosed {
                    target: target.to_string(),
                });
            }

            let depth = guard.queue_depth();
            if let Some(max) = self.max_queue_depth {
                if depth >= max {
                    warn!("Throttle queue for {} is full ({} waiting)", target, depth);
                    return Err(ScrapeError::QueueFull {
                        target: target.to_string(),
                        depth,
                    });
                }
            }
            if depth + 1 == QUEUE_DEPTH_WARNING {
                warn!("Throttle queue for {} reached {} waiting callers", target, depth + 1);
            }

            guard.enqueue(tx);
        }

        self.schedule(target, &window);

        rx.await.map_err(|_| ScrapeError::LimiterClosed {
            target: target.to_string(),
        })
    }

    /// Number of callers waiting on `target`
    pub fn queue_depth(&self, target: &str) -> usize {
        self.targets
            .get(target)
            .map(|w| w.lock().queue_depth())
            .unwrap_or(0)
    }

    /// Waiting callers across all targets
    pub fn total_queue_depth(&self) -> usize {
        self.targets.iter().map(|w| w.lock().queue_depth()).sum()
    }

    /// Cancel every queued caller and refuse new ones
    pub fn close(&self) {
        self.shutdown.send_replace(true);

        let mut cancelled = 0;
        for entry in self.targets.iter() {
            cancelled += entry.value().lock().cancel_all();
        }
        info!("Rate limiter closed, cancelled {} queued requests", cancelled);
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn window(&self, target: &str) -> SharedWindow {
        self.targets
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TargetWindow::new(self.default_quota))))
            .clone()
    }

    /// Drain what can be granted now; arm the target's timer if waiters remain
    fn schedule(&self, target: &str, window: &SharedWindow) {
        let deadline = {
            let mut guard = window.lock();
            if guard.draining {
                return;
            }
            match guard.drain(Instant::now()) {
                DrainOutcome::WaitUntil(deadline) => {
                    guard.draining = true;
                    deadline
                }
                DrainOutcome::Idle | DrainOutcome::Blocked => return,
            }
        };

        debug!("Throttling {}: next grant at {:?}", target, deadline);
        tokio::spawn(drain_loop(
            target.to_string(),
            window.clone(),
            deadline,
            self.shutdown.subscribe(),
        ));
    }
}

/// Timer task that keeps releasing waiters for one target until its queue empties
async fn drain_loop(
    target: String,
    window: SharedWindow,
    mut deadline: Instant,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                let mut guard = window.lock();
                // Grants may have expired or the quota changed since we slept
                match guard.drain(Instant::now()) {
                    DrainOutcome::WaitUntil(next) => deadline = next,
                    DrainOutcome::Idle | DrainOutcome::Blocked => {
                        guard.draining = false;
                        break;
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("Drain timer for {} stopped", target);
                    window.lock().draining = false;
                    break;
                }
            }
        }
    }
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            targets: Arc::clone(&self.targets),
            default_quota: self.default_quota,
            max_queue_depth: self.max_queue_depth,
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

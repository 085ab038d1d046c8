//! Two-channel cooperative cancellation.
//!
//! The *full* channel aborts every loop of a run. The *single* channel only interrupts the
//! suspension currently in progress, which is how fast-forward hands control to its own queue.
//! Rearming a channel swaps in a fresh [`CancellationToken`]; waiters that captured the old
//! token still observe the signal.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub const DEFAULT_RESET_GRACE: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub struct Resetter {
    full: Mutex<CancellationToken>,
    single: Mutex<CancellationToken>,
    grace: Duration,
}

impl Default for Resetter {
    fn default() -> Self {
        Self::new(DEFAULT_RESET_GRACE)
    }
}

fn lock(token: &Mutex<CancellationToken>) -> MutexGuard<'_, CancellationToken> {
    token.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Resetter {
    pub fn new(grace: Duration) -> Self {
        Self {
            full: Mutex::new(CancellationToken::new()),
            single: Mutex::new(CancellationToken::new()),
            grace,
        }
    }

    /// Signal a full reset, give suspended waiters `grace` to observe it, then rearm.
    pub async fn reset(&self) {
        let token = self.reset_token();
        token.cancel();
        tokio::time::sleep(self.grace).await;
        let mut current = lock(&self.full);
        if current.is_cancelled() {
            *current = CancellationToken::new();
        }
    }

    pub fn is_reset(&self) -> bool {
        lock(&self.full).is_cancelled()
    }

    /// The token of the current full-reset cycle.
    pub fn reset_token(&self) -> CancellationToken {
        lock(&self.full).clone()
    }

    pub fn single_reset(&self) {
        lock(&self.single).cancel();
    }

    pub fn is_single_reset(&self) -> bool {
        lock(&self.single).is_cancelled()
    }

    pub fn single_reset_token(&self) -> CancellationToken {
        lock(&self.single).clone()
    }

    /// Rearm the single channel after its signal was observed. No-op if it is not signaled,
    /// so several observers of the same signal rearm it once between them.
    pub fn rearm_single(&self) {
        let mut current = lock(&self.single);
        if current.is_cancelled() {
            *current = CancellationToken::new();
        }
    }
}

/// How a [`wait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Reset,
    SingleReset,
}

/// Suspend for `ms`, or until either reset channel fires, whichever comes first.
///
/// A zero delay still yields once so other part loops get to run.
pub async fn wait(ms: u64, full: &CancellationToken, single: &CancellationToken) -> WaitOutcome {
    if full.is_cancelled() {
        return WaitOutcome::Reset;
    }
    if single.is_cancelled() {
        return WaitOutcome::SingleReset;
    }
    if ms == 0 {
        tokio::task::yield_now().await;
        return WaitOutcome::Elapsed;
    }

    tokio::select! {
        biased;
        _ = full.cancelled() => WaitOutcome::Reset,
        _ = single.cancelled() => WaitOutcome::SingleReset,
        _ = tokio::time::sleep(Duration::from_millis(ms)) => WaitOutcome::Elapsed,
    }
}

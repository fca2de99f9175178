//! Human-like request pacing.
//!
//! Every delay in the monitor is a base duration jittered uniformly within
//! `[0.5×base, 1.5×base]`. All sleeps go through [`Pacer::pause`], which
//! races the shutdown token so a host can stop the loop between units of
//! work.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Lower bound of the jitter band, as a fraction of the base delay.
pub const JITTER_LOW: f64 = 0.5;
/// Upper bound of the jitter band, as a fraction of the base delay.
pub const JITTER_HIGH: f64 = 1.5;

/// Shutdown was requested while waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("shutdown requested")]
pub struct Cancelled;

/// Random source plus shutdown token shared by every stage of a cycle.
pub struct Pacer {
    rng: Mutex<Box<dyn RngCore + Send>>,
    shutdown: CancellationToken,
}

impl Pacer {
    /// Create a pacer over an injected random source.
    pub fn new(rng: Box<dyn RngCore + Send>, shutdown: CancellationToken) -> Self {
        Self {
            rng: Mutex::new(rng),
            shutdown,
        }
    }

    /// Create a pacer seeded from the operating system.
    pub fn from_os_rng(shutdown: CancellationToken) -> Self {
        Self::new(Box::new(StdRng::from_os_rng()), shutdown)
    }

    /// Create a deterministic pacer (used by tests and dry runs).
    pub fn seeded(seed: u64, shutdown: CancellationToken) -> Self {
        Self::new(Box::new(StdRng::seed_from_u64(seed)), shutdown)
    }

    /// Draw a delay uniformly from the jitter band around `base`.
    pub fn jittered(&self, base: Duration) -> Duration {
        if base.is_zero() {
            return Duration::ZERO;
        }
        let secs = base.as_secs_f64();
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let drawn = rng.random_range(secs * JITTER_LOW..=secs * JITTER_HIGH);
        // Bands near Duration::MAX overflow when widened.
        Duration::try_from_secs_f64(drawn).unwrap_or(Duration::MAX)
    }

    /// Sleep a jittered `base`, waking early if shutdown is requested.
    pub async fn pause(&self, base: Duration, reason: &str) -> Result<(), Cancelled> {
        self.check()?;
        self.sleep_exact(self.jittered(base), reason).await
    }

    /// Sleep exactly `delay` (already jittered by the caller).
    pub async fn sleep_exact(&self, delay: Duration, reason: &str) -> Result<(), Cancelled> {
        self.check()?;
        if delay.is_zero() {
            debug!("No delay {}", reason);
            return Ok(());
        }

        info!(
            delay_secs = delay.as_secs_f64(),
            "Sleeping {:.1}s {}",
            delay.as_secs_f64(),
            reason
        );
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Fail fast if shutdown has been requested.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.shutdown.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token that cancels every pending and future pause.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Shuffle in place using the injected source.
    pub fn shuffle<T>(&self, items: &mut [T]) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        items.shuffle(&mut *rng);
    }

    /// Pick one element uniformly, or `None` for an empty slice.
    pub fn choose<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let idx = rng.random_range(0..items.len());
        items.get(idx)
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer")
            .field("cancelled", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

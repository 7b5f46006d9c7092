//! Stop requests for a running batch.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

const NONE: u8 = 0;
const GRACEFUL: u8 = 1;
const FORCEFUL: u8 = 2;

/// How a running batch should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopMode {
    /// Finish the current job, then stop before the next one.
    Graceful,
    /// Abort the current job at the next opportunity and delete its partial artifacts.
    #[serde(alias = "force")]
    Forceful,
}

/// Shared stop flag, set from the control side and polled by the render loop.
///
/// A forceful request is never downgraded by a later graceful one.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    mode: Arc<AtomicU8>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, mode: StopMode) {
        let value = match mode {
            StopMode::Graceful => GRACEFUL,
            StopMode::Forceful => FORCEFUL,
        };
        self.mode.fetch_max(value, Ordering::SeqCst);
    }

    pub fn requested(&self) -> Option<StopMode> {
        match self.mode.load(Ordering::SeqCst) {
            GRACEFUL => Some(StopMode::Graceful),
            FORCEFUL => Some(StopMode::Forceful),
            _ => None,
        }
    }

    pub fn is_forceful(&self) -> bool {
        self.mode.load(Ordering::SeqCst) == FORCEFUL
    }

    /// Clears any pending request. Called when a batch is submitted.
    pub fn reset(&self) {
        self.mode.store(NONE, Ordering::SeqCst);
    }

    /// Read-only view handed to pipeline adapters.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            mode: Arc::clone(&self.mode),
        }
    }
}

/// Cancellation token passed into long-running adapter calls.
///
/// Only a forceful stop cancels in-flight work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    mode: Arc<AtomicU8>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.mode.load(Ordering::SeqCst) == FORCEFUL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear() {
        let stop = StopSignal::new();
        assert_eq!(stop.requested(), None);
        assert!(!stop.token().is_cancelled());
    }

    #[test]
    fn graceful_does_not_cancel_token() {
        let stop = StopSignal::new();
        let token = stop.token();
        stop.request(StopMode::Graceful);
        assert_eq!(stop.requested(), Some(StopMode::Graceful));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn forceful_cancels_and_is_not_downgraded() {
        let stop = StopSignal::new();
        let token = stop.token();
        stop.request(StopMode::Forceful);
        stop.request(StopMode::Graceful);
        assert!(stop.is_forceful());
        assert!(token.is_cancelled());

        stop.reset();
        assert_eq!(stop.requested(), None);
        assert!(!token.is_cancelled());
    }
}

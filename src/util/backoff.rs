use std::sync::atomic::{AtomicUsize, Ordering};

/// What an idle worker should do after its latest dispatch miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdleStage {
    /// Give up the time slice.
    Yield,
    /// Sleep ~10 microseconds.
    ShortSleep,
    /// Sleep ~100 microseconds.
    LongSleep,
    /// Advertise as sleeping and sleep ~1 millisecond.
    Deep,
}

/// Consecutive-miss counter driving the idle ladder.
///
/// The counter is atomic because the submit path resets it from
/// other threads as a wake hint; a reset drops the worker back to
/// the cheap end of the ladder on its next miss.
#[derive(Debug)]
pub(crate) struct Backoff {
    misses: AtomicUsize,
}

impl Backoff {
    const YIELD_LIMIT: usize = 10;
    const SHORT_SLEEP_LIMIT: usize = 20;
    const LONG_SLEEP_LIMIT: usize = 100;

    pub(crate) fn new() -> Self {
        Self {
            misses: AtomicUsize::new(0),
        }
    }

    pub(crate) fn reset(&self) {
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Record one dispatch miss and return the escalation stage.
    pub(crate) fn miss(&self) -> IdleStage {
        let misses = self.misses.fetch_add(1, Ordering::Relaxed);

        if misses < Self::YIELD_LIMIT {
            IdleStage::Yield
        } else if misses < Self::SHORT_SLEEP_LIMIT {
            IdleStage::ShortSleep
        } else if misses < Self::LONG_SLEEP_LIMIT {
            IdleStage::LongSleep
        } else {
            IdleStage::Deep
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A request generation.
///
/// Every asynchronous continuation captures the epoch that was current
/// when its request started, and compares it against the tracker before
/// touching any shared state. A mismatch means the result is stale and
/// must be discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Epoch(u64);

/// Tracks the currently-valid request generation.
///
/// This is the sole cancellation mechanism: cancelling is a bump with no
/// new request issued. In-flight I/O is never force-aborted; its
/// callbacks simply notice the mismatch and drop their results.
#[derive(Clone, Debug, Default)]
pub struct EpochTracker {
    current: Arc<AtomicU64>,
}

impl EpochTracker {
    /// Creates a tracker starting at generation zero.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidates the previous generation and returns the new one.
    #[inline]
    pub fn bump(&self) -> Epoch {
        Epoch(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Returns the current generation.
    #[inline]
    pub fn current(&self) -> Epoch {
        Epoch(self.current.load(Ordering::SeqCst))
    }

    /// Returns whether `epoch` is still the current generation.
    #[inline]
    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.current() == epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_is_strictly_increasing() {
        let tracker = EpochTracker::new();
        let mut prev = tracker.current();
        for _ in 0..16 {
            let next = tracker.bump();
            assert!(next.0 > prev.0);
            prev = next;
        }
    }

    #[test]
    fn test_stale_epoch_is_detected() {
        let tracker = EpochTracker::new();
        let captured = tracker.bump();
        assert!(tracker.is_current(captured));

        tracker.bump();
        assert!(!tracker.is_current(captured));
    }

    #[test]
    fn test_clones_share_the_counter() {
        let tracker = EpochTracker::new();
        let clone = tracker.clone();
        let captured = tracker.bump();
        clone.bump();
        assert!(!tracker.is_current(captured));
    }
}

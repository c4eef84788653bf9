//! Bandwidth throttle, ported from `BandwidthThrottle.cpp`/`.hpp`.
//!
//! Fixed-period slices bound instantaneous burst to `slice_quota`
//! while amortising timer overhead. `next_slice_start` accumulates
//! monotonically and does not drift with callback latency: a late
//! slice fires immediately and the next one is still scheduled
//! relative to where it should have started.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

pub struct BandwidthThrottle {
    slice_quota: u64,
    slice_duration: Duration,
    next_slice_start: Instant,
}

impl BandwidthThrottle {
    /// `bandwidth` and `sampling_frequency` are both required to be
    /// non-zero by the configuration layer (spec §9: "reject
    /// `bandwidth < sampling_frequency` at parse time").
    pub fn new(bandwidth: u64, sampling_frequency: u64) -> Self {
        assert!(sampling_frequency > 0, "sampling frequency must be > 0");
        BandwidthThrottle {
            slice_quota: bandwidth / sampling_frequency,
            slice_duration: Duration::from_nanos(1_000_000_000 / sampling_frequency),
            next_slice_start: Instant::now(),
        }
    }

    pub fn slice_quota(&self) -> u64 {
        self.slice_quota
    }

    /// Reset the slice clock to "now", used just before the first
    /// transfer begins so warm-up delay isn't charged against the
    /// duration margin.
    pub fn reset(&mut self) {
        self.next_slice_start = Instant::now();
    }

    /// Wait for the next slice boundary and return its quota, or
    /// `None` if `abort` fired first (the caller must treat this
    /// exactly like a cancelled completion: no side effects).
    pub async fn next_slice(&mut self, abort: &mut watch::Receiver<bool>) -> Option<u64> {
        if *abort.borrow() {
            return None;
        }
        tokio::select! {
            biased;
            _ = abort.changed() => None,
            _ = tokio::time::sleep_until(self.next_slice_start) => {
                self.next_slice_start += self.slice_duration;
                Some(self.slice_quota)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_slice_quota_and_duration() {
        let t = BandwidthThrottle::new(128_000, 1000);
        assert_eq!(t.slice_quota(), 128);
        assert_eq!(t.slice_duration, Duration::from_millis(1));
    }

    #[test]
    fn integer_division_floors_quota() {
        // bandwidth < frequency would starve the caller; the configuration
        // layer is responsible for rejecting that case before construction.
        let t = BandwidthThrottle::new(999, 1000);
        assert_eq!(t.slice_quota(), 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn next_slice_advances_monotonically() {
        let mut t = BandwidthThrottle::new(1_000_000, 1000);
        t.reset();
        let (tx, mut rx) = watch::channel(false);
        let first = t.next_slice(&mut rx).await;
        assert_eq!(first, Some(1000));
        let second = t.next_slice(&mut rx).await;
        assert_eq!(second, Some(1000));
        drop(tx);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn abort_short_circuits_without_advancing() {
        let mut t = BandwidthThrottle::new(1_000_000, 1000);
        t.reset();
        let before = t.next_slice_start;
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        let result = t.next_slice(&mut rx).await;
        assert_eq!(result, None);
        assert_eq!(t.next_slice_start, before);
    }
}

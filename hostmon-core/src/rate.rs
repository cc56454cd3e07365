use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Smallest elapsed time used as a divisor.
pub const MIN_ELAPSED: Duration = Duration::from_millis(1);

/// Key for the whole-host total of a domain.
pub const AGGREGATE: &str = "aggregate";

/// Bytes per second in each direction between two samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ByteRate {
    pub recv_per_sec: f64,
    pub sent_per_sec: f64,
}

#[derive(Debug, Clone, Copy)]
struct Baseline {
    recv: u64,
    sent: u64,
    at: Instant,
}

/// Turns cumulative byte counters into per-second rates.
///
/// Keeps the last reading for every resource name. Methods take `&mut self`;
/// callers sharing one tracker between threads have to serialize access
/// themselves.
#[derive(Debug, Default)]
pub struct RateTracker {
    baselines: HashMap<String, Baseline>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reading for `name` and return the rate since the previous one.
    ///
    /// Returns `None` the first time a name is seen. A counter that went
    /// backwards (reset, wraparound) reports zero for that direction.
    pub fn rate(&mut self, name: &str, recv: u64, sent: u64, now: Instant) -> Option<ByteRate> {
        let current = Baseline {
            recv,
            sent,
            at: now,
        };

        let previous = match self.baselines.get_mut(name) {
            Some(slot) => std::mem::replace(slot, current),
            None => {
                self.baselines.insert(name.to_string(), current);
                return None;
            }
        };

        let elapsed = now
            .saturating_duration_since(previous.at)
            .max(MIN_ELAPSED)
            .as_secs_f64();

        Some(ByteRate {
            recv_per_sec: per_second(previous.recv, recv, elapsed),
            sent_per_sec: per_second(previous.sent, sent, elapsed),
        })
    }

    pub fn forget(&mut self, name: &str) -> bool {
        self.baselines.remove(name).is_some()
    }

    /// Drop baselines for every name not in `live`.
    pub fn retain_only<'a, I>(&mut self, live: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let live: std::collections::HashSet<&str> = live.into_iter().collect();
        self.baselines.retain(|name, _| live.contains(name.as_str()));
    }

    pub fn clear(&mut self) {
        self.baselines.clear();
    }

    pub fn is_tracking(&self, name: &str) -> bool {
        self.baselines.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }
}

fn per_second(previous: u64, current: u64, elapsed_secs: f64) -> f64 {
    if current <= previous {
        return 0.0;
    }
    (current - previous) as f64 / elapsed_secs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_first_reading_has_no_rate() {
        let mut tracker = RateTracker::new();
        assert!(tracker.rate("eth0", 0, 0, Instant::now()).is_none());
        assert!(tracker.is_tracking("eth0"));
    }

    #[test]
    fn test_rate_over_one_second() {
        let mut tracker = RateTracker::new();
        let t0 = Instant::now();
        tracker.rate("eth0", 0, 0, t0);

        let rate = tracker
            .rate("eth0", 1000, 500, t0 + Duration::from_secs(1))
            .unwrap();
        assert!(close(rate.recv_per_sec, 1000.0));
        assert!(close(rate.sent_per_sec, 500.0));
    }

    #[test]
    fn test_counter_reset_reports_zero_then_recovers() {
        let mut tracker = RateTracker::new();
        let t0 = Instant::now();
        tracker.rate("sda", 10_000, 20_000, t0);

        let reset = tracker
            .rate("sda", 100, 50, t0 + Duration::from_secs(1))
            .unwrap();
        assert_eq!(reset.recv_per_sec, 0.0);
        assert_eq!(reset.sent_per_sec, 0.0);

        let healed = tracker
            .rate("sda", 2100, 1050, t0 + Duration::from_secs(3))
            .unwrap();
        assert!(close(healed.recv_per_sec, 1000.0));
        assert!(close(healed.sent_per_sec, 500.0));
    }

    #[test]
    fn test_rapid_calls_use_minimum_elapsed() {
        let mut tracker = RateTracker::new();
        let t0 = Instant::now();
        tracker.rate("lo", 0, 0, t0);

        let rate = tracker.rate("lo", 5, 1, t0).unwrap();
        assert!(rate.recv_per_sec.is_finite());
        assert!(close(rate.recv_per_sec, 5000.0));
        assert!(close(rate.sent_per_sec, 1000.0));
    }

    #[test]
    fn test_names_are_independent() {
        let mut tracker = RateTracker::new();
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(2);

        tracker.rate("eth0", 0, 0, t0);
        tracker.rate(AGGREGATE, 0, 0, t0);

        let eth = tracker.rate("eth0", 200, 0, t1).unwrap();
        let agg = tracker.rate(AGGREGATE, 400, 0, t1).unwrap();
        assert!(close(eth.recv_per_sec, 100.0));
        assert!(close(agg.recv_per_sec, 200.0));
        assert!(tracker.rate("wlan0", 1, 1, t1).is_none());
    }

    #[test]
    fn test_forget_and_retain() {
        let mut tracker = RateTracker::new();
        let now = Instant::now();
        for name in ["eth0", "eth1", "docker0"] {
            tracker.rate(name, 0, 0, now);
        }

        assert!(tracker.forget("eth1"));
        assert!(!tracker.forget("eth1"));

        tracker.retain_only(["eth0"]);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.is_tracking("eth0"));

        tracker.clear();
        assert!(tracker.is_empty());
    }
}

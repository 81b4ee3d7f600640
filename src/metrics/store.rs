use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use super::types::Sample;

pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded, time-ordered sample buffer. Overflow evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `sample`. Timestamps that do not advance (clock jitter) are
    /// still accepted; rate math guards against non-positive elapsed time.
    pub fn append(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn first(&self) -> Option<Sample> {
        self.samples.front().copied()
    }

    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    /// The two most recent samples, oldest first.
    pub fn last_pair(&self) -> Option<(Sample, Sample)> {
        let len = self.samples.len();
        if len < 2 {
            return None;
        }
        Some((self.samples[len - 2], self.samples[len - 1]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    /// Samples within `minutes_back` of the latest sample. See [`Self::window_at`].
    pub fn window(&self, minutes_back: f64) -> Vec<Sample> {
        match self.latest() {
            Some(latest) => self.window_at(minutes_back, latest.timestamp),
            None => Vec::new(),
        }
    }

    /// Samples with `timestamp >= now - minutes_back`, anchored on the closest
    /// sample at or before that boundary when one exists, so the covered span
    /// is never shorter than requested while older data is available.
    pub fn window_at(&self, minutes_back: f64, now: DateTime<Utc>) -> Vec<Sample> {
        if self.samples.is_empty() {
            return Vec::new();
        }

        let millis = (minutes_back.max(0.0) * 60_000.0).min(i64::MAX as f64) as i64;
        let boundary = Duration::try_milliseconds(millis)
            .and_then(|span| now.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let at_or_before = self
            .samples
            .iter()
            .take_while(|sample| sample.timestamp <= boundary)
            .count();
        let start = at_or_before.saturating_sub(1);

        self.samples
            .iter()
            .skip(start)
            .take_while(|sample| sample.timestamp <= now)
            .copied()
            .collect()
    }
}

/// History shared between the sampling loop and the dashboard. The lock is only
/// held for short, synchronous sections and never across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedHistory {
    inner: Arc<Mutex<TimeSeriesStore>>,
}

impl SharedHistory {
    pub fn new(store: TimeSeriesStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, TimeSeriesStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.lock().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64, value: f64) -> Sample {
        Sample::new(Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(), value)
    }

    #[test]
    fn never_exceeds_capacity_and_evicts_oldest() {
        let mut store = TimeSeriesStore::with_capacity(3);
        for i in 0..10 {
            store.append(at(i, i as f64));
            assert!(store.len() <= 3);
        }

        let values: Vec<f64> = store.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![7.0, 8.0, 9.0]);
        assert_eq!(store.first().unwrap().value, 7.0);
        assert_eq!(store.latest().unwrap().value, 9.0);
    }

    #[test]
    fn default_capacity_is_one_hundred() {
        let mut store = TimeSeriesStore::new();
        for i in 0..150 {
            store.append(at(i, i as f64));
        }
        assert_eq!(store.len(), DEFAULT_CAPACITY);
        assert_eq!(store.first().unwrap().value, 50.0);
    }

    #[test]
    fn window_covering_everything_returns_whole_series() {
        let mut store = TimeSeriesStore::new();
        for i in 0..5 {
            store.append(at(i * 30, i as f64));
        }

        assert_eq!(store.window(5.0), store.to_vec());
    }

    #[test]
    fn window_anchors_on_sample_before_boundary() {
        let mut store = TimeSeriesStore::new();
        store.append(at(0, 10.0));
        store.append(at(100, 20.0));
        store.append(at(250, 30.0));
        store.append(at(300, 40.0));

        // boundary = 300 - 180 = 120; closest at or before it is t=100
        let window = store.window(3.0);
        let times: Vec<f64> = window.iter().map(|s| s.value).collect();
        assert_eq!(times, vec![20.0, 30.0, 40.0]);
    }

    #[test]
    fn window_starts_exactly_on_boundary_sample() {
        let mut store = TimeSeriesStore::new();
        store.append(at(0, 1.0));
        store.append(at(60, 2.0));
        store.append(at(180, 3.0));

        let window = store.window(2.0);
        assert_eq!(window.first().unwrap().value, 2.0);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn empty_store_has_empty_window() {
        let store = TimeSeriesStore::new();
        assert!(store.window(5.0).is_empty());
        assert!(store.latest().is_none());
        assert!(store.last_pair().is_none());
    }

    #[test]
    fn non_advancing_timestamps_are_accepted() {
        let mut store = TimeSeriesStore::new();
        store.append(at(10, 1.0));
        store.append(at(10, 2.0));
        store.append(at(5, 3.0));
        assert_eq!(store.len(), 3);
    }
}

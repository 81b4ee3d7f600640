//! Time-series storage and rate estimation for sampled values.

mod format;
mod store;
mod types;

pub use format::format_minutes;
pub use store::{SharedHistory, TimeSeriesStore, DEFAULT_CAPACITY};
pub use types::{Amortized, RateSnapshot, Sample};

/// Minutes elapsed from `prev` to `curr`; negative when the clock went backwards.
pub fn elapsed_minutes(prev: &Sample, curr: &Sample) -> f64 {
    let delta = curr.timestamp - prev.timestamp;
    delta.num_milliseconds() as f64 / 60_000.0
}

/// Change per minute between two samples. Non-positive elapsed time is a clock
/// anomaly and yields 0 instead of an error.
pub fn instantaneous(prev: &Sample, curr: &Sample) -> f64 {
    let minutes = elapsed_minutes(prev, curr);
    if minutes <= 0.0 {
        return 0.0;
    }
    (curr.value - prev.value) / minutes
}

/// Oldest-to-newest change across the trailing `window_minutes` of `store`.
pub fn amortized(store: &TimeSeriesStore, window_minutes: f64) -> Amortized {
    if store.len() < 2 {
        return Amortized::default();
    }

    let window = store.window(window_minutes);
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return Amortized::default();
    };

    let increase = last.value - first.value;
    let span_minutes = elapsed_minutes(first, last);
    let rate = if span_minutes > 0.0 {
        increase / span_minutes
    } else {
        0.0
    };

    Amortized {
        increase,
        span_minutes,
        rate,
    }
}

pub fn projected_hourly(rate_per_minute: f64) -> f64 {
    rate_per_minute * 60.0
}

/// Minutes until `current` reaches `target` at `rate` per minute, or `None`
/// when the value is not growing.
pub fn time_to_target_minutes(current: f64, target: f64, rate: f64) -> Option<f64> {
    if rate <= 0.0 || !rate.is_finite() {
        return None;
    }
    Some((target - current).max(0.0) / rate)
}

/// Rebuilds the rate snapshot from the store's current contents.
pub fn snapshot(store: &TimeSeriesStore, window_minutes: f64) -> RateSnapshot {
    let instantaneous_rate = store
        .last_pair()
        .map(|(prev, curr)| instantaneous(&prev, &curr))
        .unwrap_or(0.0);
    let window = amortized(store, window_minutes);

    RateSnapshot {
        instantaneous_rate,
        amortized_rate: window.rate,
        window_minutes,
        span_minutes: window.span_minutes,
        total_increase: window.increase,
    }
}

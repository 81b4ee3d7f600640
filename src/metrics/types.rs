use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observation of the tracked value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Change over a trailing window: `(increase, span_minutes, rate)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Amortized {
    pub increase: f64,
    pub span_minutes: f64,
    pub rate: f64,
}

/// Rates derived after each successful sample. Replaced wholesale, never patched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub instantaneous_rate: f64,
    pub amortized_rate: f64,
    pub window_minutes: f64,
    pub span_minutes: f64,
    pub total_increase: f64,
}

impl RateSnapshot {
    /// The rate shown to the user: amortized when it is positive, otherwise the
    /// instantaneous rate so sparse data still shows movement.
    pub fn current_rate(&self) -> f64 {
        if self.amortized_rate > 0.0 {
            self.amortized_rate
        } else {
            self.instantaneous_rate
        }
    }

    pub fn projected_hourly(&self) -> f64 {
        super::projected_hourly(self.current_rate())
    }
}

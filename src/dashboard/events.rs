use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metrics::{RateSnapshot, Sample};
use crate::sensing::LoopState;

/// Everything the sampling side hands to the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MonitorEvent {
    Reading(ReadingEvent),
    Failure(FailureEvent),
    StateChanged { state: LoopState },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingEvent {
    pub sample: Sample,
    pub text: String,
    pub snapshot: RateSnapshot,
    pub time_to_target_minutes: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEvent {
    pub kind: &'static str,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

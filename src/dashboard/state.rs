use crate::metrics::format_minutes;
use crate::sensing::LoopState;

use super::events::{FailureEvent, MonitorEvent, ReadingEvent};

/// What the dashboard currently shows. Owned and mutated by the dashboard's own
/// task only; the sampling loop reaches it through [`MonitorEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub loop_state: LoopState,
    pub last_reading: Option<ReadingEvent>,
    /// Passive status: the most recent failure since the last good reading.
    pub last_error: Option<FailureEvent>,
    pub readings: u64,
    pub failures: u64,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::Reading(reading) => {
                self.readings += 1;
                self.last_error = None;
                self.last_reading = Some(reading);
            }
            MonitorEvent::Failure(failure) => {
                // Metrics keep showing the last good reading.
                self.failures += 1;
                self.last_error = Some(failure);
            }
            MonitorEvent::StateChanged { state } => {
                self.loop_state = state;
                if state == LoopState::Running {
                    self.last_reading = None;
                    self.last_error = None;
                }
            }
        }
    }

    pub fn status_line(&self) -> String {
        let state = match self.loop_state {
            LoopState::Idle => "Not running",
            LoopState::Running => "Running",
        };
        match &self.last_error {
            Some(error) => format!("Status: {state} (last error: {})", error.reason),
            None => format!("Status: {state}"),
        }
    }

    pub fn render(&self) -> Vec<String> {
        let mut lines = vec![self.status_line()];

        let Some(reading) = &self.last_reading else {
            lines.push("Gold: N/A".into());
            lines.push("Gold per minute: N/A".into());
            lines.push("Time to next upgrade: N/A".into());
            return lines;
        };

        let snapshot = &reading.snapshot;
        lines.push(format!("Gold: {} (OCR text: {:?})", reading.sample.value, reading.text));
        lines.push(format!("Gold per minute: {:.2}", snapshot.current_rate()));
        lines.push(format!("Gold per hour: {:.0}", snapshot.projected_hourly()));
        lines.push(format!(
            "Window: +{:.0} over {:.1} of {:.1} minutes",
            snapshot.total_increase, snapshot.span_minutes, snapshot.window_minutes
        ));
        lines.push(match reading.time_to_target_minutes {
            Some(minutes) => format!("Time to next upgrade: {}", format_minutes(minutes)),
            None => "Time to next upgrade: N/A".into(),
        });
        lines
    }
}

//! Presentation side: the events the sampling loop publishes and the terminal
//! dashboard that consumes them.

pub mod commands;
mod events;
mod state;
mod terminal;

pub use commands::{parse_command, DashboardCommand};
pub use events::{FailureEvent, MonitorEvent, ReadingEvent};
pub use state::DashboardState;
pub use terminal::{run_terminal, CaptureFactory, Dashboard};

use std::path::PathBuf;
use std::sync::Arc;

use image::imageops::FilterType;
use image::ImageFormat;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::capture::CaptureBackend;
use crate::ocr::Recognizer;
use crate::selection::{PreviewScale, RegionSelection, SelectionInput, SelectionStage};
use crate::sensing::{sample_detached, Sampler, SamplingController};
use crate::settings::{ConfigError, SettingsStore};

use super::commands::{parse_command, DashboardCommand, HELP};
use super::events::MonitorEvent;
use super::state::DashboardState;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

const PREVIEW_MAX_WIDTH: u32 = 1600;
const PREVIEW_MAX_HEIGHT: u32 = 900;

/// Builds a capture backend for whichever context is about to capture.
pub type CaptureFactory = fn() -> Box<dyn CaptureBackend>;

/// Interactive front end: owns the loop controller, the displayed state and
/// any region selection in progress.
pub struct Dashboard {
    controller: SamplingController,
    settings: Arc<SettingsStore>,
    recognizer: Arc<dyn Recognizer>,
    new_capture: CaptureFactory,
    state: DashboardState,
    selection: Option<RegionSelection>,
    /// Scale of the last saved parent preview, for `pick-preview`.
    preview: Option<PreviewScale>,
}

impl Dashboard {
    /// Returns the dashboard and the receiving end of the loop's event channel.
    pub fn new(
        settings: Arc<SettingsStore>,
        recognizer: Arc<dyn Recognizer>,
        new_capture: CaptureFactory,
    ) -> (Self, UnboundedReceiver<MonitorEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let sampler = Sampler::new(new_capture(), Arc::clone(&recognizer));
        let controller = SamplingController::new(sampler, Arc::clone(&settings), events);

        let dashboard = Self {
            controller,
            settings,
            recognizer,
            new_capture,
            state: DashboardState::new(),
            selection: None,
            preview: None,
        };
        (dashboard, receiver)
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Folds a loop event into the display and returns what to print.
    pub fn on_event(&mut self, event: MonitorEvent) -> Vec<String> {
        let show = !matches!(event, MonitorEvent::StateChanged { .. });
        self.state.apply(event);
        if show {
            self.state.render()
        } else {
            vec![self.state.status_line()]
        }
    }

    pub async fn execute(&mut self, command: DashboardCommand) -> Vec<String> {
        match command {
            DashboardCommand::Start => {
                if self.controller.start() {
                    vec!["Sampling started".into()]
                } else {
                    vec!["Sampling is already running".into()]
                }
            }
            DashboardCommand::Stop => {
                if self.controller.stop().await {
                    vec!["Sampling stopped".into()]
                } else {
                    vec!["Sampling is not running".into()]
                }
            }
            DashboardCommand::Status => {
                let mut lines = self.state.render();
                lines.extend(self.settings_summary());
                lines
            }
            DashboardCommand::History => self.history_lines(),
            DashboardCommand::Test => self.test_ocr().await,
            DashboardCommand::Help => HELP.lines().map(str::to_string).collect(),
            DashboardCommand::Quit => {
                self.shutdown().await;
                vec!["Bye".into()]
            }
            DashboardCommand::Interval(seconds) => confirm(
                self.settings.set_capture_interval(seconds),
                format!("Capture interval set to {seconds} seconds"),
            ),
            DashboardCommand::Window(minutes) => confirm(
                self.settings.set_history_window(minutes),
                format!("Rate window set to {minutes} minutes"),
            ),
            DashboardCommand::Target(target) => confirm(
                self.settings.set_target_upgrade_cost(target),
                match target {
                    Some(gold) => format!("Target upgrade cost set to {gold}"),
                    None => "Target upgrade cost cleared".into(),
                },
            ),
            DashboardCommand::Area(area) => confirm(
                self.settings.set_capture_area(area),
                format!("OCR area set to {area}"),
            ),
            DashboardCommand::Parent(area) => confirm(
                self.settings.set_parent_area(area),
                format!("Capture area set to {area}"),
            ),
            DashboardCommand::TwoStep(enabled) => confirm(
                self.settings.set_two_step(enabled),
                format!(
                    "Two-step capture {}",
                    if enabled { "enabled" } else { "disabled" }
                ),
            ),
            DashboardCommand::Select => {
                let new_capture = self.new_capture;
                let screen = tokio::task::spawn_blocking(move || new_capture().screen_bounds())
                    .await
                    .ok()
                    .flatten();
                let selection = RegionSelection::new(screen);
                let prompt = selection.stage().prompt().to_string();
                self.selection = Some(selection);
                self.preview = None;
                vec![prompt]
            }
            DashboardCommand::Mode(mode) => self.advance_selection(SelectionInput::ChooseMode(mode)),
            DashboardCommand::Pick(area) => self.advance_selection(SelectionInput::Pick(area)),
            DashboardCommand::Preview(out) => self.save_preview(out).await,
            DashboardCommand::PickPreview(area) => match self.preview {
                Some(preview) => {
                    let region = preview.to_screen((area.x1, area.y1), (area.x2, area.y2));
                    self.advance_selection(SelectionInput::Pick(region))
                }
                None => vec!["No preview saved; run `preview <file.png>` first".into()],
            },
            DashboardCommand::Entire => self.advance_selection(SelectionInput::UseEntireParent),
            DashboardCommand::Cancel => self.advance_selection(SelectionInput::Cancel),
        }
    }

    /// Stops the loop if it is running.
    pub async fn shutdown(&mut self) {
        self.controller.stop().await;
    }

    fn advance_selection(&mut self, input: SelectionInput) -> Vec<String> {
        let Some(selection) = self.selection.as_mut() else {
            return vec!["No region selection in progress; run `select` first".into()];
        };

        let stage = match selection.advance(input) {
            Ok(stage) => stage,
            Err(err) => return vec![format!("Selection error: {err}")],
        };

        match stage {
            SelectionStage::Done { parent, sub } => {
                self.selection = None;
                self.preview = None;
                confirm(
                    self.settings.apply_selection(parent, sub),
                    format!("Capture area set to {parent}, OCR area set to {sub}"),
                )
            }
            SelectionStage::Cancelled => {
                self.selection = None;
                self.preview = None;
                vec![stage.prompt().into()]
            }
            _ => vec![stage.prompt().into()],
        }
    }

    /// Captures the selection's parent and saves it scaled to fit the preview
    /// bounds, so the OCR area can be measured on the image.
    async fn save_preview(&mut self, out: PathBuf) -> Vec<String> {
        let parent = match self.selection.as_ref().map(RegionSelection::stage) {
            Some(SelectionStage::PickingSubArea { parent }) => parent,
            _ => return vec!["A preview needs a parent area; run `select` and finish step 1 first".into()],
        };

        let preview = PreviewScale::fit(parent, PREVIEW_MAX_WIDTH, PREVIEW_MAX_HEIGHT);
        let (width, height) = preview.preview_size();
        let new_capture = self.new_capture;
        let target = out.clone();

        let saved = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let mut capture = new_capture();
            let image = capture.capture(&parent)?;
            image
                .resize_exact(width, height, FilterType::Nearest)
                .save_with_format(&target, ImageFormat::Png)?;
            Ok(())
        })
        .await;

        match saved {
            Ok(Ok(())) => {
                self.preview = Some(preview);
                vec![format!(
                    "Preview saved to {} ({width}x{height}, {:.0}% scale); `pick-preview` in its pixels",
                    out.display(),
                    preview.scale() * 100.0
                )]
            }
            Ok(Err(err)) => vec![format!("Preview failed: {err:#}")],
            Err(err) => vec![format!("Preview failed: {err}")],
        }
    }

    async fn test_ocr(&self) -> Vec<String> {
        let plan = self.settings.snapshot().capture_plan();
        let sampler = Sampler::new((self.new_capture)(), Arc::clone(&self.recognizer));

        match sample_detached(sampler, plan).await {
            Ok(reading) => vec![
                format!("OCR text: {:?}", reading.text),
                format!("Numbers: {:?}", reading.numbers),
                format!("Gold: {}", reading.sample.value),
            ],
            Err(err) => vec![format!("Test failed ({}): {err}", err.kind())],
        }
    }

    fn history_lines(&self) -> Vec<String> {
        let samples = self.controller.history().samples();
        if samples.is_empty() {
            return vec!["No samples yet".into()];
        }
        samples
            .iter()
            .map(|sample| {
                format!(
                    "{}  {}",
                    sample.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S"),
                    sample.value
                )
            })
            .collect()
    }

    fn settings_summary(&self) -> Vec<String> {
        let settings = self.settings.snapshot();
        let mut lines = vec![
            format!("Capture interval: {} seconds", settings.capture_interval),
            format!("Rate window: {} minutes", settings.gold_history_window),
            format!("OCR area: {}", settings.capture_area),
        ];
        if settings.use_two_step_capture {
            lines.push(format!("Capture area: {} (two-step)", settings.parent_area));
        }
        if let Some(target) = settings.target_upgrade_cost {
            lines.push(format!("Target upgrade cost: {target}"));
        }
        lines
    }
}

fn confirm(result: Result<(), ConfigError>, message: String) -> Vec<String> {
    match result {
        Ok(()) => vec![message],
        Err(err) => vec![format!("Error: {err}")],
    }
}

/// Reads commands from stdin and prints loop events until `quit` or EOF.
pub async fn run_terminal(
    mut dashboard: Dashboard,
    mut events: UnboundedReceiver<MonitorEvent>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_lines(&HELP.lines().map(str::to_string).collect::<Vec<_>>());

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                print_lines(&dashboard.on_event(event));
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => {
                        log_error!("failed to read stdin: {err}");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(DashboardCommand::Quit) => break,
                    Ok(command) => print_lines(&dashboard.execute(command).await),
                    Err(message) => println!("{message}"),
                }
            }
        }
    }

    dashboard.shutdown().await;
    log_info!("dashboard closed");
    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use goldwatch_lib::capture::{CaptureBackend, CaptureError, Region};
use goldwatch_lib::dashboard::{MonitorEvent, ReadingEvent};
use goldwatch_lib::ocr::{Recognition, RecognitionError, Recognizer};
use goldwatch_lib::sensing::{LoopState, Sampler, SamplingController};
use goldwatch_lib::settings::{MonitorSettings, SettingsStore};
use image::{DynamicImage, RgbaImage};
use tokio::sync::mpsc::{self, UnboundedReceiver};

const OCR_AREA: Region = Region::new(0, 0, 40, 20);

/// Shared script and call log for a fake capture backend.
#[derive(Clone, Default)]
struct Script {
    failures: Arc<Mutex<VecDeque<String>>>,
    regions: Arc<Mutex<Vec<Region>>>,
    delay: Option<Duration>,
}

impl Script {
    fn failing_first(messages: &[&str]) -> Self {
        let script = Self::default();
        script
            .failures
            .lock()
            .unwrap()
            .extend(messages.iter().map(|m| m.to_string()));
        script
    }

    fn calls(&self) -> usize {
        self.regions.lock().unwrap().len()
    }
}

struct ScriptedCapture(Script);

impl CaptureBackend for ScriptedCapture {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn grab(&mut self, region: &Region) -> Result<DynamicImage, CaptureError> {
        self.0.regions.lock().unwrap().push(*region);
        if let Some(delay) = self.0.delay {
            std::thread::sleep(delay);
        }
        if let Some(message) = self.0.failures.lock().unwrap().pop_front() {
            return Err(CaptureError::backend("scripted", message));
        }
        Ok(DynamicImage::ImageRgba8(RgbaImage::new(
            region.width() as u32,
            region.height() as u32,
        )))
    }
}

/// Reads scripted texts in order, then keeps repeating the last one.
struct ScriptedText(Mutex<VecDeque<&'static str>>);

impl ScriptedText {
    fn new(texts: &[&'static str]) -> Arc<Self> {
        Arc::new(Self(Mutex::new(texts.iter().copied().collect())))
    }
}

impl Recognizer for ScriptedText {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize(&self, _image: &DynamicImage) -> Result<Recognition, RecognitionError> {
        let mut texts = self.0.lock().unwrap();
        let text = if texts.len() > 1 {
            texts.pop_front().unwrap_or("0")
        } else {
            texts.front().copied().unwrap_or("0")
        };
        Ok(Recognition::from_text(text))
    }
}

fn settings(interval: f64) -> Arc<SettingsStore> {
    Arc::new(SettingsStore::in_memory(MonitorSettings {
        capture_interval: interval,
        capture_area: OCR_AREA,
        use_two_step_capture: false,
        ..MonitorSettings::default()
    }))
}

fn controller(
    script: &Script,
    texts: Arc<ScriptedText>,
    settings: &Arc<SettingsStore>,
) -> (SamplingController, UnboundedReceiver<MonitorEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sampler = Sampler::new(Box::new(ScriptedCapture(script.clone())), texts);
    (SamplingController::new(sampler, Arc::clone(settings), tx), rx)
}

/// Next reading or failure, skipping state changes.
async fn next_event(rx: &mut UnboundedReceiver<MonitorEvent>) -> MonitorEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a loop event")
            .expect("event channel closed");
        if !matches!(event, MonitorEvent::StateChanged { .. }) {
            return event;
        }
    }
}

async fn next_reading(rx: &mut UnboundedReceiver<MonitorEvent>) -> ReadingEvent {
    loop {
        if let MonitorEvent::Reading(reading) = next_event(rx).await {
            return reading;
        }
    }
}

#[tokio::test]
async fn failed_capture_is_skipped_and_loop_recovers() {
    let script = Script::failing_first(&["display asleep"]);
    let settings = settings(1.0);
    let (mut controller, mut rx) = controller(&script, ScriptedText::new(&["Gold 1200"]), &settings);

    assert!(controller.start());

    match next_event(&mut rx).await {
        MonitorEvent::Failure(failure) => {
            assert_eq!(failure.kind, "capture");
            assert!(failure.reason.contains("display asleep"));
        }
        other => panic!("expected a failure first, got {other:?}"),
    }

    let reading = next_reading(&mut rx).await;
    assert_eq!(reading.sample.value, 1200.0);
    // First sample: no rate yet.
    assert_eq!(reading.snapshot.current_rate(), 0.0);

    assert!(controller.stop().await);
    let samples = controller.history().samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].value, 1200.0);
}

#[tokio::test]
async fn region_outside_parent_leaves_history_untouched() {
    let script = Script::default();
    let settings = settings(0.1);
    settings
        .apply_selection(Region::new(0, 0, 100, 100), Region::new(200, 200, 300, 300))
        .unwrap();
    let (mut controller, mut rx) = controller(&script, ScriptedText::new(&["500"]), &settings);

    controller.start();

    for _ in 0..2 {
        match next_event(&mut rx).await {
            MonitorEvent::Failure(failure) => assert_eq!(failure.kind, "region"),
            other => panic!("expected a region failure, got {other:?}"),
        }
    }
    assert_eq!(controller.state(), LoopState::Running);
    assert!(controller.history().samples().is_empty());

    controller.stop().await;
}

#[tokio::test]
async fn unreadable_text_is_reported_as_no_number() {
    let script = Script::default();
    let settings = settings(0.1);
    let (mut controller, mut rx) = controller(&script, ScriptedText::new(&["Gold: --"]), &settings);

    controller.start();
    match next_event(&mut rx).await {
        MonitorEvent::Failure(failure) => assert_eq!(failure.kind, "no_number"),
        other => panic!("expected a failure, got {other:?}"),
    }
    controller.stop().await;
    assert!(controller.history().samples().is_empty());
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let script = Script::default();
    let settings = settings(0.1);
    let (mut controller, _rx) = controller(&script, ScriptedText::new(&["1"]), &settings);

    assert!(!controller.stop().await);
    assert_eq!(controller.state(), LoopState::Idle);

    assert!(controller.start());
    assert!(!controller.start());
    assert_eq!(controller.state(), LoopState::Running);

    assert!(controller.stop().await);
    assert!(!controller.stop().await);
    assert_eq!(controller.state(), LoopState::Idle);
}

#[tokio::test]
async fn stop_halts_sampling() {
    let script = Script::default();
    let settings = settings(0.1);
    let (mut controller, mut rx) = controller(&script, ScriptedText::new(&["10"]), &settings);

    controller.start();
    next_reading(&mut rx).await;
    assert!(controller.stop().await);

    let calls = script.calls();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(script.calls(), calls);
}

#[tokio::test]
async fn restart_starts_a_fresh_series() {
    let script = Script::default();
    let settings = settings(0.1);
    let (mut controller, mut rx) = controller(&script, ScriptedText::new(&["10"]), &settings);

    controller.start();
    next_reading(&mut rx).await;
    next_reading(&mut rx).await;
    controller.stop().await;
    assert!(controller.history().samples().len() >= 2);

    controller.start();
    assert!(controller.history().samples().len() <= 1);
    controller.stop().await;
}

#[tokio::test]
async fn settings_changes_apply_on_the_next_iteration() {
    let script = Script::default();
    let settings = settings(0.1);
    let (mut controller, mut rx) = controller(&script, ScriptedText::new(&["10"]), &settings);

    controller.start();
    next_reading(&mut rx).await;

    let moved = Region::new(100, 100, 160, 130);
    settings.set_capture_area(moved).unwrap();

    let mut saw_new_area = false;
    for _ in 0..10 {
        next_reading(&mut rx).await;
        if script.regions.lock().unwrap().last() == Some(&moved) {
            saw_new_area = true;
            break;
        }
    }
    controller.stop().await;

    assert!(saw_new_area);
    assert_eq!(script.regions.lock().unwrap()[0], OCR_AREA);
}

#[tokio::test]
async fn rate_and_time_to_target_follow_the_series() {
    let script = Script::default();
    let settings = settings(0.1);
    settings.set_target_upgrade_cost(Some(1_000_000.0)).unwrap();
    let (mut controller, mut rx) =
        controller(&script, ScriptedText::new(&["100", "200", "300"]), &settings);

    controller.start();
    let first = next_reading(&mut rx).await;
    assert_eq!(first.time_to_target_minutes, None);

    let second = next_reading(&mut rx).await;
    assert_eq!(second.sample.value, 200.0);
    assert!(second.snapshot.instantaneous_rate > 0.0);
    assert!(second.snapshot.current_rate() > 0.0);
    assert!(second.time_to_target_minutes.is_some());

    controller.stop().await;
}

#[tokio::test]
async fn slow_capture_times_out_without_overlapping_calls() {
    let script = Script {
        delay: Some(Duration::from_millis(400)),
        ..Script::default()
    };
    let settings = settings(0.1);
    let (controller, mut rx) = controller(&script, ScriptedText::new(&["42"]), &settings);
    let mut controller = controller.with_sample_timeout(Duration::from_millis(50));

    controller.start();

    match next_event(&mut rx).await {
        MonitorEvent::Failure(failure) => assert_eq!(failure.kind, "timeout"),
        other => panic!("expected a timeout, got {other:?}"),
    }

    // The slow call is waited on, not duplicated.
    let reading = next_reading(&mut rx).await;
    assert_eq!(reading.sample.value, 42.0);
    assert_eq!(script.calls(), 1);

    controller.stop().await;
}

async fn wait_for_calls(script: &Script, calls: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while script.calls() < calls {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("capture was never called");
}

#[tokio::test]
async fn stop_gives_up_waiting_after_its_bound() {
    let script = Script {
        delay: Some(Duration::from_millis(600)),
        ..Script::default()
    };
    let settings = settings(0.1);
    let (controller, _rx) = controller(&script, ScriptedText::new(&["7"]), &settings);
    let mut controller = controller.with_stop_timeout(Duration::from_millis(50));

    controller.start();
    wait_for_calls(&script, 1).await;

    let started = std::time::Instant::now();
    assert!(controller.stop().await);
    let waited = started.elapsed();

    assert!(waited >= Duration::from_millis(50));
    assert!(waited < Duration::from_millis(500), "stop waited {waited:?}");
    assert_eq!(controller.state(), LoopState::Idle);
}

#[tokio::test]
async fn restart_after_slow_stop_ignores_the_old_run() {
    let script = Script {
        delay: Some(Duration::from_millis(600)),
        ..Script::default()
    };
    let settings = settings(0.1);
    let (controller, mut rx) = controller(&script, ScriptedText::new(&["111", "222"]), &settings);
    let mut controller = controller.with_stop_timeout(Duration::from_millis(50));

    controller.start();
    wait_for_calls(&script, 1).await;
    controller.stop().await;

    // The first run's capture is still sleeping when the second run starts.
    assert!(controller.start());
    assert!(controller.history().samples().is_empty());

    let reading = next_reading(&mut rx).await;
    assert_eq!(reading.sample.value, 222.0);
    assert_eq!(reading.snapshot.current_rate(), 0.0);

    let values: Vec<f64> = controller.history().samples().iter().map(|s| s.value).collect();
    assert_eq!(values, vec![222.0]);

    controller.stop().await;
}

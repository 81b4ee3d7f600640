pub mod capture;
pub mod dashboard;
pub mod metrics;
pub mod ocr;
pub mod selection;
pub mod sensing;
pub mod settings;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use capture::default_backend;
use dashboard::{run_terminal, Dashboard};
use ocr::{Recognizer, TesseractRecognizer};
use sensing::{sample_detached, Sampler};
use settings::SettingsStore;

#[derive(Debug, Parser)]
#[command(name = "goldwatch", version, about = "Live gold-per-minute from an on-screen counter")]
pub struct Cli {
    /// Settings file; created with defaults when missing.
    #[arg(long, default_value = "data/settings.json")]
    pub settings: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    pub verbose: bool,

    /// Send captures to Tesseract as-is instead of binarizing them first.
    #[arg(long)]
    pub raw_ocr: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive dashboard (default).
    Run,
    /// Capture and recognize once, print what was read, and exit.
    TestOcr,
    /// Save the image the recognizer would see as a PNG.
    Snapshot {
        #[arg(long)]
        out: PathBuf,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    // RUST_LOG, when set, takes precedence over the default level.
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    log::info!("goldwatch starting up...");

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(run_command(cli))
}

async fn run_command(cli: Cli) -> Result<()> {
    let settings = Arc::new(SettingsStore::new(cli.settings)?);
    if let Some(path) = settings.path() {
        log::info!("settings loaded from {}", path.display());
    }

    let mut tesseract = TesseractRecognizer::new(settings.snapshot().tesseract_path.clone());
    if cli.raw_ocr {
        tesseract = tesseract.without_preprocessing();
    }
    log::info!("recognizing with {}", tesseract.binary().display());
    let recognizer: Arc<dyn Recognizer> = Arc::new(tesseract);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let (dashboard, events) = Dashboard::new(settings, recognizer, default_backend);
            run_terminal(dashboard, events).await
        }
        Command::TestOcr => {
            let plan = settings.snapshot().capture_plan();
            let reading = sample_detached(Sampler::new(default_backend(), recognizer), plan).await?;
            println!("OCR text: {:?}", reading.text);
            println!("Numbers: {:?}", reading.numbers);
            println!("Gold: {}", reading.sample.value);
            Ok(())
        }
        Command::Snapshot { out } => {
            let plan = settings.snapshot().capture_plan();
            let mut sampler = Sampler::new(default_backend(), recognizer);
            let image = tokio::task::spawn_blocking(move || sampler.capture_image(&plan))
                .await
                .context("Snapshot worker failed")??;
            if let Some(parent) = out.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            image
                .save_with_format(&out, image::ImageFormat::Png)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Saved {}x{} snapshot to {}", image.width(), image.height(), out.display());
            Ok(())
        }
    }
}

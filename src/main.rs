use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};

use lanecap::calibration::locate_play_area;
use lanecap::collector::{CaptureLoop, DirectoryFrameSource, RecordedLabels};
use lanecap::config::Configuration;
use lanecap::dataset::DatasetWriter;
use lanecap::{AppError, ColorRangeSettings, CropRect, FeatureExtractionExecutor, Frame};

#[derive(Parser)]
#[command(name = "lanecap", about = "Turns lane game screenshots into labelled feature vectors")]
struct Cli {
    /// Extra configuration file, layered over lanecap.toml and under LANECAP_* variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Color range settings (JSON).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the play area found in a screenshot as x,y,width,height.
    Calibrate { screenshot: PathBuf },
    /// Print the feature vector of one screenshot as a CSV line.
    Extract {
        screenshot: PathBuf,
        #[arg(long)]
        crop: Option<CropRect>,
    },
    /// Replay a directory of screenshots with recorded labels into a dataset.
    Collect {
        frames: PathBuf,
        labels: PathBuf,
        #[arg(long)]
        crop: Option<CropRect>,
        #[arg(long)]
        features_out: Option<PathBuf>,
        #[arg(long)]
        labels_out: Option<PathBuf>,
        #[arg(long)]
        tick_ms: Option<u64>,
    },
}

fn init_logging(level: Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut configuration = Configuration::load(cli.config.as_deref())?;
    if let Some(settings) = cli.settings {
        configuration.settings_path = settings;
    }
    init_logging(configuration.max_log_level()?);

    let result = match cli.command {
        Command::Calibrate { screenshot } => calibrate(&screenshot),
        Command::Extract { screenshot, crop } => extract(&configuration, &screenshot, crop).await,
        Command::Collect {
            frames,
            labels,
            crop,
            features_out,
            labels_out,
            tick_ms,
        } => {
            if let Some(path) = features_out {
                configuration.features_path = path;
            }
            if let Some(path) = labels_out {
                configuration.labels_path = path;
            }
            if let Some(tick_ms) = tick_ms {
                configuration.tick_ms = tick_ms;
            }
            configuration.validate()?;
            collect(&configuration, &frames, &labels, crop).await
        }
    };

    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

fn calibrate(screenshot: &Path) -> Result<(), AppError> {
    let crop = locate_play_area(&image::open(screenshot)?)?;
    println!("{crop}");
    Ok(())
}

fn resolve_crop(crop: Option<CropRect>, screenshot: &Path) -> Result<CropRect, AppError> {
    match crop {
        Some(crop) => Ok(crop),
        None => locate_play_area(&image::open(screenshot)?),
    }
}

async fn extract(
    configuration: &Configuration,
    screenshot: &Path,
    crop: Option<CropRect>,
) -> Result<(), AppError> {
    let settings = Arc::new(ColorRangeSettings::load(&configuration.settings_path)?);
    let crop = resolve_crop(crop, screenshot)?;
    let frame = Frame::captured(image::open(screenshot)?);

    let executor = FeatureExtractionExecutor::new();
    executor.start(crop, settings)?;
    let features = executor.submit(frame)?.await;
    tokio::task::block_in_place(|| executor.stop());

    println!("{}", features?.to_csv_line());
    Ok(())
}

async fn collect(
    configuration: &Configuration,
    frames_dir: &Path,
    labels_file: &Path,
    crop: Option<CropRect>,
) -> Result<(), AppError> {
    let settings = Arc::new(ColorRangeSettings::load(&configuration.settings_path)?);
    let frames = DirectoryFrameSource::open(frames_dir)?;
    let crop = match (crop, frames.peek_path()) {
        (Some(crop), _) => crop,
        (None, Some(first)) => resolve_crop(None, first)?,
        (None, None) => {
            return Err(AppError::Calibration(format!(
                "no screenshots in {}",
                frames_dir.display()
            )));
        }
    };

    let executor = Arc::new(FeatureExtractionExecutor::new());
    executor.start(crop, settings)?;

    let capture = CaptureLoop::builder(executor)
        .frames(frames)
        .labels(RecordedLabels::from_file(labels_file)?)
        .sink(DatasetWriter::create(
            &configuration.features_path,
            &configuration.labels_path,
        )?)
        .tick(configuration.tick())
        .build()?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, finishing capture");
            ctrl_c.cancel();
        }
    });

    let stats = capture.run(cancel).await?;
    println!(
        "{} samples written ({} skipped busy, {} failed)",
        stats.written, stats.skipped_busy, stats.failed
    );
    Ok(())
}

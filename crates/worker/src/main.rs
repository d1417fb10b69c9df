//! `posemark-worker` -- command-line driver for the pose annotation pipeline.
//!
//! Annotates a still image or a video through an external pose inference
//! service and writes the annotated media plus the measured joint angles.
//!
//! # Environment variables
//!
//! | Variable                    | Required | Default | Description                              |
//! |-----------------------------|----------|---------|------------------------------------------|
//! | `POSE_SERVICE_URL`          | yes      | --      | Inference service base URL, e.g. `http://host:8500` |
//! | `POSE_SERVICE_TIMEOUT_SECS` | no       | `30`    | Per-request timeout for the service      |
//!
//! Pipeline settings (`POSE_OUTPUT_FPS`, `POSE_WORK_DIR`, ...) are read by
//! [`PipelineConfig::from_env`].

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use posemark_core::angles::AngleSet;
use posemark_core::comparison::{all_within_tolerance, compare_angle_sets, DEFAULT_ANGLE_TOLERANCE_DEG};
use posemark_pipeline::{HttpPoseEstimator, PipelineConfig, PipelineError, PosePipeline};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default per-request timeout for the inference service.
const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Parser)]
#[command(name = "posemark-worker", version, about = "Annotate human poses in images and videos")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Annotate a still image and measure its joint angles.
    Image {
        /// Image to annotate (JPEG or PNG).
        input: PathBuf,
        /// Where to write the annotated PNG [default: <input>_annotated.png].
        #[arg(long)]
        output: Option<PathBuf>,
        /// Where to write the angle report [default: stdout].
        #[arg(long)]
        angles: Option<PathBuf>,
        /// Reference angles (JSON object keyed like the report) to compare against.
        #[arg(long)]
        reference: Option<PathBuf>,
        /// Allowed deviation from the reference, in degrees.
        #[arg(long, default_value_t = DEFAULT_ANGLE_TOLERANCE_DEG)]
        tolerance: f64,
    },
    /// Annotate every frame of a video and reassemble it.
    Video {
        /// Video to annotate.
        input: PathBuf,
        /// Where to write the annotated video [default: <input>_annotated.mp4].
        #[arg(long)]
        output: Option<PathBuf>,
        /// Where to write the per-frame angle report [default: stdout].
        #[arg(long)]
        angles: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "posemark_worker=info,posemark_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<PipelineError>() {
                Some(pipeline_err) => {
                    let body = pipeline_err.to_error_body();
                    eprintln!("{}", serde_json::to_string(&body).unwrap_or_default());
                }
                None => tracing::error!(error = %format!("{err:#}"), "posemark-worker failed"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = PipelineConfig::from_env().map_err(PipelineError::from)?;

    let service_url = std::env::var("POSE_SERVICE_URL")
        .context("POSE_SERVICE_URL environment variable is required")?;
    let service_timeout_secs: u64 = match std::env::var("POSE_SERVICE_TIMEOUT_SECS") {
        Ok(raw) => raw
            .trim()
            .parse()
            .context("POSE_SERVICE_TIMEOUT_SECS must be a valid u64")?,
        Err(_) => DEFAULT_SERVICE_TIMEOUT_SECS,
    };

    tracing::info!(
        service_url = %service_url,
        output_fps = config.output_fps,
        frame_concurrency = config.frame_concurrency,
        "Starting posemark-worker",
    );

    let estimator =
        HttpPoseEstimator::connect(&service_url, Duration::from_secs(service_timeout_secs))
            .await
            .map_err(PipelineError::from)?;
    let pipeline = PosePipeline::with_ffmpeg(Arc::new(estimator), config);

    match cli.command {
        Command::Image {
            input,
            output,
            angles,
            reference,
            tolerance,
        } => {
            let reference = match reference {
                Some(path) => Some(read_reference(&path).await?),
                None => None,
            };
            let bytes = read_input(&input).await?;
            let outcome = pipeline.process_image(&bytes).await?;

            let output = output.unwrap_or_else(|| sibling(&input, "png"));
            tokio::fs::write(&output, &outcome.image_png)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;
            tracing::info!(output = %output.display(), detected = outcome.detected, "Annotated image written");

            let mut report = serde_json::json!({
                "detected": outcome.detected,
                "angles": outcome.angles,
            });
            if let Some(reference) = reference {
                let rows = compare_angle_sets(&outcome.angles, &reference, tolerance);
                report["within_tolerance"] = all_within_tolerance(&rows).into();
                report["comparison"] = serde_json::to_value(&rows)?;
            }
            emit_report(&report, angles.as_deref()).await
        }
        Command::Video {
            input,
            output,
            angles,
        } => {
            let bytes = read_input(&input).await?;

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, cancelling job");
                    on_interrupt.cancel();
                }
            });

            let outcome = pipeline.process_video(&bytes, &cancel).await?;

            let output = output.unwrap_or_else(|| sibling(&input, "mp4"));
            tokio::fs::write(&output, &outcome.video)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;
            tracing::info!(output = %output.display(), frames = outcome.frames.len(), "Annotated video written");

            let report = serde_json::json!({
                "source_fps": outcome.source_fps,
                "frame_rate_fallback": outcome.frame_rate_fallback,
                "output_fps": outcome.output_fps,
                "frames": outcome.frames,
            });
            emit_report(&report, angles.as_deref()).await
        }
    }
}

async fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

async fn read_reference(path: &Path) -> anyhow::Result<AngleSet> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid reference angles in {}", path.display()))
}

/// `<dir>/<stem>_annotated.<ext>` next to `input`.
fn sibling(input: &Path, ext: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}_annotated.{ext}"))
}

async fn emit_report(report: &serde_json::Value, path: Option<&Path>) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(report)?;
    match path {
        Some(path) => tokio::fs::write(path, rendered)
            .await
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{rendered}");
            Ok(())
        }
    }
}

//! framefit command-line entry point.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use web_time::Instant;

use framefit::cache::FileCache;
use framefit::calibration::{
    CanvasSize, CenterOverride, ChartGeometry, FileImageFetcher, FrameCalibrationService,
    calibration_to_fit,
};
use framefit::config::EditorConfig;
use framefit::model::{CalibrationRegion, ContextKey};
use framefit::store::FileDocumentStore;
use framefit::sync::{ConflictChoice, ContextOutcome, SyncEngine};

/// Frame calibration and chart fit tool
#[derive(Parser, Debug)]
#[command(name = "framefit")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect the frame opening and print the calibration region as JSON
    Detect {
        /// Image path or file:// URL
        image: String,
        /// Scan center, as a fraction of image width
        #[arg(long, requires = "center_y")]
        center_x: Option<f64>,
        /// Scan center, as a fraction of image height
        #[arg(long, requires = "center_x")]
        center_y: Option<f64>,
        /// Minimum luminance of background pixels (0-1)
        #[arg(long)]
        white_cutoff: Option<f32>,
        /// Extra tolerance for off-white paper (0-1)
        #[arg(long)]
        offwhite_boost: Option<f32>,
        /// Skip the calibration cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Detect the frame opening and print the chart fit as JSON
    Fit {
        /// Image path or file:// URL
        image: String,
        #[arg(long)]
        chart_center_x: f64,
        #[arg(long)]
        chart_center_y: f64,
        /// Outer ring radius in chart coordinates
        #[arg(long)]
        outer_radius: f64,
        #[arg(long)]
        canvas_width: f64,
        #[arg(long)]
        canvas_height: f64,
        /// Rotation to keep, in degrees
        #[arg(long, default_value_t = 0.0)]
        rotation: f64,
    },
    /// Show the draft/sync state of an editing context
    Draft {
        #[arg(long)]
        chart: String,
        /// Frame id; omit for the chart-only context
        #[arg(long)]
        frame: Option<String>,
        /// Delete a pending draft instead of keeping it
        #[arg(long)]
        discard: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match EditorConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => EditorConfig::load_from_default_path(),
    };

    env_logger::Builder::new()
        .filter_level(config.preferences.log_level.to_level_filter())
        .parse_default_env()
        .init();

    match pollster::block_on(run(args.command, &config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &EditorConfig) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Detect {
            image,
            center_x,
            center_y,
            white_cutoff,
            offwhite_boost,
            no_cache,
        } => {
            let service = calibration_service(config)?;
            let center = center_x
                .zip(center_y)
                .map(|(x_norm, y_norm)| CenterOverride { x_norm, y_norm });
            let tuned = center.is_some() || white_cutoff.is_some() || offwhite_boost.is_some();
            let region = if no_cache || tuned {
                let params = service.params();
                service
                    .detect_with_override_center(
                        &image,
                        center,
                        white_cutoff.unwrap_or(params.white_cutoff),
                        offwhite_boost.unwrap_or(params.offwhite_boost),
                    )
                    .await?
            } else {
                service.detect(&image).await?
            };
            println!("{}", serde_json::to_string_pretty(&region)?);
        }
        Command::Fit {
            image,
            chart_center_x,
            chart_center_y,
            outer_radius,
            canvas_width,
            canvas_height,
            rotation,
        } => {
            let service = calibration_service(config)?;
            let region: CalibrationRegion = service.detect(&image).await?;
            let chart = ChartGeometry {
                center_x: chart_center_x,
                center_y: chart_center_y,
                outer_ring_radius: outer_radius,
            };
            let canvas = CanvasSize::new(canvas_width, canvas_height);
            let fit = calibration_to_fit(&chart, &region, canvas, rotation)
                .ok_or("detected region cannot be mapped to a fit")?;
            println!("{}", serde_json::to_string_pretty(&fit)?);
        }
        Command::Draft {
            chart,
            frame,
            discard,
        } => {
            let key = match frame {
                Some(frame) => ContextKey::framed(chart, frame),
                None => ContextKey::chart_only(chart),
            };
            let store_dir = config
                .resolved_store_dir()
                .ok_or("could not determine document store directory")?;
            let mut engine = SyncEngine::with_debounce(
                file_cache(config)?,
                FileDocumentStore::new(store_dir),
                config.sync.draft_debounce(),
            );
            // The file store is local and needs no network identity.
            engine.set_credential(Some("local".to_string()));

            match engine.open_context(key.clone()).await {
                ContextOutcome::ConflictPending(prompt) => {
                    println!(
                        "{}: unsynced draft (client version {}, server version {})",
                        key, prompt.draft_client_version, prompt.draft_server_version
                    );
                    if discard {
                        engine
                            .resolve_conflict(ConflictChoice::Discard, Instant::now())
                            .await?;
                        println!("{}: draft discarded", key);
                    }
                }
                ContextOutcome::Loaded | ContextOutcome::Stale => {
                    println!("{}: no pending draft", key);
                }
            }
            if let Some(warning) = engine.warning() {
                println!("warning: {:?}", warning);
            }
            let status = engine.status();
            if !status.label().is_empty() {
                println!("status: {}", status);
            }
        }
    }
    Ok(())
}

fn file_cache(config: &EditorConfig) -> Result<FileCache, Box<dyn Error>> {
    let dir = config
        .resolved_cache_dir()
        .ok_or("could not determine cache directory")?;
    Ok(FileCache::new(dir))
}

fn calibration_service(
    config: &EditorConfig,
) -> Result<FrameCalibrationService<FileCache, FileImageFetcher>, Box<dyn Error>> {
    Ok(FrameCalibrationService::with_params(
        file_cache(config)?,
        FileImageFetcher::new(),
        config.detection,
    ))
}

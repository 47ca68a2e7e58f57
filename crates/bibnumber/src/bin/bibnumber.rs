//! bibnumber CLI: locate bib-number text regions in photographs.

use std::path::{Path, PathBuf};

use bibnumber::detect::{
    detect_text, load_params, load_rgb, resize_for_detection, DEFAULT_MAX_WIDTH,
};
use bibnumber::recognition::{prepare_ocr_regions_with, OcrGateOptions, OcrPlan};
use bibnumber::{TextDetection, TextDetectionParams};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn, LevelFilter};
use serde::Serialize;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

#[derive(Parser)]
#[command(name = "bibnumber")]
#[command(about = "Find candidate bib-number text regions in race photographs")]
#[command(version)]
struct Cli {
    /// Log verbosity (off, error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    /// Emit logs as JSON lines (feature `tracing`).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect text chains in an image or a directory of images.
    Detect(CliDetectArgs),

    /// Print detector parameters as JSON, ready to edit and pass to --config.
    DefaultConfig {
        #[arg(long, value_enum, default_value_t = Preset::Default)]
        preset: Preset,

        /// Image height used to derive the OCR border margin.
        #[arg(long)]
        height: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    /// Whole-image profile.
    Default,
    /// Shorter chains, verified by a model.
    Verification,
}

#[derive(Debug, Clone, Args)]
struct CliDetectArgs {
    /// Image file, or a directory scanned (non-recursively) for images.
    #[arg(long)]
    input: PathBuf,

    /// Detector parameters (JSON). Missing keys keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the JSON report here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Downscale wider images to this many columns (0 disables).
    #[arg(long, default_value_t = DEFAULT_MAX_WIDTH)]
    max_width: u32,

    /// Reject chains steeper than `max_angle` before OCR.
    #[arg(long)]
    enforce_max_angle: bool,
}

#[derive(Debug, Serialize)]
struct BatchReport {
    /// Parameters loaded from --config; `None` means per-image defaults.
    params: Option<TextDetectionParams>,
    images: Vec<ImageReport>,
}

#[derive(Debug, Default, Serialize)]
struct ImageReport {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Decoded size before downscaling.
    original_size: Option<[u32; 2]>,
    /// Factor applied to the input; detection coordinates are in the scaled frame.
    scale: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    detection: Option<TextDetection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ocr: Option<OcrPlan>,
}

fn init_logging(level: LevelFilter, json: bool) {
    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init();
        bibnumber::core::init_tracing(json, &level.to_string().to_lowercase());
    }
    #[cfg(not(feature = "tracing"))]
    {
        if json {
            eprintln!("--log-json needs the `tracing` feature; using plain logs");
        }
        let _ = bibnumber::core::init_with_level(level);
    }
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_json);

    match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::DefaultConfig { preset, height } => run_default_config(preset, height),
    }
}

// ── default-config ─────────────────────────────────────────────────────

fn run_default_config(preset: Preset, height: Option<usize>) -> CliResult<()> {
    let params = match height {
        Some(h) => TextDetectionParams::for_image_height(h),
        None => TextDetectionParams::default(),
    };
    let params = match preset {
        Preset::Default => params,
        Preset::Verification => params.with_verification_model(),
    };
    println!("{}", serde_json::to_string_pretty(&params)?);
    Ok(())
}

// ── detect ─────────────────────────────────────────────────────────────

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn collect_inputs(input: &Path) -> CliResult<Vec<PathBuf>> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(input)? {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn process_image(
    path: &Path,
    config: Option<&TextDetectionParams>,
    args: &CliDetectArgs,
) -> ImageReport {
    let mut report = ImageReport {
        path: path.display().to_string(),
        scale: 1.0,
        ..ImageReport::default()
    };

    let img = match load_rgb(path) {
        Ok(img) => img,
        Err(err) => {
            warn!("{}: {err}", path.display());
            report.error = Some(err.to_string());
            return report;
        }
    };
    report.original_size = Some([img.width(), img.height()]);

    let img = match resize_for_detection(&img, args.max_width) {
        Some(small) => {
            report.scale = small.width() as f32 / img.width() as f32;
            small
        }
        None => img,
    };

    let params = config
        .cloned()
        .unwrap_or_else(|| TextDetectionParams::for_image_height(img.height() as usize));
    let detection = detect_text(&img, &params);
    let gate = OcrGateOptions {
        enforce_max_angle: args.enforce_max_angle,
    };
    let plan = prepare_ocr_regions_with(&detection, img.width() as usize, &params, &gate);
    info!(
        "{}: {} chains, {} ready for OCR",
        path.display(),
        detection.chains.len(),
        plan.accepted.len()
    );

    report.detection = Some(detection);
    report.ocr = Some(plan);
    report
}

fn run_detect(args: &CliDetectArgs) -> CliResult<()> {
    let config = args.config.as_deref().map(load_params).transpose()?;
    let inputs = collect_inputs(&args.input)?;
    if inputs.is_empty() {
        warn!("no images found in {}", args.input.display());
    }

    let images = inputs
        .iter()
        .map(|path| process_image(path, config.as_ref(), args))
        .collect();
    let report = BatchReport {
        params: config,
        images,
    };

    let json = serde_json::to_string_pretty(&report)?;
    match &args.out {
        Some(out) => {
            std::fs::write(out, &json)?;
            info!("report written to {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

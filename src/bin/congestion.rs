//! congestion - count vehicles inside regions of interest and flag congestion.
//!
//! Reads a video (file, `stub://` stream or image directory), analyses every Nth
//! frame against the region file and writes annotated frames to the output
//! directory as a numbered PNG sequence.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use roi_congestion::annotate::load_font;
use roi_congestion::config::CongestionConfig;
use roi_congestion::{
    CancelToken, DetectorBackend, FileConfig, FileSource, FrameAnnotator, FrameSource,
    ImageSequenceSink, ImageSequenceSource, PipelineDriver, RegionStore, ScriptedBackend,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "congestion",
    about = "Analyse vehicle congestion inside regions of interest"
)]
struct Args {
    /// Video file, `stub://` stream or directory of frame images
    #[arg(long, value_name = "PATH")]
    input: String,

    /// Config file (JSON, or TOML with a .toml extension); defaults to $ROI_CONFIG
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Region file (overrides config)
    #[arg(long, value_name = "PATH")]
    regions: Option<PathBuf>,

    /// Output directory for annotated frames (overrides config)
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Analyse every Nth frame (overrides config)
    #[arg(long, value_name = "N")]
    frame_skip: Option<u32>,

    /// Replay detections from a JSON script instead of running a model
    #[arg(long, value_name = "PATH")]
    detections: Option<PathBuf>,

    /// ONNX model path (overrides config; requires backend-tract)
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// Font used for panel text (overrides config)
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,

    /// Frame rate reported for image-directory inputs
    #[arg(long, default_value_t = 25.0)]
    fps: f64,

    /// Write the run summary, including per-frame results, as JSON
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = {
        let _stage = ui.stage("Load configuration");
        let mut cfg = match args.config.as_deref() {
            Some(path) => CongestionConfig::load_from(Some(path))?,
            None => CongestionConfig::load()?,
        };
        if let Some(path) = &args.regions {
            cfg.regions_path = path.clone();
        }
        if let Some(dir) = &args.output {
            cfg.output_dir = dir.clone();
        }
        if let Some(n) = args.frame_skip {
            cfg.frame_skip = n;
        }
        if let Some(path) = &args.model {
            cfg.detector.model_path = path.clone();
        }
        if let Some(path) = &args.font {
            cfg.font_path = Some(path.clone());
        }
        cfg
    };

    let mut source = {
        let _stage = ui.stage("Prepare video source");
        open_source(&args.input, args.fps)?
    };
    let mut detector = {
        let _stage = ui.stage("Load detector");
        open_detector(&args, &cfg)?
    };
    let annotator = build_annotator(&cfg)?;
    let mut sink = ImageSequenceSink::new(&cfg.output_dir);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        log::warn!("interrupt received, stopping after the current frame");
        handler_token.cancel();
    })
    .context("error setting Ctrl-C handler")?;

    let mut driver = PipelineDriver::new(
        RegionStore::new(&cfg.regions_path),
        cfg.pipeline_settings(),
    )
    .with_annotator(annotator)
    .with_frame_reports(args.report.is_some())
    .with_cancel_token(cancel);

    let mut progress = ui.run_progress();
    let result = driver.run(
        source.as_mut(),
        detector.as_mut(),
        &mut sink,
        &mut progress,
    );

    let summary = driver.summary();
    println!("congestion: {}", driver_state_label(&result));
    println!("  frames read:       {}", summary.frames_read);
    println!("  frames analysed:   {}", summary.frames_processed);
    println!("  frames written:    {}", summary.frames_written);
    println!("  congested frames:  {}", summary.congested_frames);
    for (class, peak) in &summary.peak_counts {
        println!("  peak {:<13} {}", format!("{}:", class.plural_label()), peak);
    }
    println!("  peak total:        {}", summary.peak_overall);
    println!("  output:            {}", sink.dir().display());

    if let Some(path) = &args.report {
        write_report(path, summary)?;
    }

    result.map(|_| ()).map_err(anyhow::Error::from)
}

fn driver_state_label<T>(result: &std::result::Result<T, roi_congestion::PipelineError>) -> String {
    match result {
        Ok(_) => "completed".to_string(),
        Err(e) => format!("failed ({})", e),
    }
}

fn open_source(input: &str, fps: f64) -> Result<Box<dyn FrameSource>> {
    let path = Path::new(input);
    if path.is_dir() {
        return Ok(Box::new(ImageSequenceSource::new(path).with_fps(fps)));
    }
    let source = FileSource::new(FileConfig {
        path: input.to_string(),
    })?;
    Ok(Box::new(source))
}

fn open_detector(args: &Args, cfg: &CongestionConfig) -> Result<Box<dyn DetectorBackend>> {
    if let Some(path) = &args.detections {
        log::info!("replaying detections from {}", path.display());
        return Ok(Box::new(ScriptedBackend::from_json_file(path)?));
    }

    #[cfg(feature = "backend-tract")]
    {
        let backend = roi_congestion::detect::TractBackend::new(
            &cfg.detector.model_path,
            cfg.detector.input_size,
        )?
        .with_threshold(cfg.detector.confidence);
        Ok(Box::new(backend))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        Err(anyhow!(
            "no detector available for model {}: build with the backend-tract feature or pass --detections",
            cfg.detector.model_path.display()
        ))
    }
}

fn build_annotator(cfg: &CongestionConfig) -> Result<FrameAnnotator> {
    let annotator = FrameAnnotator::new(cfg.style);
    let Some(path) = &cfg.font_path else {
        return Ok(annotator);
    };
    let font = load_font(path)?;
    log::info!("panel font: {}", path.display());
    Ok(annotator.with_font(font))
}

fn write_report(path: &Path, summary: &roi_congestion::RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)
        .map_err(|e| anyhow!("failed to write report {}: {}", path.display(), e))?;
    log::info!("run summary written to {}", path.display());
    Ok(())
}

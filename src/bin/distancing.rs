//! distancing - run the proximity engine over a video file or camera and report throughput

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use distancing_kernel::{AnalysisSession, DistancingConfig, FileConfig, FrameOutcome, ModelKind};

#[path = "../ui.rs"]
mod ui;

/// Synthetic sources without an explicit frame budget stop here.
const DEFAULT_STUB_FRAMES: u64 = 120;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video file to analyze, or `stub://<name>` for synthetic frames.
    #[arg(long, env = "DISTANCING_SOURCE")]
    input: Option<String>,
    /// Capture from /dev/video<INDEX>; takes precedence over --input.
    #[arg(long, value_name = "INDEX")]
    camera: Option<u32>,
    /// Detector model (yolov3, yolov3-tiny, yolov4, yolov4-tiny, enet-coco).
    #[arg(long, env = "DISTANCING_MODEL")]
    model: Option<ModelKind>,
    /// Detector backend (stub, tract).
    #[arg(long, env = "DISTANCING_BACKEND")]
    backend: Option<String>,
    /// TOML config file.
    #[arg(long, env = "DISTANCING_CONFIG")]
    config: Option<PathBuf>,
    /// Frames a synthetic source yields before it ends.
    #[arg(long)]
    frames: Option<u64>,
    /// Palette seed for reproducible group colors.
    #[arg(long, env = "DISTANCING_SEED")]
    seed: Option<u64>,
    /// Print one JSON summary per analyzed frame on stdout.
    #[arg(long)]
    json: bool,
    /// Write annotated JPEGs of analyzed frames into this directory.
    #[cfg(feature = "render-image")]
    #[arg(long, value_name = "DIR")]
    annotate_dir: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty && !args.json);

    let cfg = {
        let _stage = ui.stage("load configuration");
        resolve_config(&args)?
    };
    log::info!(
        "source={} backend={} model={}",
        cfg.source.path,
        cfg.detector.backend,
        cfg.detector.model
    );

    #[cfg(feature = "render-image")]
    if let Some(dir) = &args.annotate_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let mut session = {
        let _stage = ui.stage("open source and detector");
        let mut session = AnalysisSession::from_config(&cfg)?;
        session.start()?;
        session
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    let progress = ui.frame_progress();
    let mut violating_pairs = 0u64;
    let stats = session.run(|outcome| {
        if let FrameOutcome::Analyzed(analyzed) = outcome {
            let summary = analyzed.analysis.summary();
            violating_pairs += summary.violating_pairs as u64;
            progress.tick(analyzed.frame.index, violating_pairs);
            if args.json {
                let line = serde_json::json!({
                    "frame": analyzed.frame.index,
                    "summary": summary,
                    "violations": analyzed.analysis.unique_pairs().collect::<Vec<_>>(),
                });
                println!("{}", line);
            }
            #[cfg(feature = "render-image")]
            if let Some(dir) = &args.annotate_dir {
                write_annotated(dir, analyzed)?;
            }
        }
        Ok(!stop.load(Ordering::SeqCst))
    })?;
    progress.finish();

    if stop.load(Ordering::SeqCst) {
        log::info!("interrupted after {} frames", stats.frames_read);
    }

    eprintln!("Total Frames: {}", stats.frames_read);
    eprintln!("Analyzed Frames: {}", stats.frames_analyzed);
    eprintln!("Violating Pairs: {}", stats.violating_pairs);
    eprintln!("Analyze Time: {}", ui::format_duration(stats.elapsed));
    eprintln!("Average FPS: {:.2}", stats.frames_per_second());
    Ok(())
}

/// Config file and environment first, then explicit flags on top.
fn resolve_config(args: &Args) -> Result<DistancingConfig> {
    let mut cfg = DistancingConfig::load_from(args.config.as_deref())?;
    if let Some(input) = &args.input {
        if input.trim().is_empty() {
            return Err(anyhow!("--input must not be empty"));
        }
        cfg.source.path = input.clone();
    }
    if let Some(index) = args.camera {
        cfg.source.path = FileConfig::camera(index).path;
    }
    if let Some(model) = args.model {
        cfg.detector.model = model;
    }
    if let Some(backend) = &args.backend {
        cfg.detector.backend = backend.trim().to_lowercase();
    }
    if let Some(seed) = args.seed {
        cfg.palette_seed = Some(seed);
    }
    if let Some(frames) = args.frames {
        cfg.source.max_frames = Some(frames);
    }
    if cfg.source.path.starts_with("stub://") && cfg.source.max_frames.is_none() {
        cfg.source.max_frames = Some(DEFAULT_STUB_FRAMES);
    }
    Ok(cfg)
}

#[cfg(feature = "render-image")]
fn write_annotated(
    dir: &std::path::Path,
    analyzed: &distancing_kernel::AnalyzedFrame,
) -> Result<()> {
    use distancing_kernel::{annotate, Frame, ImageRenderer};

    let frame = Frame::new(
        analyzed.frame.pixels().to_vec(),
        analyzed.frame.width,
        analyzed.frame.height,
        analyzed.frame.index,
    )?;
    let mut renderer = ImageRenderer::from_frame(frame)?;
    annotate(&analyzed.analysis, &mut renderer);
    renderer.save_jpeg(&dir.join(format!("frame_{:06}.jpg", analyzed.frame.index)))
}

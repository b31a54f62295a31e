use std::{error::Error, path::PathBuf};

use clap::Parser;
use depth_cliff::detect::{load_depth_png, save_depth_png};
use depth_cliff::detector::{CliffDetectConfig, CliffDetectReport};

/// Run cliff detection on one 16-bit depth PNG described by a JSON config.
#[derive(Debug, Parser)]
#[command(author, version, about = "Depth-camera cliff detection")]
struct Args {
    /// JSON config with `depth_path`, `camera` and optional `params`.
    config: PathBuf,

    /// Report path; overrides `output_path` from the config.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Log detector internals to stderr.
    #[arg(long, short)]
    verbose: bool,
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) -> Result<(), Box<dyn Error>> {
    #[cfg(feature = "tracing")]
    {
        let _ = verbose;
        depth_cliff::core::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let level = if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        };
        depth_cliff::core::init_with_level(level)?;
    }
    Ok(())
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let cfg = CliffDetectConfig::load_json(&args.config)?;
    let depth = load_depth_png(&cfg.depth_path)?;
    let mut detector = cfg.build_detector()?;

    let mut report = CliffDetectReport::new(&cfg, &args.config, depth.width, depth.height);
    match detector.detect(&depth.view(), &cfg.camera) {
        Ok(res) => {
            report.set_detection(&res);
            if let (Some(annotated), Some(path)) = (&res.annotated, &cfg.annotated_path) {
                save_depth_png(annotated, path)?;
            }
        }
        Err(err) => {
            log::warn!("detection failed: {err}");
            report.set_error(&err);
        }
    }

    let out = args.output.unwrap_or_else(|| cfg.output_path());
    report.write_json(&out)?;
    println!("{}", out.display());
    Ok(())
}

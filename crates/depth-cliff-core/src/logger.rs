//! Stderr logger for tools built on the detector.
//!
//! Lines look like `[  0.042s DEBUG depth_cliff_detector] rebuilt row table`.
//! The detector crates only talk to the `log` facade; a binary installs this
//! logger (or the `tracing` subscriber) once at startup.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose records are shown; everything else is dropped.
const OWN_TARGETS: [&str; 3] = ["depth_cliff", "depth_cliff_core", "depth_cliff_detector"];

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

fn crate_of(target: &str) -> &str {
    target.split("::").next().unwrap_or(target)
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && OWN_TARGETS.contains(&crate_of(metadata.target()))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:8.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            crate_of(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization; the first level wins.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a `tracing` subscriber. `RUST_LOG` overrides the default
/// `depth_cliff=info` style filter.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("depth_cliff=info,depth_cliff_core=info,depth_cliff_detector=info")
    });
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

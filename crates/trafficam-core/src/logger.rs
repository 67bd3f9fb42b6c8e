//! Stderr logging for the trafficam tools.
//!
//! Records from the workspace crates are shown at the requested level;
//! everything else (image decoders, etc.) only at `warn` and above. Lines look
//! like `[  0.412s  INFO stabilize] tracking 183 feature points`.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt::format::FmtSpan, util::SubscriberInitExt, EnvFilter};

const WORKSPACE_PREFIX: &str = "trafficam";
const DEPENDENCY_LEVEL: LevelFilter = LevelFilter::Warn;

#[cfg(feature = "tracing")]
const DEFAULT_DIRECTIVES: &str =
    "warn,trafficam=info,trafficam_core=info,trafficam_stabilize=info,trafficam_zones=info";

struct ClipLogger {
    level: LevelFilter,
    started: Instant,
}

impl ClipLogger {
    fn threshold(&self, target: &str) -> LevelFilter {
        if target.starts_with(WORKSPACE_PREFIX) {
            self.level
        } else {
            self.level.min(DEPENDENCY_LEVEL)
        }
    }
}

/// `trafficam_stabilize::engine` -> `stabilize`, `trafficam::count` -> `count`.
fn short_target(target: &str) -> &str {
    let krate = target.split("::").next().unwrap_or(target);
    match krate.strip_prefix("trafficam_") {
        Some(rest) => rest,
        None if krate == WORKSPACE_PREFIX => target.split("::").nth(1).unwrap_or(krate),
        None => krate,
    }
}

impl Log for ClipLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.threshold(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        let _ = writeln!(
            std::io::stderr().lock(),
            "[{:7.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            short_target(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<ClipLogger> = OnceLock::new();

/// Install the stderr logger for workspace records at `level`.
///
/// Only the first call installs a logger; later calls return `Ok(())`.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| ClipLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` fmt subscriber with span-close timings.
///
/// `RUST_LOG` replaces the default of `info` for the workspace crates and
/// `warn` elsewhere. `json` switches to one JSON object per line.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(tracing_subscriber::fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_are_shortened_to_the_component() {
        assert_eq!(short_target("trafficam_stabilize::engine"), "stabilize");
        assert_eq!(short_target("trafficam_zones"), "zones");
        assert_eq!(short_target("trafficam::count"), "count");
        assert_eq!(short_target("trafficam"), "trafficam");
        assert_eq!(short_target("png::decoder"), "png");
    }

    #[test]
    fn dependencies_are_capped_at_warn() {
        let logger = ClipLogger {
            level: LevelFilter::Debug,
            started: Instant::now(),
        };
        assert_eq!(logger.threshold("trafficam_zones::tracker"), LevelFilter::Debug);
        assert_eq!(logger.threshold("image::codecs"), LevelFilter::Warn);

        let quiet = ClipLogger {
            level: LevelFilter::Error,
            started: Instant::now(),
        };
        assert_eq!(quiet.threshold("image::codecs"), LevelFilter::Error);
    }
}

//! Subscriber setup for applications embedding knit.
//!
//! Only built with the `logging` feature. The knit crates emit `tracing`
//! spans (`scan`, `link`, `render`) and events; a host that already has a
//! subscriber needs nothing from here.

use std::fmt;
use std::str::FromStr;
use std::sync::Once;

use knit_config::KnitConfig;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{
    EnvFilter, fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt,
};

static INIT: Once = Once::new();

/// Crates whose events `LogLevel` controls. Everything else stays at `warn`.
const KNIT_TARGETS: &[&str] = &["knit_config", "knit_graph", "knit_bundler"];

/// Verbosity of knit's own events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Silent,
    Error,
    /// Matches the `logLevel` config default.
    #[default]
    Warn,
    /// Phase spans and the build summary.
    Info,
    /// Per-unit and per-chunk events.
    Debug,
}

impl LogLevel {
    fn name(self) -> &'static str {
        match self {
            LogLevel::Silent => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    fn level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Silent => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
        }
    }

    /// `warn` globally, `self` for the knit crates.
    fn directives(self) -> String {
        let global = if self.level_filter() < LevelFilter::WARN {
            self.name()
        } else {
            LogLevel::Warn.name()
        };
        let mut directives = vec![global.to_string()];
        directives.extend(
            KNIT_TARGETS
                .iter()
                .map(|target| format!("{target}={}", self.name())),
        );
        directives.join(",")
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silent" | "off" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(format!(
                "unknown log level '{other}' (expected silent, error, warn, info or debug)"
            )),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Install a compact stderr subscriber at `level`.
///
/// A set `RUST_LOG` takes precedence over `level`. The first call in a
/// process wins; later calls do nothing.
///
/// ```rust,no_run
/// use knit_bundler::{LogLevel, init_logging};
///
/// init_logging(LogLevel::Info);
/// ```
pub fn init_logging(level: LogLevel) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.directives()));
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer::layer().compact().with_target(false).without_time())
            .init();
    });
}

/// Install a subscriber driven by `RUST_LOG`, or `info` for knit when unset.
pub fn init_logging_from_env() {
    init_logging(LogLevel::Info);
}

/// Install a subscriber at the config's `logLevel`.
pub fn init_logging_from_config(config: &KnitConfig) -> Result<(), String> {
    let level = config.log_level.parse::<LogLevel>()?;
    init_logging(level);
    Ok(())
}

//! Structured logging setup for fsdouble
//!
//! The library itself only emits `tracing` events: operation traces at
//! `trace`, watch lifecycle at `debug`, swallowed sink failures at `warn`.
//! Binaries and test harnesses that want to see them call one of the
//! initializers here once at startup.
//!
//! # Example
//!
//! ```no_run
//! use fsdouble::util::logging;
//!
//! // FSDOUBLE_LOG_LEVEL=debug FSDOUBLE_LOG_JSON=true
//! logging::init_from_env();
//!
//! tracing::info!("Emulator started");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for `fsdouble` targets
    pub level: Level,

    /// Emit one JSON object per event
    pub use_json: bool,

    /// Include the module target (e.g. `fsdouble::watch::notifier`)
    pub include_target: bool,

    /// Include file and line number
    pub include_location: bool,

    /// Include thread ids and names; useful for following watch dispatch threads
    pub include_thread_ids: bool,

    /// Write to stderr instead of stdout, keeping stdout for command output
    pub use_stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
            use_stderr: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with full metadata
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
            include_thread_ids: true,
            use_stderr: false,
        }
    }

    /// Debug level with thread names, for chasing watcher ordering issues
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            include_thread_ids: true,
            ..Default::default()
        }
    }

    pub fn stderr(mut self) -> Self {
        self.use_stderr = true;
        self
    }
}

/// Parses a log level from a string, case-insensitively.
///
/// Falls back to `INFO` with a warning on stderr.
///
/// ```
/// use fsdouble::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("WARN"), Level::WARN);
/// assert_eq!(parse_level("loud"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn build_filter(level: Level) -> EnvFilter {
    let directive = format!("fsdouble={}", level);
    match directive.parse() {
        Ok(d) => EnvFilter::from_default_env().add_directive(d),
        Err(_) => EnvFilter::from_default_env(),
    }
}

/// Installs the global subscriber. Only the first call has any effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);

        let layer = fmt::layer()
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_thread_names(config.include_thread_ids);

        let registry = tracing_subscriber::registry().with(filter);
        match (config.use_json, config.use_stderr) {
            (true, true) => registry
                .with(layer.json().with_writer(std::io::stderr))
                .init(),
            (true, false) => registry.with(layer.json()).init(),
            (false, true) => registry.with(layer.with_writer(std::io::stderr)).init(),
            (false, false) => registry.with(layer).init(),
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

/// Initializes logging from `FSDOUBLE_LOG_LEVEL` and `FSDOUBLE_LOG_JSON`.
/// `RUST_LOG` directives are honored on top.
pub fn init_from_env() {
    let level_str = env::var("FSDOUBLE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let level = parse_level(&level_str);

    let use_json = env::var("FSDOUBLE_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    init_logging(LoggingConfig {
        level,
        use_json,
        ..Default::default()
    });
}

/// Test harness helper: logs at `level` to stderr.
pub fn with_level(level_str: &str) {
    init_logging(LoggingConfig::with_level(parse_level(level_str)).stderr());
}

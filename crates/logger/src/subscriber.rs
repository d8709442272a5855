use std::env::var;
use std::str::FromStr;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

pub fn init() {
    init_tracing();
}

/// INFO by default; `RUST_LOG` and `RUST_LOG_FORMAT` override.
pub fn init_tracing() {
    init_with(LevelFilter::INFO, None);
}

/// Initialize with a default level and format. `RUST_LOG` still refines the
/// filter and `RUST_LOG_FORMAT`, when set, wins over `format`.
pub fn init_with(level: LevelFilter, format: Option<LogFormat>) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let format = match var("RUST_LOG_FORMAT") {
        Ok(raw) => raw.parse().unwrap_or_else(|error| {
            eprintln!("Invalid RUST_LOG_FORMAT, falling back to compact: {error}");
            LogFormat::Compact
        }),
        Err(_) => format.unwrap_or_default(),
    };

    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().with_filter(env_filter).boxed(),
    };

    if tracing_subscriber::registry().with(log_layer).try_init().is_err() {
        warn!("Tracing subscriber already initialized");
    }
}

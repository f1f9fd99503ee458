use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const ENV_WORKSPACE: &str = "MARKSD_WORKSPACE";
pub const ENV_LOG: &str = "MARKSD_LOG";
pub const ENV_LOG_JSON: &str = "MARKSD_LOG_JSON";
pub const DEFAULT_LOG_FILTER: &str = "marksd=info,warn";

#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    /// Opened before the first request when set.
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
    pub log_json: bool,
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let workspace = lookup(ENV_WORKSPACE)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let log_filter = lookup(ENV_LOG)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let log_json = lookup(ENV_LOG_JSON)
            .and_then(|s| parse_bool(&s))
            .unwrap_or(false);
        Self {
            workspace,
            log_filter,
            log_json,
        }
    }
}

/// Logs go to stderr; stdout carries responses only.
pub fn init_tracing(cfg: &DaemonConfig) {
    let filter = EnvFilter::try_new(&cfg.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

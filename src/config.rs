use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const PLACEHOLDER_BACKEND_URL: &str = "https://script.google.com/macros/s/CHANGE_ME/exec";

/// How the gateway reaches the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GatewayMode {
    /// Through the ordered CORS relay chain, direct request as a last resort.
    #[default]
    Relay,
    /// Straight to the backend, no relays.
    Direct,
}

impl FromStr for GatewayMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relay" => Ok(GatewayMode::Relay),
            "direct" => Ok(GatewayMode::Direct),
            other => anyhow::bail!("unknown gateway mode '{}' (expected 'relay' or 'direct')", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub mode: GatewayMode,
    /// Deadline applied to every single transport attempt.
    pub attempt_timeout: Duration,
    /// Whether the relay chain ends with a direct request to the backend.
    pub direct_fallback: bool,
    /// YAML file replacing the built-in relay list.
    pub proxy_file: Option<PathBuf>,
    /// TTL for cached reads. Zero disables the cache.
    pub cache_ttl: Duration,
    pub port: u16,
    pub dashboard_origin: String,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

/// Only the relay list location, for commands that never reach the backend.
pub fn load_proxy_file() -> Option<PathBuf> {
    dotenvy::dotenv().ok();
    proxy_file_from(|key| std::env::var(key).ok())
}

fn proxy_file_from(lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    lookup("RELAY_PROXY_FILE")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Build a config from an arbitrary variable lookup.
pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
    let backend_url = lookup("RELAY_BACKEND_URL").unwrap_or_else(|| PLACEHOLDER_BACKEND_URL.into());

    if backend_url == PLACEHOLDER_BACKEND_URL {
        let env_mode = lookup("RELAY_ENV").unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!("RELAY_BACKEND_URL is not set. Point it at the deployed backend script before running in production.");
        }
        tracing::warn!("RELAY_BACKEND_URL is not set; using placeholder {}", PLACEHOLDER_BACKEND_URL);
    }

    let mode = match lookup("RELAY_GATEWAY_MODE") {
        Some(v) => v.parse()?,
        None => GatewayMode::default(),
    };

    Ok(Config {
        backend_url,
        mode,
        attempt_timeout: Duration::from_millis(
            lookup("RELAY_ATTEMPT_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(10_000),
        ),
        direct_fallback: lookup("RELAY_DIRECT_FALLBACK")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true),
        proxy_file: proxy_file_from(&lookup),
        cache_ttl: Duration::from_secs(
            lookup("RELAY_CACHE_TTL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        ),
        port: lookup("RELAY_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(8787),
        dashboard_origin: lookup("DASHBOARD_ORIGIN").unwrap_or_else(|| "http://localhost:3000".into()),
    })
}

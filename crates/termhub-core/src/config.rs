use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// How long the Broadcast Hub waits between keepalive pings to an observer.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 54;
/// How long an observer may go without a pong before it is closed.
pub const OBSERVER_TIMEOUT_SECS: u64 = 60;

/// Top-level config (`termhub.toml` + `TERMHUB_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermhubConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub mux: MuxConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Default for TermhubConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            mux: MuxConfig::default(),
            store: StoreConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

/// Configuration for the external detachable terminal multiplexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuxConfig {
    /// Path to (or name of) the multiplexer binary, resolved via `PATH`.
    #[serde(default = "default_mux_bin")]
    pub bin: String,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            bin: default_mux_bin(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Tuning knobs for the Structured Log Tailer and Screen-Scrape Monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// How long the tailer waits for a new structured-log file to appear
    /// before falling back to the Screen-Scrape Monitor.
    #[serde(default = "default_log_wait_ms")]
    pub log_wait_ms: u64,
    /// Tailer poll interval.
    #[serde(default = "default_tail_poll_ms")]
    pub tail_poll_ms: u64,
    /// Screen-scrape cadence (both the snapshot cadence and, when
    /// authoritative, the message-extraction cadence).
    #[serde(default = "default_scrape_interval_ms")]
    pub scrape_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            log_wait_ms: default_log_wait_ms(),
            tail_poll_ms: default_tail_poll_ms(),
            scrape_interval_ms: default_scrape_interval_ms(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_mux_bin() -> String {
    "tmux".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.termhub/termhub.db", home)
}
fn default_log_wait_ms() -> u64 {
    10_000
}
fn default_tail_poll_ms() -> u64 {
    100
}
fn default_scrape_interval_ms() -> u64 {
    500
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.termhub/termhub.toml", home)
}

impl TermhubConfig {
    /// Load config from a TOML file with `TERMHUB_*` env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `TERMHUB_CONFIG` env var
    ///   3. `~/.termhub/termhub.toml`
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("TERMHUB_CONFIG").ok())
            .unwrap_or_else(default_config_path);

        let config: TermhubConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("TERMHUB_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let cfg = TermhubConfig::default();
        assert_eq!(cfg.gateway.port, DEFAULT_PORT);
        assert_eq!(cfg.mux.bin, "tmux");
        assert!(cfg.watch.log_wait_ms > 0);
    }
}

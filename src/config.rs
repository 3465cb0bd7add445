//! Layered application configuration: defaults, then environment variables (`KAFKA_BRIDGE_*`),
//! then CLI flags, highest priority last — the same composition order the teacher crate's
//! `app/config.rs` builds, trimmed of the TUI-only fields (theme, profile file, schema registry)
//! and extended with the HTTP/session fields this server needs.

use clap::Parser;
use config::{ConfigError, Environment, Map, Source, Value};
use serde::Deserialize;

/// Environment variable prefix used for all bridge configuration overrides.
const ENV_PREFIX: &str = "KAFKA_BRIDGE";

/// Fully resolved application configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Address the HTTP server binds to, e.g. `0.0.0.0:8080`.
    #[serde(default = "default_http_listen_addr")]
    pub http_listen_addr: String,
    /// Comma-separated Kafka bootstrap servers.
    pub bootstrap_servers: String,
    /// Prefix used for generated consumer instance names.
    #[serde(default = "default_bridge_id")]
    pub bridge_id: String,
    /// Seconds of inactivity after which a consumer instance is auto-deleted.
    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,
    /// Default poll timeout in milliseconds, used when a request does not override it.
    #[serde(default = "default_poll_timeout_ms")]
    pub default_poll_timeout_ms: u64,
    /// Default maximum response size in bytes, used when a request does not override it.
    #[serde(default = "default_max_response_bytes")]
    pub default_max_response_bytes: usize,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LogConfig {
    /// `"text"` (human-readable) or `"json"`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CorsConfig {
    /// Allowed CORS origins. `["*"]` (the default) permits any origin.
    #[serde(default = "default_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_cors_origins(),
        }
    }
}

fn default_http_listen_addr() -> String {
    String::from("0.0.0.0:8080")
}

fn default_bridge_id() -> String {
    gethostname::gethostname()
        .into_string()
        .unwrap_or_else(|_| String::from("kafka-bridge"))
}

fn default_idle_timeout_seconds() -> u64 {
    300
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_max_response_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_log_format() -> String {
    String::from("text")
}

fn default_cors_origins() -> Vec<String> {
    vec![String::from("*")]
}

impl Config {
    /// Builds the final configuration from defaults, `KAFKA_BRIDGE_*` environment variables, and
    /// parsed CLI flags, in ascending priority order.
    pub fn new(cli: Cli) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .set_default("http_listen_addr", default_http_listen_addr())?
            .set_default("bridge_id", default_bridge_id())?
            .set_default("idle_timeout_seconds", default_idle_timeout_seconds() as i64)?
            .set_default("default_poll_timeout_ms", default_poll_timeout_ms() as i64)?
            .set_default(
                "default_max_response_bytes",
                default_max_response_bytes() as i64,
            )?
            .set_default("log.format", default_log_format())?
            .set_default("cors.allowed_origins", default_cors_origins())?
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .add_source(cli);

        builder.build()?.try_deserialize()
    }
}

/// CLI flags for the bridge's HTTP server, layered into [`Config`] as a [`Source`], the same way
/// the teacher crate's `Cli` struct layers into its own `config::Config` builder chain.
#[derive(Clone, Debug, Default, Parser)]
#[command()]
pub struct Cli {
    /// Address the HTTP server binds to, e.g. `0.0.0.0:8080`.
    #[arg(long)]
    pub http_listen_addr: Option<String>,
    /// Host value for the Kafka brokers the bridge will connect to.
    #[arg(short, long)]
    pub bootstrap_servers: Option<String>,
    /// Prefix used for generated consumer instance names. Defaults to the machine hostname.
    #[arg(long)]
    pub bridge_id: Option<String>,
    /// Seconds of inactivity after which a consumer instance is auto-deleted.
    #[arg(long)]
    pub idle_timeout_seconds: Option<u64>,
    /// Default poll timeout in milliseconds.
    #[arg(long)]
    pub default_poll_timeout_ms: Option<u64>,
    /// Default maximum response size in bytes.
    #[arg(long)]
    pub default_max_response_bytes: Option<usize>,
    /// Log output format: `text` or `json`.
    #[arg(long)]
    pub log_format: Option<String>,
}

impl Source for Cli {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        let mut cfg = Map::new();

        if let Some(v) = self.http_listen_addr.as_ref() {
            cfg.insert(String::from("http_listen_addr"), Value::from(v.clone()));
        }

        if let Some(v) = self.bootstrap_servers.as_ref() {
            cfg.insert(String::from("bootstrap_servers"), Value::from(v.clone()));
        }

        if let Some(v) = self.bridge_id.as_ref() {
            cfg.insert(String::from("bridge_id"), Value::from(v.clone()));
        }

        if let Some(v) = self.idle_timeout_seconds {
            cfg.insert(String::from("idle_timeout_seconds"), Value::from(v as i64));
        }

        if let Some(v) = self.default_poll_timeout_ms {
            cfg.insert(
                String::from("default_poll_timeout_ms"),
                Value::from(v as i64),
            );
        }

        if let Some(v) = self.default_max_response_bytes {
            cfg.insert(
                String::from("default_max_response_bytes"),
                Value::from(v as i64),
            );
        }

        if let Some(v) = self.log_format.as_ref() {
            cfg.insert(String::from("log.format"), Value::from(v.clone()));
        }

        Ok(cfg)
    }
}

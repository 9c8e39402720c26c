use crate::error::CoreError;
use config::{Config as ConfigLoader, Environment, File};
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

// Helper for deserializing Duration from milliseconds
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Main configuration structure
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub global: GlobalConfig,
    pub server: ServerConfig,
    pub transport: TransportConfig,
    pub storage: StorageConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GlobalConfig {
    pub log_level: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Where the chat server lives.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the REST API, e.g. `http://localhost:8000`.
    pub api_url: String,
    /// Base URL of the WebSocket endpoint. Derived from `api_url` when unset.
    pub ws_url: Option<String>,
    #[serde(rename = "request_timeout_ms", deserialize_with = "duration_ms_serde::deserialize")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            ws_url: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// WebSocket base URL (`ws://host` or `wss://host`) without a trailing slash.
    ///
    /// An explicit `ws_url` wins; otherwise the REST base is mapped
    /// `http` → `ws` and `https` → `wss`.
    pub fn ws_base(&self) -> String {
        let base = match &self.ws_url {
            Some(url) => url.clone(),
            None => {
                if let Some(rest) = self.api_url.strip_prefix("https://") {
                    format!("wss://{}", rest)
                } else if let Some(rest) = self.api_url.strip_prefix("http://") {
                    format!("ws://{}", rest)
                } else {
                    self.api_url.clone()
                }
            }
        };
        base.trim_end_matches('/').to_string()
    }

    /// REST base URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

// Transport layer configuration
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TransportConfig {
    #[serde(rename = "connect_timeout_ms", deserialize_with = "duration_ms_serde::deserialize")]
    pub connect_timeout: Duration,
    #[serde(rename = "heartbeat_interval_ms", deserialize_with = "duration_ms_serde::deserialize")]
    pub heartbeat_interval: Duration,
    /// Text carried by the `join` frame sent right after the socket opens.
    pub join_message: String,
    pub websocket: WebSocketConfig,
    pub reconnect: ReconnectConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            heartbeat_interval: Duration::from_secs(25),
            join_message: "Client joined the room".to_string(),
            websocket: WebSocketConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

// WebSocket specific configuration
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct WebSocketConfig {
    pub max_message_size: Option<usize>,
    pub max_frame_size: Option<usize>,
    pub accept_unmasked_frames: bool,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectStrategy {
    #[default]
    Exponential,
    Fixed,
}

/// Reconnect back-off settings.
///
/// `max_attempts = 0` disables the attempt limit.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ReconnectConfig {
    pub strategy: ReconnectStrategy,
    #[serde(rename = "base_delay_ms", deserialize_with = "duration_ms_serde::deserialize")]
    pub base_delay: Duration,
    pub growth_factor: f64,
    #[serde(rename = "max_delay_ms", deserialize_with = "duration_ms_serde::deserialize")]
    pub max_delay: Duration,
    #[serde(rename = "fixed_delay_ms", deserialize_with = "duration_ms_serde::deserialize")]
    pub fixed_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            strategy: ReconnectStrategy::Exponential,
            base_delay: Duration::from_secs(1),
            growth_factor: 1.5,
            max_delay: Duration::from_secs(5),
            fixed_delay: Duration::from_secs(2),
            max_attempts: 10,
        }
    }
}

/// Location of the persisted client state (tokens, UI preferences).
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("relaydesk-state.json"),
        }
    }
}

impl Config {
    /// Rejects values no component can work with.
    pub fn validate(&self) -> Result<(), CoreError> {
        let api = &self.server.api_url;
        if !(api.starts_with("http://") || api.starts_with("https://")) {
            return Err(CoreError::InvalidConfig(format!(
                "server.api_url must be an http(s) URL, got '{}'",
                api
            )));
        }
        if let Some(ws) = &self.server.ws_url {
            if !(ws.starts_with("ws://") || ws.starts_with("wss://")) {
                return Err(CoreError::InvalidConfig(format!(
                    "server.ws_url must be a ws(s) URL, got '{}'",
                    ws
                )));
            }
        }
        if self.transport.connect_timeout.is_zero() {
            return Err(CoreError::InvalidConfig(
                "transport.connect_timeout_ms cannot be zero".to_string(),
            ));
        }
        if self.transport.heartbeat_interval.is_zero() {
            return Err(CoreError::InvalidConfig(
                "transport.heartbeat_interval_ms cannot be zero".to_string(),
            ));
        }

        let reconnect = &self.transport.reconnect;
        match reconnect.strategy {
            ReconnectStrategy::Exponential => {
                if reconnect.base_delay.is_zero() {
                    return Err(CoreError::InvalidConfig(
                        "transport.reconnect.base_delay_ms cannot be zero".to_string(),
                    ));
                }
                if !(reconnect.growth_factor >= 1.0) {
                    return Err(CoreError::InvalidConfig(format!(
                        "transport.reconnect.growth_factor must be >= 1.0, got {}",
                        reconnect.growth_factor
                    )));
                }
                if reconnect.max_delay < reconnect.base_delay {
                    return Err(CoreError::InvalidConfig(
                        "transport.reconnect.max_delay_ms must be >= base_delay_ms".to_string(),
                    ));
                }
            }
            ReconnectStrategy::Fixed => {
                if reconnect.fixed_delay.is_zero() {
                    return Err(CoreError::InvalidConfig(
                        "transport.reconnect.fixed_delay_ms cannot be zero".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Loads configuration from a file and environment variables.
///
/// With `source_path` the file is required; otherwise `relaydesk.toml` (or
/// `.json`, `.yaml`, ...) in the current directory is loaded if present.
/// Environment variables prefixed with `RELAYDESK` override both, using `__`
/// for nesting (e.g. `RELAYDESK__TRANSPORT__HEARTBEAT_INTERVAL_MS=10000`).
pub fn load_config(source_path: Option<PathBuf>) -> Result<Config, CoreError> {
    let mut builder = ConfigLoader::builder();

    builder = match source_path {
        Some(path) => {
            log::debug!("Loading configuration from: {:?}", path);
            builder.add_source(File::from(path).required(true))
        }
        None => builder.add_source(File::with_name("relaydesk").required(false)),
    };

    builder = builder.add_source(
        Environment::with_prefix("RELAYDESK")
            .separator("__")
            .try_parsing(true),
    );

    let cfg: Config = builder.build()?.try_deserialize()?;
    cfg.validate()?;

    log::debug!("Loaded configuration: {:?}", cfg);
    Ok(cfg)
}

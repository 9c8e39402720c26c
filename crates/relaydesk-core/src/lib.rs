//! # RelayDesk Core
//!
//! Shared plumbing for the RelayDesk client crates: configuration loading,
//! logging initialisation and the core error type.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    Config, GlobalConfig, ReconnectConfig, ReconnectStrategy, ServerConfig, StorageConfig,
    TransportConfig, WebSocketConfig, load_config,
};
pub use error::CoreError;

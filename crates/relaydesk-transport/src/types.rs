use relaydesk_core::TransportConfig;
use std::time::Duration;

/// Parameters required to establish one connection attempt.
#[derive(Clone, Debug)]
pub struct ConnectParams {
    /// The full URL for the connection. The scheme selects the transport.
    pub url: String,

    /// Applied to the handshake of every attempt.
    pub connection_timeout: Duration,

    /// Options specific to WebSocket connections.
    #[cfg(feature = "websocket")]
    pub ws_options: WebSocketConnectOptions,
}

impl ConnectParams {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection_timeout: default_connect_timeout(),
            #[cfg(feature = "websocket")]
            ws_options: WebSocketConnectOptions::default(),
        }
    }

    /// Same settings, different address.
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..self.clone()
        }
    }
}

impl From<&TransportConfig> for ConnectParams {
    fn from(cfg: &TransportConfig) -> Self {
        Self {
            url: String::new(),
            connection_timeout: cfg.connect_timeout,
            #[cfg(feature = "websocket")]
            ws_options: WebSocketConnectOptions {
                max_message_size: cfg.websocket.max_message_size,
                max_frame_size: cfg.websocket.max_frame_size,
                accept_unmasked_frames: cfg.websocket.accept_unmasked_frames,
            },
        }
    }
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(20)
}

/// Options specific to WebSocket connections.
#[derive(Clone, Debug, Default)]
#[cfg(feature = "websocket")]
pub struct WebSocketConnectOptions {
    pub max_message_size: Option<usize>,
    pub max_frame_size: Option<usize>,
    pub accept_unmasked_frames: bool,
}

//! Transport creation based on the URL scheme in `ConnectParams`.

use crate::error::TransportError;
use crate::traits::{Connector, Transport};
use crate::types::ConnectParams;

#[cfg(feature = "websocket")]
use crate::websocket::WebSocketTransport;

/// Creates a boxed `Transport` for the scheme of `params.url`.
///
/// Supports `ws://` and `wss://` when the `websocket` feature is enabled.
pub fn create_transport(params: &ConnectParams) -> Result<Box<dyn Transport>, TransportError> {
    let url = &params.url;

    if url.starts_with("ws://") || url.starts_with("wss://") {
        #[cfg(feature = "websocket")]
        {
            Ok(Box::new(WebSocketTransport::new(params.clone())))
        }
        #[cfg(not(feature = "websocket"))]
        {
            log::error!("WebSocket URL specified, but 'websocket' feature is not enabled.");
            Err(TransportError::UnsupportedScheme(
                "WebSocket (ws/wss) requires the 'websocket' feature.".to_string(),
            ))
        }
    } else {
        let scheme = url.split("://").next().unwrap_or_default();
        log::error!("Unsupported URL scheme '{}'", scheme);
        Err(TransportError::UnsupportedScheme(scheme.to_string()))
    }
}

/// The connector used outside of tests: picks the transport by URL scheme.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemeConnector;

impl Connector for SchemeConnector {
    fn create(&self, params: &ConnectParams) -> Result<Box<dyn Transport>, TransportError> {
        create_transport(params)
    }
}

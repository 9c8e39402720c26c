//! Implementation of the `Transport` trait using WebSockets (`tokio-tungstenite`).

#![cfg(feature = "websocket")]

use crate::endpoint::redact_url;
use crate::error::TransportError;
use crate::traits::{CloseInfo, Received, Transport};
use crate::types::{ConnectParams, WebSocketConnectOptions};
use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use log::{debug, info, trace, warn};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async_with_config,
    tungstenite::{
        Error as TungsteniteError,
        protocol::{Message as TungsteniteMessage, WebSocketConfig},
    },
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, TungsteniteMessage>;
type WsSource = SplitStream<WsStream>;

/// WebSocket transport implementation.
pub struct WebSocketTransport {
    params: ConnectParams,
    sink: Option<WsSink>,
    source: Option<WsSource>,
}

impl WebSocketTransport {
    pub fn new(params: ConnectParams) -> Self {
        Self {
            params,
            sink: None,
            source: None,
        }
    }

    fn apply_options(options: &WebSocketConnectOptions) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        if let Some(size) = options.max_message_size {
            config.max_message_size = Some(size);
        }
        if let Some(size) = options.max_frame_size {
            config.max_frame_size = Some(size);
        }
        config.accept_unmasked_frames = options.accept_unmasked_frames;
        config
    }
}


#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.sink.is_some() || self.source.is_some() {
            warn!("WebSocketTransport already connected or partially connected.");
            return Err(TransportError::ConnectionFailed("Already connected".into()));
        }

        info!("Connecting WebSocket to {}", redact_url(&self.params.url));
        let ws_config = Self::apply_options(&self.params.ws_options);

        let (ws_stream, response) =
            connect_async_with_config(self.params.url.as_str(), Some(ws_config), false).await?;
        debug!("WebSocket handshake successful: status {}", response.status());

        let (sink, source) = ws_stream.split();
        self.sink = Some(sink);
        self.source = Some(source);

        info!("WebSocket connection established.");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        debug!("Disconnecting WebSocket.");
        if let Some(mut sink) = self.sink.take() {
            match sink.send(TungsteniteMessage::Close(None)).await {
                Ok(_) => debug!("WebSocket Close frame sent."),
                Err(TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed) => {
                    debug!("WebSocket already closed while sending Close frame.")
                }
                Err(e) => warn!("Error sending WebSocket Close frame: {}. Closing anyway.", e),
            }
            if let Err(e) = sink.close().await {
                if !matches!(
                    e,
                    TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed
                ) {
                    warn!("Error closing WebSocket sink: {}", e);
                }
            }
        }
        self.source = None;
        Ok(())
    }

    async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| TransportError::NotConnected("WebSocket sink unavailable".into()))?;

        trace!("Sending WebSocket text: {}", message);
        sink.send(TungsteniteMessage::Text(message.to_string()))
            .await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Received, TransportError> {
        let Some(source) = self.source.as_mut() else {
            return Ok(Received::Closed(None));
        };

        loop {
            match source.next().await {
                Some(Ok(TungsteniteMessage::Text(text))) => return Ok(Received::Text(text)),
                Some(Ok(TungsteniteMessage::Binary(bin))) => {
                    warn!("Ignoring unexpected binary frame ({} bytes).", bin.len());
                }
                // Pongs are queued by tungstenite and flushed with the next write.
                Some(Ok(TungsteniteMessage::Ping(_) | TungsteniteMessage::Pong(_))) => {}
                Some(Ok(TungsteniteMessage::Frame(_))) => {
                    warn!("Ignoring unexpected raw frame.");
                }
                Some(Ok(TungsteniteMessage::Close(frame))) => {
                    info!("Received WebSocket Close frame: {:?}", frame);
                    let info = frame.map(|f| CloseInfo {
                        code: u16::from(f.code),
                        reason: f.reason.into_owned(),
                    });
                    self.source = None;
                    return Ok(Received::Closed(info));
                }
                Some(Err(TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed)) => {
                    self.source = None;
                    return Ok(Received::Closed(None));
                }
                Some(Err(e)) => {
                    self.source = None;
                    return Err(e.into());
                }
                None => {
                    debug!("WebSocket stream ended without a Close frame.");
                    self.source = None;
                    return Ok(Received::Closed(Some(CloseInfo::abnormal(
                        "stream ended without close frame",
                    ))));
                }
            }
        }
    }
}

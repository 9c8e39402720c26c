use crate::error::TransportError;
use crate::types::ConnectParams;
use async_trait::async_trait;

/// Close code and reason reported by the peer or the socket layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    /// RFC 6455 code used when a connection dropped without a close frame.
    pub const ABNORMAL: u16 = 1006;

    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: Self::ABNORMAL,
            reason: reason.into(),
        }
    }
}

/// One unit delivered by [`Transport::receive`].
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    /// A text frame.
    Text(String),
    /// The connection is closed. Further calls keep returning `Closed`.
    Closed(Option<CloseInfo>),
}

/// An abstract transport carrying text frames (JSON) over a network
/// connection.
///
/// Implementations handle the specifics of the wire protocol; the connection
/// actor only sees text in and text out.
#[async_trait]
pub trait Transport: Send + Unpin {
    /// Establishes the connection based on parameters provided during creation.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Closes the connection gracefully.
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Sends one text frame.
    async fn send(&mut self, message: &str) -> Result<(), TransportError>;

    /// Waits for the next text frame or the end of the connection.
    ///
    /// Control frames are handled internally and never surface here.
    async fn receive(&mut self) -> Result<Received, TransportError>;
}

/// Creates a fresh, unconnected transport for every connection attempt.
pub trait Connector: Send + Sync {
    fn create(&self, params: &ConnectParams) -> Result<Box<dyn Transport>, TransportError>;
}

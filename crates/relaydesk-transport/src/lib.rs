//! # Relaydesk Transport
//!
//! Keeps a live, self-healing connection to one chat room channel.
//!
//! The [`Transport`] trait abstracts the wire (WebSockets by default). The
//! [`Connection`] state machine decides when to connect, ping, retry and
//! give up; it performs no I/O itself. [`ConnectionActor`] drives the machine
//! inside the actor system and reports [`ConnectionEvent`]s to its owner.

pub mod backoff;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod factory;
pub mod frame;
pub mod machine;
pub mod traits;
pub mod types;
#[cfg(feature = "websocket")]
pub mod websocket;

// Re-export key items
pub use backoff::ReconnectPolicy;
pub use connection::{Close, ConnectionActor, ConnectionStatus, GetStatus, Open, SendFrame};
pub use endpoint::{CredentialSource, Endpoint, EndpointSource, RoomEndpoint, StaticEndpoint};
pub use error::TransportError;
pub use factory::{SchemeConnector, create_transport};
pub use frame::{InboundFrame, OutboundFrame};
pub use machine::{Connection, ConnectionEvent, ConnectionSettings, ConnectionState};
pub use traits::{CloseInfo, Connector, Received, Transport};
pub use types::ConnectParams;
#[cfg(feature = "websocket")]
pub use types::WebSocketConnectOptions;

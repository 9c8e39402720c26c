//! Addresses of chat channels.
//!
//! A connection asks its [`Endpoint`] for the wire address on every attempt,
//! so a credential that rotated between attempts is picked up by the next one.

use crate::error::TransportError;
use std::fmt;
use std::sync::Arc;

/// Produces the fully-formed address for one connection attempt.
pub trait EndpointSource: Send + Sync + fmt::Debug {
    fn endpoint_url(&self) -> Result<String, TransportError>;
}

/// Supplies the current bearer token.
pub trait CredentialSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Shared handle to an [`EndpointSource`].
#[derive(Clone, Debug)]
pub struct Endpoint(Arc<dyn EndpointSource>);

impl Endpoint {
    pub fn new(source: impl EndpointSource + 'static) -> Self {
        Self(Arc::new(source))
    }

    pub fn resolve(&self) -> Result<String, TransportError> {
        self.0.endpoint_url()
    }
}

/// A fixed address.
#[derive(Debug, Clone)]
pub struct StaticEndpoint(pub String);

impl EndpointSource for StaticEndpoint {
    fn endpoint_url(&self) -> Result<String, TransportError> {
        Ok(self.0.clone())
    }
}

impl From<String> for Endpoint {
    fn from(url: String) -> Self {
        Endpoint::new(StaticEndpoint(url))
    }
}

impl From<&str> for Endpoint {
    fn from(url: &str) -> Self {
        Endpoint::new(StaticEndpoint(url.to_string()))
    }
}

/// Builds `<ws|wss>://<host>/ws/chat/<room-slug>/?token=<url-encoded token>`.
pub fn room_endpoint_url(ws_base: &str, room_slug: &str, token: &str) -> Result<String, TransportError> {
    let base = ws_base.trim_end_matches('/');
    if !(base.starts_with("ws://") || base.starts_with("wss://")) {
        let scheme = base.split("://").next().unwrap_or_default();
        return Err(TransportError::UnsupportedScheme(scheme.to_string()));
    }
    if room_slug.is_empty() || room_slug.contains('/') {
        return Err(TransportError::InvalidUrl(format!(
            "invalid room slug '{}'",
            room_slug
        )));
    }
    if token.is_empty() {
        return Err(TransportError::MissingCredential(
            "empty bearer token".to_string(),
        ));
    }
    Ok(format!(
        "{}/ws/chat/{}/?token={}",
        base,
        room_slug,
        urlencoding::encode(token)
    ))
}

/// Strips the `token` query value so credentials do not end up in logs.
pub fn redact_url(url: &str) -> String {
    match url.split_once("token=") {
        Some((head, tail)) => {
            let rest = tail.find('&').map(|i| &tail[i..]).unwrap_or("");
            format!("{}token=***{}", head, rest)
        }
        None => url.to_string(),
    }
}

/// The live channel of one chat room, authenticated with the current token.
pub struct RoomEndpoint {
    ws_base: String,
    room_slug: String,
    credentials: Arc<dyn CredentialSource>,
}

impl RoomEndpoint {
    pub fn new(
        ws_base: impl Into<String>,
        room_slug: impl Into<String>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            ws_base: ws_base.into(),
            room_slug: room_slug.into(),
            credentials,
        }
    }
}

impl fmt::Debug for RoomEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomEndpoint")
            .field("ws_base", &self.ws_base)
            .field("room_slug", &self.room_slug)
            .finish_non_exhaustive()
    }
}

impl EndpointSource for RoomEndpoint {
    fn endpoint_url(&self) -> Result<String, TransportError> {
        let token = self.credentials.bearer_token().ok_or_else(|| {
            TransportError::MissingCredential("no access token available".to_string())
        })?;
        room_endpoint_url(&self.ws_base, &self.room_slug, &token)
    }
}

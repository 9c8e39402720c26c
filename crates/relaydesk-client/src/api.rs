//! REST access to the RelayDesk server.
//!
//! Authenticated calls carry `Authorization: Bearer <access>`. A 401 answer
//! triggers one token refresh and one retry; concurrent 401s share a single
//! in-flight refresh through [`RefreshGate`].

use crate::error::ApiError;
use crate::models::{AuthTokens, Message, Room, User};
use crate::storage::TokenStore;
use log::{debug, error, info, warn};
use relaydesk_core::ServerConfig;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Serialize, Debug, Clone)]
struct NewRoom<'a> {
    name: &'a str,
    description: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

/// Serialises token refreshes.
///
/// The first caller whose token was rejected runs the refresh; callers that
/// queued behind it find a different token in the store and reuse it.
#[derive(Debug, Default)]
pub struct RefreshGate {
    lock: Mutex<()>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh<F, Fut>(
        &self,
        rejected: &str,
        current: impl Fn() -> Option<String>,
        refresh: F,
    ) -> Result<String, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ApiError>>,
    {
        let _guard = self.lock.lock().await;
        if let Some(token) = current().filter(|token| token != rejected) {
            debug!("Access token already refreshed by a concurrent request");
            return Ok(token);
        }
        refresh().await
    }
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    refresh_gate: RefreshGate,
}

impl ApiClient {
    pub fn new(server: &ServerConfig, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(server.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: server.api_base().to_string(),
            store,
            refresh_gate: RefreshGate::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Logs in and stores both tokens.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self
            .http
            .post(self.url("/api/auth/login/"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        let login: LoginResponse = decode(response).await?;
        self.store.set_tokens(&AuthTokens {
            access: login.access.clone(),
            refresh: login.refresh.clone(),
        })?;
        info!("Logged in as {}", username);
        Ok(login)
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.store.clear_tokens()?;
        info!("Logged out, tokens cleared");
        Ok(())
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        let url = self.url("/api/auth/me/");
        self.send_authorized(|http| http.get(&url)).await
    }

    pub async fn rooms(&self) -> Result<Vec<Room>, ApiError> {
        let url = self.url("/api/rooms/");
        let body: Value = self.send_authorized(|http| http.get(&url)).await?;
        decode_list(body)
    }

    pub async fn create_room(&self, name: &str, description: Option<&str>) -> Result<Room, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidInput("Room name is required".to_string()));
        }
        let body = NewRoom {
            name,
            description: description.map(str::trim).filter(|d| !d.is_empty()),
        };
        let url = self.url("/api/rooms/");
        self.send_authorized(|http| http.post(&url).json(&body)).await
    }

    pub async fn room(&self, slug: &str) -> Result<Room, ApiError> {
        let url = self.url(&format!("/api/rooms/{}/", slug));
        self.send_authorized(|http| http.get(&url)).await
    }

    pub async fn room_messages(&self, slug: &str) -> Result<Vec<Message>, ApiError> {
        let url = self.url(&format!("/api/rooms/{}/messages/", slug));
        let body: Value = self.send_authorized(|http| http.get(&url)).await?;
        decode_list(body)
    }

    async fn send_authorized<T, B>(&self, build: B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Fn(&Client) -> RequestBuilder,
    {
        let token = self.store.access_token().ok_or(ApiError::NotAuthenticated)?;
        let response = build(&self.http).bearer_auth(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return decode(response).await;
        }

        debug!("Request rejected with 401, refreshing access token");
        let fresh = self.refresh_access(&token).await?;
        let response = build(&self.http).bearer_auth(&fresh).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Request still unauthorized after token refresh");
            return Err(ApiError::Unauthorized);
        }
        decode(response).await
    }

    async fn refresh_access(&self, rejected: &str) -> Result<String, ApiError> {
        self.refresh_gate
            .refresh(
                rejected,
                || self.store.access_token(),
                move || async move {
                    match self.request_refresh().await {
                        Ok(access) => Ok(access),
                        Err(e) => {
                            warn!("Token refresh failed: {}", e);
                            if let Err(e) = self.store.clear_tokens() {
                                error!("Failed to clear tokens after refresh failure: {}", e);
                            }
                            Err(ApiError::SessionExpired)
                        }
                    }
                },
            )
            .await
    }

    async fn request_refresh(&self) -> Result<String, ApiError> {
        let refresh = self.store.refresh_token().ok_or(ApiError::NotAuthenticated)?;
        let response = self
            .http
            .post(self.url("/api/auth/refresh/"))
            .json(&json!({ "refresh": refresh }))
            .send()
            .await?;
        let refreshed: RefreshResponse = decode(response).await?;
        match &refreshed.refresh {
            Some(rotated) => self.store.set_tokens(&AuthTokens {
                access: refreshed.access.clone(),
                refresh: rotated.clone(),
            })?,
            None => self.store.set_access_token(&refreshed.access)?,
        }
        info!("Access token refreshed");
        Ok(refreshed.access)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: error_detail(&body),
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// The `detail` field of a JSON error body, or the body itself.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Accepts a bare array or a paginated `{"results": [...]}` object. Any
/// other shape is an empty list.
fn decode_list<T: DeserializeOwned>(body: Value) -> Result<Vec<T>, ApiError> {
    let items = match body {
        Value::Array(_) => body,
        Value::Object(mut map) => match map.remove("results") {
            Some(results @ Value::Array(_)) => results,
            _ => {
                debug!("List response without results, treating as empty");
                return Ok(Vec::new());
            }
        },
        _ => return Ok(Vec::new()),
    };
    serde_json::from_value(items).map_err(|e| ApiError::Decode(e.to_string()))
}

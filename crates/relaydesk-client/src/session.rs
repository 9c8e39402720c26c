//! Joining and leaving a chat room.

use crate::api::ApiClient;
use crate::error::{ApiError, ClientError};
use crate::models::{Message, Room, User};
use crate::room::{ChatRoomActor, LeaveRoom, LoadHistory, RoomUpdate};
use actix::prelude::*;
use log::{info, warn};
use relaydesk_core::Config;
use relaydesk_transport::{
    Close, ConnectionActor, CredentialSource, Endpoint, Open, RoomEndpoint,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A joined room: its details, the room actor and the live connection.
pub struct RoomSession {
    pub room: Room,
    pub user: User,
    pub history: Vec<Message>,
    pub room_actor: Addr<ChatRoomActor>,
    connection: Addr<ConnectionActor>,
}

impl RoomSession {
    /// Loads the room and its history, then connects to its live channel.
    ///
    /// Any failure to load the room is reported as
    /// [`ClientError::RoomUnavailable`]; the caller can go back to the room
    /// list. Not being logged in is reported as such.
    pub async fn join(
        config: &Config,
        api: &ApiClient,
        credentials: Arc<dyn CredentialSource>,
        slug: &str,
        observer: Option<mpsc::UnboundedSender<RoomUpdate>>,
    ) -> Result<Self, ClientError> {
        if credentials.bearer_token().is_none() {
            return Err(ApiError::NotAuthenticated.into());
        }

        let (user, room, history) =
            tokio::try_join!(api.me(), api.room(slug), api.room_messages(slug)).map_err(
                |e| match e {
                    ApiError::NotAuthenticated | ApiError::SessionExpired => ClientError::Api(e),
                    other => {
                        warn!("Failed to load room '{}': {}", slug, other);
                        ClientError::RoomUnavailable {
                            slug: slug.to_string(),
                            reason: other.to_string(),
                        }
                    }
                },
            )?;
        info!(
            "Loaded room '{}' with {} messages for {}",
            room.slug,
            history.len(),
            user.username
        );

        // The room actor and its connection address each other, so the room's
        // context is created before either actor starts.
        let room_ctx = Context::<ChatRoomActor>::new();
        let connection =
            ConnectionActor::from_config(&config.transport, room_ctx.address().recipient()).start();
        let room_actor = room_ctx.run(ChatRoomActor::new(
            room.slug.clone(),
            connection.clone().recipient(),
            connection.clone().recipient(),
            observer,
        ));

        room_actor.do_send(LoadHistory(history.clone()));
        let endpoint = RoomEndpoint::new(config.server.ws_base(), room.slug.clone(), credentials);
        connection.do_send(Open(Endpoint::new(endpoint)));

        Ok(Self {
            room,
            user,
            history,
            room_actor,
            connection,
        })
    }

    /// Closes the connection and stops the room actor.
    pub async fn leave(self) -> Result<(), ClientError> {
        info!("Leaving room '{}'", self.room.slug);
        self.connection.send(Close).await?;
        self.room_actor.send(LeaveRoom).await?;
        Ok(())
    }
}

// crates/relaydesk-client/tests/chat_room_tests.rs
#[cfg(test)]
mod tests {
    use actix::prelude::*;
    use relaydesk_client::{
        ChatRoomActor, ClientError, DismissNotification, GetRoomSnapshot, LeaveRoom, LoadHistory,
        Message, NotificationLevel, RoomUpdate, SubmitMessage,
    };
    use relaydesk_transport::{Close, ConnectionEvent, ConnectionState, OutboundFrame, SendFrame};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;

    // --- MockConnectionActor Definition ---
    #[derive(Default, Debug, Clone)]
    struct MockConnectionState {
        frames: Vec<OutboundFrame>,
        closed: usize,
    }

    struct MockConnectionActor {
        state: Arc<Mutex<MockConnectionState>>,
    }

    impl Actor for MockConnectionActor {
        type Context = Context<Self>;
    }

    impl Handler<SendFrame> for MockConnectionActor {
        type Result = ();

        fn handle(&mut self, msg: SendFrame, _ctx: &mut Context<Self>) {
            self.state.lock().unwrap().frames.push(msg.0);
        }
    }

    impl Handler<Close> for MockConnectionActor {
        type Result = ();

        fn handle(&mut self, _msg: Close, _ctx: &mut Context<Self>) {
            self.state.lock().unwrap().closed += 1;
        }
    }

    struct Harness {
        room: Addr<ChatRoomActor>,
        connection: Arc<Mutex<MockConnectionState>>,
        updates: mpsc::UnboundedReceiver<RoomUpdate>,
    }

    fn start_room() -> Harness {
        let connection = Arc::new(Mutex::new(MockConnectionState::default()));
        let mock = MockConnectionActor {
            state: connection.clone(),
        }
        .start();
        let (tx, updates) = mpsc::unbounded_channel();
        let room = ChatRoomActor::new(
            "general",
            mock.clone().recipient(),
            mock.recipient(),
            Some(tx),
        )
        .start();
        Harness {
            room,
            connection,
            updates,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    fn message(id: &str, content: &str) -> Message {
        Message::from_value(json!({"id": id, "content": content, "username": "alice"})).unwrap()
    }

    // --- Tests ---

    #[actix_rt::test]
    async fn submit_sends_trimmed_chat_message_when_connected() {
        let harness = start_room();
        harness
            .room
            .send(ConnectionEvent::StateChanged(ConnectionState::Connected))
            .await
            .unwrap();

        let result = harness
            .room
            .send(SubmitMessage("  hello there  ".to_string()))
            .await
            .unwrap();
        assert!(result.is_ok());
        settle().await;

        let frames = harness.connection.lock().unwrap().frames.clone();
        assert_eq!(frames, vec![OutboundFrame::chat_message("hello there")]);
    }

    #[actix_rt::test]
    async fn submit_is_rejected_when_empty_or_offline() {
        let harness = start_room();

        let offline = harness
            .room
            .send(SubmitMessage("hello".to_string()))
            .await
            .unwrap();
        assert!(matches!(offline, Err(ClientError::NotConnected)));

        harness
            .room
            .send(ConnectionEvent::StateChanged(ConnectionState::Connected))
            .await
            .unwrap();
        let empty = harness
            .room
            .send(SubmitMessage(" \t ".to_string()))
            .await
            .unwrap();
        assert!(matches!(empty, Err(ClientError::EmptyMessage)));

        harness
            .room
            .send(ConnectionEvent::StateChanged(ConnectionState::Reconnecting))
            .await
            .unwrap();
        let reconnecting = harness
            .room
            .send(SubmitMessage("hello".to_string()))
            .await
            .unwrap();
        assert!(matches!(reconnecting, Err(ClientError::NotConnected)));

        settle().await;
        assert!(harness.connection.lock().unwrap().frames.is_empty());
    }

    #[actix_rt::test]
    async fn history_then_live_messages_in_order() {
        let mut harness = start_room();
        harness
            .room
            .send(LoadHistory(vec![message("1", "first"), message("2", "second")]))
            .await
            .unwrap();
        for (id, content) in [("3", "third"), ("3", "third again"), ("4", "fourth")] {
            harness
                .room
                .send(ConnectionEvent::ChatMessage(json!({"id": id, "content": content})))
                .await
                .unwrap();
        }

        let snapshot = harness.room.send(GetRoomSnapshot).await.unwrap();
        let contents: Vec<&str> = snapshot.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["first", "second", "third", "third again", "fourth"]
        );
        assert_eq!(snapshot.room_slug, "general");

        assert_eq!(
            harness.updates.recv().await,
            Some(RoomUpdate::HistoryLoaded { count: 2 })
        );
        match harness.updates.recv().await {
            Some(RoomUpdate::MessageAppended(m)) => assert_eq!(m.content, "third"),
            other => panic!("unexpected update {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn server_errors_surface_as_dismissible_notifications() {
        let mut harness = start_room();
        harness
            .room
            .send(ConnectionEvent::ServerError("Rate limited".to_string()))
            .await
            .unwrap();

        let Some(RoomUpdate::Notified(notification)) = harness.updates.recv().await else {
            panic!("expected a notification update");
        };
        assert_eq!(notification.level, NotificationLevel::Error);
        assert_eq!(notification.message, "Rate limited");

        let dismissed = harness
            .room
            .send(DismissNotification(notification.id.clone()))
            .await
            .unwrap();
        assert!(dismissed);
        assert_eq!(
            harness.updates.recv().await,
            Some(RoomUpdate::NotificationDismissed(notification.id.clone()))
        );
        let snapshot = harness.room.send(GetRoomSnapshot).await.unwrap();
        assert!(snapshot.notifications.is_empty());
    }

    #[actix_rt::test]
    async fn connection_state_is_mirrored() {
        let mut harness = start_room();
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
        ] {
            harness
                .room
                .send(ConnectionEvent::StateChanged(state))
                .await
                .unwrap();
        }
        harness
            .room
            .send(ConnectionEvent::RetryScheduled {
                attempt: 1,
                delay: Duration::from_secs(1),
            })
            .await
            .unwrap();

        let snapshot = harness.room.send(GetRoomSnapshot).await.unwrap();
        assert_eq!(snapshot.connection, ConnectionState::Disconnected);

        let mut updates = Vec::new();
        while let Ok(update) = harness.updates.try_recv() {
            updates.push(update);
        }
        assert_eq!(
            updates,
            vec![
                RoomUpdate::ConnectionChanged(ConnectionState::Connecting),
                RoomUpdate::ConnectionChanged(ConnectionState::Connected),
                RoomUpdate::ConnectionChanged(ConnectionState::Disconnected),
                RoomUpdate::Reconnecting {
                    attempt: 1,
                    delay: Duration::from_secs(1)
                },
            ]
        );
    }

    #[actix_rt::test]
    async fn leaving_closes_the_connection() {
        let harness = start_room();
        harness.room.send(LeaveRoom).await.unwrap();
        settle().await;

        assert_eq!(harness.connection.lock().unwrap().closed, 1);
        assert!(!harness.room.connected());
    }
}

// crates/relaydesk-transport/tests/connection_actor_tests.rs
#[cfg(test)]
mod tests {
    use actix::prelude::*;
    use async_trait::async_trait;
    use relaydesk_transport::{
        Close, CloseInfo, ConnectParams, ConnectionActor, ConnectionEvent, ConnectionSettings,
        ConnectionState, Connector, GetStatus, Open, OutboundFrame, Received, ReconnectPolicy,
        SendFrame, Transport, TransportError,
    };
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;

    const URL: &str = "ws://chat.test/ws/chat/general/?token=abc";

    // --- Mock transport ---

    #[derive(Debug, Clone, Copy)]
    enum Behavior {
        Accept,
        Refuse,
        /// Accepts, but the close handshake hangs.
        SlowClose,
    }

    /// Test-side handle to one socket the connector created.
    struct SocketProbe {
        url: String,
        inbound_tx: mpsc::UnboundedSender<Received>,
        sent: Arc<Mutex<Vec<String>>>,
        disconnected: Arc<AtomicBool>,
    }

    impl SocketProbe {
        fn push_text(&self, text: &str) {
            self.inbound_tx
                .send(Received::Text(text.to_string()))
                .unwrap();
        }

        fn drop_connection(&self) {
            self.inbound_tx
                .send(Received::Closed(Some(CloseInfo::abnormal("network lost"))))
                .unwrap();
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[derive(Default)]
    struct Wire {
        probes: Mutex<Vec<SocketProbe>>,
        script: Mutex<VecDeque<Behavior>>,
    }

    impl Wire {
        fn with_script(script: &[Behavior]) -> Arc<Self> {
            let wire = Self::default();
            wire.script.lock().unwrap().extend(script.iter().copied());
            Arc::new(wire)
        }

        fn sockets_created(&self) -> usize {
            self.probes.lock().unwrap().len()
        }

        fn with_probe<R>(&self, index: usize, f: impl FnOnce(&SocketProbe) -> R) -> R {
            f(&self.probes.lock().unwrap()[index])
        }
    }

    struct MockConnector(Arc<Wire>);

    impl Connector for MockConnector {
        fn create(&self, params: &ConnectParams) -> Result<Box<dyn Transport>, TransportError> {
            let behavior = self
                .0
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Behavior::Accept);
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            let sent = Arc::new(Mutex::new(Vec::new()));
            let disconnected = Arc::new(AtomicBool::new(false));
            self.0.probes.lock().unwrap().push(SocketProbe {
                url: params.url.clone(),
                inbound_tx,
                sent: sent.clone(),
                disconnected: disconnected.clone(),
            });
            Ok(Box::new(MockTransport {
                behavior,
                inbound_rx,
                sent,
                disconnected,
            }))
        }
    }

    struct MockTransport {
        behavior: Behavior,
        inbound_rx: mpsc::UnboundedReceiver<Received>,
        sent: Arc<Mutex<Vec<String>>>,
        disconnected: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            match self.behavior {
                Behavior::Accept | Behavior::SlowClose => Ok(()),
                Behavior::Refuse => Err(TransportError::ConnectionFailed(
                    "connection refused".to_string(),
                )),
            }
        }

        async fn disconnect(&mut self) -> Result<(), TransportError> {
            if let Behavior::SlowClose = self.behavior {
                tokio::time::sleep(Duration::from_secs(15)).await;
            }
            self.disconnected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn send(&mut self, message: &str) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }

        async fn receive(&mut self) -> Result<Received, TransportError> {
            Ok(self
                .inbound_rx
                .recv()
                .await
                .unwrap_or(Received::Closed(None)))
        }
    }

    // --- Event recorder ---

    struct Recorder(Arc<Mutex<Vec<ConnectionEvent>>>);

    impl Actor for Recorder {
        type Context = Context<Self>;
    }

    impl Handler<ConnectionEvent> for Recorder {
        type Result = ();

        fn handle(&mut self, msg: ConnectionEvent, _ctx: &mut Context<Self>) {
            self.0.lock().unwrap().push(msg);
        }
    }

    type Events = Arc<Mutex<Vec<ConnectionEvent>>>;

    fn start_connection(
        wire: &Arc<Wire>,
        settings: ConnectionSettings,
    ) -> (Addr<ConnectionActor>, Events) {
        let events = Events::default();
        let owner = Recorder(events.clone()).start().recipient();
        let actor = ConnectionActor::new(
            settings,
            ConnectParams::new(URL),
            Arc::new(MockConnector(wire.clone())),
            owner,
        )
        .start();
        (actor, events)
    }

    /// Lets every ready task run; the paused clock only moves once all are idle.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn states(events: &Events) -> Vec<ConnectionState> {
        events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ConnectionEvent::StateChanged(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    fn join_frame() -> String {
        OutboundFrame::join("Client joined the room").to_json().unwrap()
    }

    // --- Tests ---

    #[actix_rt::test]
    async fn opens_once_and_sends_join() {
        tokio::time::pause();
        let wire = Wire::with_script(&[]);
        let (conn, events) = start_connection(&wire, ConnectionSettings::default());

        conn.send(Open(URL.into())).await.unwrap();
        conn.send(Open(URL.into())).await.unwrap();
        settle().await;

        let status = conn.send(GetStatus).await.unwrap();
        assert_eq!(status.state, ConnectionState::Connected);
        assert_eq!(status.attempt_count, 0);
        assert_eq!(wire.sockets_created(), 1, "second open must not create a socket");
        wire.with_probe(0, |probe| {
            assert_eq!(probe.url, URL);
            assert_eq!(probe.sent(), vec![join_frame()]);
        });
        assert_eq!(
            states(&events),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
    }

    #[actix_rt::test]
    async fn relays_chat_messages_in_order_and_skips_garbage() {
        tokio::time::pause();
        let wire = Wire::with_script(&[]);
        let (conn, events) = start_connection(&wire, ConnectionSettings::default());
        conn.send(Open(URL.into())).await.unwrap();
        settle().await;

        wire.with_probe(0, |probe| {
            probe.push_text(r#"{"type":"chat_message","message":{"id":"1","content":"first"}}"#);
            probe.push_text("not json");
            probe.push_text(r#"{"type":"user_joined","username":"bob"}"#);
            probe.push_text(r#"{"type":"error","message":"Rate limited"}"#);
            probe.push_text(r#"{"type":"chat_message","message":{"id":"2","content":"second"}}"#);
        });
        settle().await;

        let relayed: Vec<ConnectionEvent> = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !matches!(e, ConnectionEvent::StateChanged(_)))
            .cloned()
            .collect();
        assert_eq!(
            relayed,
            vec![
                ConnectionEvent::ChatMessage(json!({"id":"1","content":"first"})),
                ConnectionEvent::ServerError("Rate limited".to_string()),
                ConnectionEvent::ChatMessage(json!({"id":"2","content":"second"})),
            ]
        );
        let status = conn.send(GetStatus).await.unwrap();
        assert_eq!(status.state, ConnectionState::Connected);
    }

    #[actix_rt::test]
    async fn outbound_frames_reach_the_socket() {
        tokio::time::pause();
        let wire = Wire::with_script(&[]);
        let (conn, _events) = start_connection(&wire, ConnectionSettings::default());

        // Dropped: nothing is open yet.
        conn.send(SendFrame(OutboundFrame::chat_message("too early")))
            .await
            .unwrap();
        conn.send(Open(URL.into())).await.unwrap();
        settle().await;
        conn.send(SendFrame(OutboundFrame::chat_message("hello")))
            .await
            .unwrap();
        settle().await;

        wire.with_probe(0, |probe| {
            assert_eq!(
                probe.sent(),
                vec![
                    join_frame(),
                    r#"{"type":"chat_message","message":"hello"}"#.to_string()
                ]
            );
        });
    }

    #[actix_rt::test]
    async fn heartbeat_pings_only_while_connected() {
        tokio::time::pause();
        let wire = Wire::with_script(&[Behavior::Accept, Behavior::Refuse, Behavior::Refuse]);
        let (conn, _events) = start_connection(&wire, ConnectionSettings::default());
        conn.send(Open(URL.into())).await.unwrap();
        settle().await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        let ping = OutboundFrame::Ping.to_json().unwrap();
        wire.with_probe(0, |probe| {
            assert_eq!(probe.sent(), vec![join_frame(), ping.clone(), ping.clone()]);
            probe.drop_connection();
        });
        settle().await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        wire.with_probe(0, |probe| {
            assert_eq!(probe.sent().len(), 3, "no pings after the socket dropped");
        });
    }

    #[actix_rt::test]
    async fn reconnects_after_the_backoff_delay() {
        tokio::time::pause();
        let wire = Wire::with_script(&[]);
        let (conn, events) = start_connection(&wire, ConnectionSettings::default());
        conn.send(Open(URL.into())).await.unwrap();
        settle().await;

        wire.with_probe(0, |probe| probe.drop_connection());
        settle().await;
        assert_eq!(
            conn.send(GetStatus).await.unwrap().state,
            ConnectionState::Reconnecting
        );
        assert!(events.lock().unwrap().contains(&ConnectionEvent::RetryScheduled {
            attempt: 1,
            delay: Duration::from_secs(1),
        }));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(wire.sockets_created(), 1, "retry fired before its delay");

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(wire.sockets_created(), 2);
        let status = conn.send(GetStatus).await.unwrap();
        assert_eq!(status.state, ConnectionState::Connected);
        assert_eq!(status.attempt_count, 0);
        wire.with_probe(1, |probe| assert_eq!(probe.sent(), vec![join_frame()]));
        assert_eq!(
            states(&events),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected,
                ConnectionState::Reconnecting,
                ConnectionState::Connecting,
                ConnectionState::Connected,
            ]
        );
    }

    #[actix_rt::test]
    async fn close_cancels_a_pending_retry() {
        tokio::time::pause();
        let wire = Wire::with_script(&[]);
        let (conn, events) = start_connection(&wire, ConnectionSettings::default());
        conn.send(Open(URL.into())).await.unwrap();
        settle().await;
        wire.with_probe(0, |probe| probe.drop_connection());
        settle().await;

        conn.send(Close).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(wire.sockets_created(), 1);
        assert_eq!(
            conn.send(GetStatus).await.unwrap().state,
            ConnectionState::Closed
        );
        assert_eq!(states(&events).last(), Some(&ConnectionState::Closed));

        // Closed is final.
        conn.send(Open(URL.into())).await.unwrap();
        settle().await;
        assert_eq!(wire.sockets_created(), 1);
    }

    #[actix_rt::test]
    async fn close_shuts_an_open_socket_down() {
        tokio::time::pause();
        let wire = Wire::with_script(&[]);
        let (conn, _events) = start_connection(&wire, ConnectionSettings::default());
        conn.send(Open(URL.into())).await.unwrap();
        settle().await;

        conn.send(Close).await.unwrap();
        settle().await;

        wire.with_probe(0, |probe| {
            assert!(probe.disconnected.load(Ordering::SeqCst));
        });
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(wire.sockets_created(), 1);
    }

    #[actix_rt::test]
    async fn gives_up_when_the_retry_budget_is_spent() {
        tokio::time::pause();
        let wire = Wire::with_script(&[Behavior::Refuse; 3]);
        let settings = ConnectionSettings {
            policy: ReconnectPolicy::Fixed {
                delay: Duration::from_secs(2),
                max_attempts: Some(2),
            },
            ..ConnectionSettings::default()
        };
        let (conn, events) = start_connection(&wire, settings);
        conn.send(Open(URL.into())).await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(wire.sockets_created(), 3, "initial attempt plus two retries");
        let status = conn.send(GetStatus).await.unwrap();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert!(events
            .lock()
            .unwrap()
            .contains(&ConnectionEvent::ConnectionLost { attempts: 2 }));

        // A fresh open after giving up starts over.
        conn.send(Open(URL.into())).await.unwrap();
        settle().await;
        assert_eq!(wire.sockets_created(), 4);
        assert_eq!(
            conn.send(GetStatus).await.unwrap().state,
            ConnectionState::Connected
        );
    }

    #[actix_rt::test]
    async fn peer_drop_is_reported_before_a_slow_close_finishes() {
        tokio::time::pause();
        let wire = Wire::with_script(&[Behavior::SlowClose]);
        let (conn, events) = start_connection(&wire, ConnectionSettings::default());
        conn.send(Open(URL.into())).await.unwrap();
        settle().await;

        wire.with_probe(0, |probe| probe.drop_connection());
        settle().await;

        assert_eq!(
            conn.send(GetStatus).await.unwrap().state,
            ConnectionState::Reconnecting
        );
        assert_eq!(
            states(&events),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected,
                ConnectionState::Reconnecting,
            ]
        );
        wire.with_probe(0, |probe| {
            assert!(!probe.disconnected.load(Ordering::SeqCst));
        });

        // The retry does not wait for the stalled close.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(wire.sockets_created(), 2);
        assert_eq!(
            conn.send(GetStatus).await.unwrap().state,
            ConnectionState::Connected
        );
    }
}

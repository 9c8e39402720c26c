//! The connection state machine.
//!
//! `Connection` holds no sockets and no timers. Callers feed it commands
//! (`open`, `send`, `close`) and observations (`handle`), and it answers with
//! the [`Action`]s to perform. Every socket and timer it asks for carries a
//! fresh id; inputs naming an id the current phase does not own are stale and
//! ignored, which is what keeps a late timer from reviving a closed
//! connection.

use crate::backoff::ReconnectPolicy;
use crate::endpoint::Endpoint;
use crate::frame::{InboundFrame, OutboundFrame};
use crate::traits::CloseInfo;
use log::{debug, info, trace, warn};
use relaydesk_core::TransportConfig;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Externally visible connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
    Closed,
}

/// Events delivered to the owner of a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    /// Reconnect attempt `attempt` will start after `delay`.
    RetryScheduled { attempt: u32, delay: Duration },
    /// Payload of an inbound `chat_message` frame, untouched.
    ChatMessage(Value),
    /// Text of an inbound `error` frame.
    ServerError(String),
    /// The reconnect budget is spent; the connection stays Disconnected.
    ConnectionLost { attempts: u32 },
}

/// Side effects requested by the state machine, to be executed in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    OpenSocket { socket: SocketId, url: String },
    CloseSocket { socket: SocketId },
    Send { socket: SocketId, frame: OutboundFrame },
    StartHeartbeat { timer: TimerId, every: Duration },
    ScheduleRetry { timer: TimerId, after: Duration },
    CancelTimer { timer: TimerId },
    Emit(ConnectionEvent),
}

/// Observations reported back by whoever executes the actions.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    SocketOpened { socket: SocketId },
    SocketText { socket: SocketId, text: String },
    SocketClosed { socket: SocketId, close: Option<CloseInfo> },
    HeartbeatTick { timer: TimerId },
    RetryElapsed { timer: TimerId },
}

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub policy: ReconnectPolicy,
    pub heartbeat_interval: Duration,
    pub join_message: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

impl From<&TransportConfig> for ConnectionSettings {
    fn from(cfg: &TransportConfig) -> Self {
        Self {
            policy: ReconnectPolicy::from(&cfg.reconnect),
            heartbeat_interval: cfg.heartbeat_interval,
            join_message: cfg.join_message.clone(),
        }
    }
}

// Each variant owns exactly the resources valid in that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Connecting { socket: SocketId },
    Connected { socket: SocketId, heartbeat: TimerId },
    Reconnecting { retry: TimerId },
    Disconnected,
    Closed,
}

#[derive(Debug)]
pub struct Connection {
    settings: ConnectionSettings,
    phase: Phase,
    endpoint: Option<Endpoint>,
    attempt_count: u32,
    next_id: u64,
}

impl Connection {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            phase: Phase::Idle,
            endpoint: None,
            attempt_count: 0,
            next_id: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.phase {
            Phase::Idle => ConnectionState::Idle,
            Phase::Connecting { .. } => ConnectionState::Connecting,
            Phase::Connected { .. } => ConnectionState::Connected,
            Phase::Reconnecting { .. } => ConnectionState::Reconnecting,
            Phase::Disconnected => ConnectionState::Disconnected,
            Phase::Closed => ConnectionState::Closed,
        }
    }

    /// Reconnect attempts since the last successful open.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// True once `close` was called; nothing reconnects after that.
    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    /// The socket the current phase owns, if any.
    pub fn active_socket(&self) -> Option<SocketId> {
        match self.phase {
            Phase::Connecting { socket } | Phase::Connected { socket, .. } => Some(socket),
            _ => None,
        }
    }

    /// Starts connecting to `endpoint`.
    ///
    /// A no-op while Connecting or Connected, and after `close`. A pending
    /// retry is cancelled and replaced by an immediate attempt.
    pub fn open(&mut self, endpoint: Endpoint) -> Vec<Action> {
        let mut actions = Vec::new();
        match self.phase {
            Phase::Connecting { .. } | Phase::Connected { .. } => {
                debug!("open() ignored: connection already {:?}", self.state());
                return actions;
            }
            Phase::Closed => {
                warn!("open() ignored: connection was closed and cannot be reused");
                return actions;
            }
            Phase::Reconnecting { retry } => {
                actions.push(Action::CancelTimer { timer: retry });
            }
            Phase::Disconnected => {
                self.attempt_count = 0;
            }
            Phase::Idle => {}
        }

        self.endpoint = Some(endpoint);
        self.begin_attempt(&mut actions);
        actions
    }

    /// Queues `frame` if a socket is open; otherwise drops it.
    pub fn send(&mut self, frame: OutboundFrame) -> Vec<Action> {
        match self.phase {
            Phase::Connected { socket, .. } => vec![Action::Send { socket, frame }],
            _ => {
                debug!(
                    "Dropping outbound '{}' frame while {:?}",
                    frame.kind(),
                    self.state()
                );
                Vec::new()
            }
        }
    }

    /// Caller-initiated, permanent shutdown.
    pub fn close(&mut self) -> Vec<Action> {
        let previous = std::mem::replace(&mut self.phase, Phase::Closed);
        let mut actions = Vec::new();
        match previous {
            Phase::Closed => return actions,
            Phase::Connected { socket, heartbeat } => {
                actions.push(Action::CancelTimer { timer: heartbeat });
                actions.push(Action::CloseSocket { socket });
            }
            Phase::Connecting { socket } => actions.push(Action::CloseSocket { socket }),
            Phase::Reconnecting { retry } => actions.push(Action::CancelTimer { timer: retry }),
            Phase::Idle | Phase::Disconnected => {}
        }
        info!("Connection closed by owner");
        actions.push(Action::Emit(ConnectionEvent::StateChanged(
            ConnectionState::Closed,
        )));
        actions
    }

    pub fn handle(&mut self, input: Input) -> Vec<Action> {
        let mut actions = Vec::new();
        match input {
            Input::SocketOpened { socket } => self.on_socket_opened(socket, &mut actions),
            Input::SocketText { socket, text } => self.on_socket_text(socket, &text, &mut actions),
            Input::SocketClosed { socket, close } => {
                self.on_socket_closed(socket, close, &mut actions)
            }
            Input::HeartbeatTick { timer } => match self.phase {
                Phase::Connected { socket, heartbeat } if heartbeat == timer => {
                    trace!("Heartbeat tick, sending ping");
                    actions.push(Action::Send {
                        socket,
                        frame: OutboundFrame::Ping,
                    });
                }
                _ => {
                    debug!("Stale heartbeat tick {:?} ignored", timer);
                    actions.push(Action::CancelTimer { timer });
                }
            },
            Input::RetryElapsed { timer } => match self.phase {
                Phase::Reconnecting { retry } if retry == timer => {
                    info!("Reconnect attempt {} starting", self.attempt_count);
                    self.begin_attempt(&mut actions);
                }
                _ => debug!("Stale retry timer {:?} ignored", timer),
            },
        }
        actions
    }

    fn next_socket(&mut self) -> SocketId {
        self.next_id += 1;
        SocketId(self.next_id)
    }

    fn next_timer(&mut self) -> TimerId {
        self.next_id += 1;
        TimerId(self.next_id)
    }

    fn begin_attempt(&mut self, actions: &mut Vec<Action>) {
        let socket = self.next_socket();
        self.phase = Phase::Connecting { socket };
        actions.push(Action::Emit(ConnectionEvent::StateChanged(
            ConnectionState::Connecting,
        )));

        let resolved = match &self.endpoint {
            Some(endpoint) => endpoint.resolve(),
            None => Err(crate::error::TransportError::InvalidUrl(
                "no endpoint configured".to_string(),
            )),
        };
        match resolved {
            Ok(url) => actions.push(Action::OpenSocket { socket, url }),
            Err(e) => {
                warn!("Cannot build connection address: {}", e);
                self.on_socket_closed(socket, Some(CloseInfo::abnormal(e.to_string())), actions);
            }
        }
    }

    fn on_socket_opened(&mut self, socket: SocketId, actions: &mut Vec<Action>) {
        match self.phase {
            Phase::Connecting { socket: current } if current == socket => {
                let heartbeat = self.next_timer();
                self.phase = Phase::Connected { socket, heartbeat };
                self.attempt_count = 0;
                info!("Connection established");
                actions.push(Action::Emit(ConnectionEvent::StateChanged(
                    ConnectionState::Connected,
                )));
                actions.push(Action::Send {
                    socket,
                    frame: OutboundFrame::join(self.settings.join_message.clone()),
                });
                actions.push(Action::StartHeartbeat {
                    timer: heartbeat,
                    every: self.settings.heartbeat_interval,
                });
            }
            _ => {
                debug!("Stale socket {:?} opened, closing it", socket);
                actions.push(Action::CloseSocket { socket });
            }
        }
    }

    fn on_socket_text(&mut self, socket: SocketId, text: &str, actions: &mut Vec<Action>) {
        if !matches!(self.phase, Phase::Connected { socket: current, .. } if current == socket) {
            trace!("Frame from stale socket {:?} dropped", socket);
            return;
        }

        match InboundFrame::parse(text) {
            Ok(InboundFrame::ChatMessage { message }) if !message.is_null() => {
                actions.push(Action::Emit(ConnectionEvent::ChatMessage(message)));
            }
            Ok(InboundFrame::ChatMessage { .. }) => {
                debug!("chat_message frame without payload ignored");
            }
            Ok(InboundFrame::Error { message }) => {
                let message = message.unwrap_or_else(|| "An error occurred".to_string());
                actions.push(Action::Emit(ConnectionEvent::ServerError(message)));
            }
            Ok(InboundFrame::Unknown) => trace!("Unhandled frame type: {}", text),
            Err(e) => warn!("Failed to parse inbound frame: {} ({:?})", e, text),
        }
    }

    fn on_socket_closed(
        &mut self,
        socket: SocketId,
        close: Option<CloseInfo>,
        actions: &mut Vec<Action>,
    ) {
        match self.phase {
            Phase::Connected { socket: current, heartbeat } if current == socket => {
                actions.push(Action::CancelTimer { timer: heartbeat });
            }
            Phase::Connecting { socket: current } if current == socket => {}
            _ => {
                debug!("Close of stale socket {:?} ignored", socket);
                return;
            }
        }

        match &close {
            Some(info) => warn!("Connection dropped (code {}): {}", info.code, info.reason),
            None => warn!("Connection dropped"),
        }
        actions.push(Action::CloseSocket { socket });
        self.phase = Phase::Disconnected;
        actions.push(Action::Emit(ConnectionEvent::StateChanged(
            ConnectionState::Disconnected,
        )));

        let attempt = self.attempt_count + 1;
        match self.settings.policy.delay_for(attempt) {
            Some(delay) => {
                let retry = self.next_timer();
                self.attempt_count = attempt;
                self.phase = Phase::Reconnecting { retry };
                info!("Reconnect attempt {} scheduled in {:?}", attempt, delay);
                actions.push(Action::ScheduleRetry {
                    timer: retry,
                    after: delay,
                });
                actions.push(Action::Emit(ConnectionEvent::RetryScheduled { attempt, delay }));
                actions.push(Action::Emit(ConnectionEvent::StateChanged(
                    ConnectionState::Reconnecting,
                )));
            }
            None => {
                warn!(
                    "Giving up after {} reconnect attempts",
                    self.attempt_count
                );
                actions.push(Action::Emit(ConnectionEvent::ConnectionLost {
                    attempts: self.attempt_count,
                }));
            }
        }
    }
}

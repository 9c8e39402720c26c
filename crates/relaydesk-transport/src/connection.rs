use crate::error::TransportError;
use crate::factory::SchemeConnector;
use crate::frame::OutboundFrame;
use crate::machine::{
    Action, Connection, ConnectionEvent, ConnectionSettings, ConnectionState, Input, SocketId,
    TimerId,
};
use crate::traits::{CloseInfo, Connector, Received, Transport};
use crate::types::ConnectParams;
use crate::endpoint::redact_url;
use crate::endpoint::Endpoint;
use actix::prelude::*;
use actix::WeakAddr;
use log::{debug, error, info, trace, warn};
use relaydesk_core::TransportConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const OUTGOING_BUFFER: usize = 100;

/// Actor that keeps one logical connection to a chat channel alive.
///
/// It owns the [`Connection`] state machine and executes what it asks for:
/// one I/O task per socket, actix timers for heartbeat and reconnect, and
/// events to the owner. All of it runs on the actor's context, so socket
/// events, timer firings and owner commands are handled one at a time.
pub struct ConnectionActor {
    machine: Connection,
    params: ConnectParams,
    connector: Arc<dyn Connector>,
    owner: Recipient<ConnectionEvent>,
    socket: Option<SocketHandle>,
    timers: HashMap<TimerId, SpawnHandle>,
}

struct SocketHandle {
    id: SocketId,
    opened: bool,
    outgoing_tx: mpsc::Sender<String>,
    task: JoinHandle<()>,
}

impl ConnectionActor {
    pub fn new(
        settings: ConnectionSettings,
        params: ConnectParams,
        connector: Arc<dyn Connector>,
        owner: Recipient<ConnectionEvent>,
    ) -> Self {
        Self {
            machine: Connection::new(settings),
            params,
            connector,
            owner,
            socket: None,
            timers: HashMap::new(),
        }
    }

    /// A connection actor using real sockets, configured from `cfg`.
    pub fn from_config(cfg: &TransportConfig, owner: Recipient<ConnectionEvent>) -> Self {
        Self::new(
            ConnectionSettings::from(cfg),
            ConnectParams::from(cfg),
            Arc::new(SchemeConnector),
            owner,
        )
    }

    fn apply(&mut self, actions: Vec<Action>, ctx: &mut Context<Self>) {
        for action in actions {
            trace!("Applying {:?}", action);
            match action {
                Action::OpenSocket { socket, url } => self.open_socket(socket, url, ctx),
                Action::CloseSocket { socket } => self.close_socket(socket),
                Action::Send { socket, frame } => self.send_frame(socket, frame),
                Action::StartHeartbeat { timer, every } => {
                    let handle = ctx.run_interval(every, move |act, ctx| {
                        let actions = act.machine.handle(Input::HeartbeatTick { timer });
                        act.apply(actions, ctx);
                    });
                    self.timers.insert(timer, handle);
                }
                Action::ScheduleRetry { timer, after } => {
                    let handle = ctx.run_later(after, move |act, ctx| {
                        act.timers.remove(&timer);
                        let actions = act.machine.handle(Input::RetryElapsed { timer });
                        act.apply(actions, ctx);
                    });
                    self.timers.insert(timer, handle);
                }
                Action::CancelTimer { timer } => {
                    if let Some(handle) = self.timers.remove(&timer) {
                        ctx.cancel_future(handle);
                    }
                }
                Action::Emit(event) => self.notify_owner(event),
            }
        }
    }

    fn open_socket(&mut self, socket: SocketId, url: String, ctx: &mut Context<Self>) {
        if let Some(previous) = self.socket.as_ref().map(|s| s.id) {
            warn!("Socket {:?} still present when opening {:?}; closing it", previous, socket);
            self.close_socket(previous);
        }

        let params = self.params.with_url(url);
        let transport = match self.connector.create(&params) {
            Ok(transport) => transport,
            Err(e) => {
                error!("Failed to create transport for {}: {}", redact_url(&params.url), e);
                ctx.notify(SocketEvent(Input::SocketClosed {
                    socket,
                    close: Some(CloseInfo::abnormal(e.to_string())),
                }));
                return;
            }
        };

        let (outgoing_tx, outgoing_rx) = mpsc::channel::<String>(OUTGOING_BUFFER);
        let task = actix::spawn(run_socket(
            socket,
            transport,
            outgoing_rx,
            ctx.address().downgrade(),
            params.connection_timeout,
        ));
        self.socket = Some(SocketHandle {
            id: socket,
            opened: false,
            outgoing_tx,
            task,
        });
    }

    fn close_socket(&mut self, socket: SocketId) {
        match self.socket.take() {
            Some(handle) if handle.id == socket => {
                if handle.opened {
                    // The I/O task sends a close frame once its queue is dropped.
                    drop(handle.outgoing_tx);
                } else {
                    handle.task.abort();
                }
                debug!("Socket {:?} released", socket);
            }
            other => self.socket = other,
        }
    }

    fn send_frame(&mut self, socket: SocketId, frame: OutboundFrame) {
        let Some(handle) = self.socket.as_ref().filter(|s| s.id == socket && s.opened) else {
            debug!("Dropping '{}' frame: socket {:?} not open", frame.kind(), socket);
            return;
        };
        let text = match frame.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize '{}' frame: {}", frame.kind(), e);
                return;
            }
        };
        if let Err(e) = handle.outgoing_tx.try_send(text) {
            warn!("Dropping '{}' frame: {}", frame.kind(), e);
        }
    }

    fn notify_owner(&self, event: ConnectionEvent) {
        if !self.owner.connected() {
            warn!("Connection owner is gone, dropping event {:?}", event);
            return;
        }
        // Chat messages must not be lost to a full mailbox.
        self.owner.do_send(event);
    }
}

async fn run_socket(
    socket: SocketId,
    mut transport: Box<dyn Transport>,
    mut outgoing_rx: mpsc::Receiver<String>,
    actor: WeakAddr<ConnectionActor>,
    connect_timeout: Duration,
) {
    match tokio::time::timeout(connect_timeout, transport.connect()).await {
        Ok(Ok(())) => report(&actor, Input::SocketOpened { socket }),
        Ok(Err(e)) => {
            warn!("Connection attempt failed: {}", e);
            report(
                &actor,
                Input::SocketClosed {
                    socket,
                    close: Some(CloseInfo::abnormal(e.to_string())),
                },
            );
            return;
        }
        Err(_) => {
            warn!("Connection attempt timed out after {:?}", connect_timeout);
            report(
                &actor,
                Input::SocketClosed {
                    socket,
                    close: Some(CloseInfo::abnormal(TransportError::Timeout.to_string())),
                },
            );
            return;
        }
    }

    let close = loop {
        tokio::select! {
            outgoing = outgoing_rx.recv() => match outgoing {
                Some(text) => {
                    if let Err(e) = transport.send(&text).await {
                        error!("Transport send error: {}", e);
                        break Some(CloseInfo::abnormal(e.to_string()));
                    }
                }
                None => {
                    debug!("Outgoing queue closed, shutting socket {:?} down", socket);
                    if let Ok(Err(e)) =
                        tokio::time::timeout(connect_timeout, transport.disconnect()).await
                    {
                        warn!("Error during transport disconnect: {}", e);
                    }
                    return;
                }
            },
            received = transport.receive() => match received {
                Ok(Received::Text(text)) => {
                    report(&actor, Input::SocketText { socket, text });
                }
                Ok(Received::Closed(info)) => break info,
                Err(e) => {
                    error!("Transport receive error: {}", e);
                    break Some(CloseInfo::abnormal(e.to_string()));
                }
            },
        }
    };

    // Report first; the close handshake may stall.
    report(&actor, Input::SocketClosed { socket, close });
    if let Ok(Err(e)) = tokio::time::timeout(connect_timeout, transport.disconnect()).await {
        warn!("Error during transport disconnect after close: {}", e);
    }
}

// The task outlives the actor when it is stopped mid-handshake.
fn report(actor: &WeakAddr<ConnectionActor>, input: Input) {
    match actor.upgrade() {
        Some(addr) => addr.do_send(SocketEvent(input)),
        None => trace!("Connection actor gone, dropping {:?}", input),
    }
}

impl actix::Message for ConnectionEvent {
    type Result = ();
}

// --- Actor Messages ---

/// Start connecting to the given endpoint.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct Open(pub Endpoint);

/// Send a frame if the connection is open; dropped otherwise.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct SendFrame(pub OutboundFrame);

/// Close the connection for good.
#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "()")]
pub struct Close;

/// Read-only view of the connection.
#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "ConnectionStatus")]
pub struct GetStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub attempt_count: u32,
}

/// Reports from socket tasks.
#[derive(Message, Debug)]
#[rtype(result = "()")]
struct SocketEvent(Input);

// --- Actor Implementation ---

impl Actor for ConnectionActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("ConnectionActor started");
    }

    fn stopping(&mut self, ctx: &mut Self::Context) -> Running {
        info!("ConnectionActor stopping, tearing connection down.");
        let actions = self.machine.close();
        self.apply(actions, ctx);
        Running::Stop
    }
}

impl Handler<Open> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: Open, ctx: &mut Context<Self>) {
        let actions = self.machine.open(msg.0);
        self.apply(actions, ctx);
    }
}

impl Handler<SendFrame> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: SendFrame, ctx: &mut Context<Self>) {
        let actions = self.machine.send(msg.0);
        self.apply(actions, ctx);
    }
}

impl Handler<Close> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, _msg: Close, ctx: &mut Context<Self>) {
        let actions = self.machine.close();
        self.apply(actions, ctx);
    }
}

impl Handler<GetStatus> for ConnectionActor {
    type Result = MessageResult<GetStatus>;

    fn handle(&mut self, _msg: GetStatus, _ctx: &mut Context<Self>) -> Self::Result {
        MessageResult(ConnectionStatus {
            state: self.machine.state(),
            attempt_count: self.machine.attempt_count(),
        })
    }
}

impl Handler<SocketEvent> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: SocketEvent, ctx: &mut Context<Self>) {
        if let Input::SocketOpened { socket } = &msg.0 {
            if let Some(handle) = self.socket.as_mut().filter(|s| s.id == *socket) {
                handle.opened = true;
            }
        }
        let actions = self.machine.handle(msg.0);
        self.apply(actions, ctx);
    }
}

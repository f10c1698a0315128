use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use cp_order_engine::{
    db_types::OrderId,
    tracking_protocol::{ClientMessage, NotificationRef, ServerMessage},
};
use futures::{SinkExt, StreamExt};
use log::*;
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue},
        Message,
    },
    MaybeTlsStream,
    WebSocketStream,
};

use super::{BackoffPolicy, EventHandler, EventRegistry};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Invalid tracking channel URL. {0}")]
    InvalidUrl(String),
    #[error("Could not connect to the tracking channel. {0}")]
    ConnectionFailed(String),
    #[error("The tracking channel is disconnected")]
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connected,
    /// The connection dropped and reconnect attempt `attempt` is pending.
    Reconnecting { attempt: u32 },
    /// Terminal. Either the caller disconnected or the reconnect ceiling was reached.
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: String,
    pub access_token: Option<String>,
    pub backoff: BackoffPolicy,
}

impl ChannelConfig {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self { url: url.into(), access_token: None, backoff: BackoffPolicy::default() }
    }

    pub fn with_access_token<S: Into<String>>(mut self, token: S) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

enum Command {
    Send(ClientMessage),
    Disconnect,
}

#[derive(Clone, Default)]
struct Subscriptions(Arc<Mutex<HashSet<OrderId>>>);

impl Subscriptions {
    fn lock(&self) -> MutexGuard<'_, HashSet<OrderId>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn contains(&self, order_id: &OrderId) -> bool {
        self.lock().contains(order_id)
    }

    fn snapshot(&self) -> Vec<OrderId> {
        self.lock().iter().cloned().collect()
    }
}

/// A client connection to the order tracking hub.
///
/// The channel is an ordinary owned value. Create one with [`TrackingChannel::connect`], register handlers with
/// [`TrackingChannel::on`], and close it with [`TrackingChannel::disconnect`]. Dropping it also closes the connection.
///
/// Order and payment events are only passed to handlers for orders this channel is subscribed to. If the connection
/// drops, the channel reconnects following its [`BackoffPolicy`] and re-sends its subscriptions. Once the policy's
/// attempt ceiling is reached the channel moves to [`ChannelState::Disconnected`] for good, and the caller has to
/// connect a new one. Events sent by the server while the connection was down are lost.
pub struct TrackingChannel {
    url: String,
    commands: mpsc::UnboundedSender<Command>,
    subscriptions: Subscriptions,
    registry: EventRegistry,
    state: watch::Receiver<ChannelState>,
    worker: JoinHandle<()>,
}

impl TrackingChannel {
    /// Opens the connection. The first connection attempt is not retried.
    pub async fn connect(config: ChannelConfig) -> Result<Self, ChannelError> {
        let ws = open(&config).await?;
        info!("📡️ Tracking channel connected to {}", config.url);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ChannelState::Connected);
        let subscriptions = Subscriptions::default();
        let registry = EventRegistry::new();
        let url = config.url.clone();
        let worker = ChannelWorker {
            config,
            commands: command_rx,
            subscriptions: subscriptions.clone(),
            registry: registry.clone(),
            state: state_tx,
        };
        let worker = tokio::spawn(worker.run(ws));
        Ok(Self { url, commands, subscriptions, registry, state, worker })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change of this channel.
    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    pub fn is_disconnected(&self) -> bool {
        self.state() == ChannelState::Disconnected
    }

    /// Registers `handler` for the named event. See [`EventRegistry::register`].
    pub fn on(&self, event: &str, handler: EventHandler) -> bool {
        self.registry.register(event, handler)
    }

    pub fn off(&self, event: &str, handler: &EventHandler) -> bool {
        self.registry.unregister(event, handler)
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Starts receiving events for `order_id`. The subscription survives reconnects.
    pub fn subscribe(&self, order_id: OrderId) -> Result<(), ChannelError> {
        self.ensure_open()?;
        debug!("📡️ Subscribing to {order_id}");
        self.subscriptions.lock().insert(order_id.clone());
        self.send(ClientMessage::subscribe(order_id))
    }

    pub fn unsubscribe(&self, order_id: &OrderId) -> Result<(), ChannelError> {
        self.ensure_open()?;
        debug!("📡️ Unsubscribing from {order_id}");
        self.subscriptions.lock().remove(order_id);
        self.send(ClientMessage::unsubscribe(order_id.clone()))
    }

    pub fn subscriptions(&self) -> Vec<OrderId> {
        self.subscriptions.snapshot()
    }

    pub fn mark_notification_read(&self, id: i64) -> Result<(), ChannelError> {
        self.send(ClientMessage::NotificationRead(NotificationRef { id }))
    }

    pub fn mark_all_notifications_read(&self) -> Result<(), ChannelError> {
        self.send(ClientMessage::NotificationReadAll)
    }

    /// Closes the connection and waits for the background task to finish.
    pub async fn disconnect(self) {
        let _ = self.commands.send(Command::Disconnect);
        if let Err(e) = self.worker.await {
            warn!("📡️ Tracking channel task ended abnormally. {e}");
        }
    }

    fn ensure_open(&self) -> Result<(), ChannelError> {
        if self.is_disconnected() {
            return Err(ChannelError::Disconnected);
        }
        Ok(())
    }

    fn send(&self, message: ClientMessage) -> Result<(), ChannelError> {
        self.ensure_open()?;
        self.commands.send(Command::Send(message)).map_err(|_| ChannelError::Disconnected)
    }
}

async fn open(config: &ChannelConfig) -> Result<WsStream, ChannelError> {
    let mut request =
        config.url.as_str().into_client_request().map_err(|e| ChannelError::InvalidUrl(format!("{}. {e}", config.url)))?;
    if let Some(token) = &config.access_token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ChannelError::ConnectionFailed("The access token is not a valid header value".into()))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    let (ws, _) = connect_async(request).await.map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
    Ok(ws)
}

enum Outcome {
    Lost,
    Closed,
}

struct ChannelWorker {
    config: ChannelConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    subscriptions: Subscriptions,
    registry: EventRegistry,
    state: watch::Sender<ChannelState>,
}

impl ChannelWorker {
    async fn run(mut self, mut ws: WsStream) {
        loop {
            if let Outcome::Closed = self.pump(&mut ws).await {
                let _ = ws.close(None).await;
                break;
            }
            match self.reconnect().await {
                Some(next) => ws = next,
                None => break,
            }
        }
        self.state.send_replace(ChannelState::Disconnected);
        info!("📡️ Tracking channel to {} closed", self.config.url);
    }

    async fn pump(&mut self, ws: &mut WsStream) -> Outcome {
        loop {
            tokio::select! {
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()),
                    Some(Ok(Message::Close(_))) | None => {
                        warn!("📡️ The tracking hub closed the connection");
                        return Outcome::Lost;
                    },
                    Some(Ok(_)) => {},
                    Some(Err(e)) => {
                        warn!("📡️ Tracking connection lost. {e}");
                        return Outcome::Lost;
                    },
                },
                command = self.commands.recv() => match command {
                    Some(Command::Send(message)) => {
                        trace!("📡️ Sending {}", message.event_name());
                        if let Err(e) = ws.send(Message::text(message.to_json())).await {
                            warn!("📡️ Could not send {}. {e}", message.event_name());
                            return Outcome::Lost;
                        }
                    },
                    Some(Command::Disconnect) | None => return Outcome::Closed,
                },
            }
        }
    }

    fn dispatch(&self, text: &str) {
        let message = match serde_json::from_str::<ServerMessage>(text) {
            Ok(m) => m,
            Err(e) => {
                debug!("📡️ Ignoring unrecognised frame. {e}");
                return;
            },
        };
        if let Some(order_id) = message.order_id() {
            if !self.subscriptions.contains(order_id) {
                trace!("📡️ Dropping {} for {order_id}. Not subscribed.", message.event_name());
                return;
            }
        }
        if let ServerMessage::Error(e) = &message {
            warn!("📡️ The tracking hub reported an error. {}", e.message);
        }
        self.registry.emit(&message);
    }

    async fn reconnect(&mut self) -> Option<WsStream> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let Some(delay) = self.config.backoff.delay_for(attempt) else {
                error!("📡️ Giving up on {} after {} reconnect attempts", self.config.url, attempt - 1);
                return None;
            };
            self.state.send_replace(ChannelState::Reconnecting { attempt });
            debug!("📡️ Reconnect attempt {attempt} in {delay:?}");
            if !self.wait(delay).await {
                return None;
            }
            let mut ws = match open(&self.config).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("📡️ Reconnect attempt {attempt} failed. {e}");
                    continue;
                },
            };
            match self.resubscribe(&mut ws).await {
                Ok(()) => {
                    info!("📡️ Tracking channel reconnected to {}", self.config.url);
                    self.state.send_replace(ChannelState::Connected);
                    return Some(ws);
                },
                Err(e) => warn!("📡️ Could not restore subscriptions. {e}"),
            }
        }
    }

    /// Sleeps for `delay`. Returns `false` if the caller disconnected in the meantime.
    async fn wait(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    // subscriptions are replayed on reconnect, everything else is lost
                    Some(Command::Send(message)) => debug!("📡️ Offline. Dropping {}", message.event_name()),
                    Some(Command::Disconnect) | None => return false,
                },
            }
        }
    }

    async fn resubscribe(&self, ws: &mut WsStream) -> Result<(), tungstenite::Error> {
        for order_id in self.subscriptions.snapshot() {
            ws.send(Message::text(ClientMessage::subscribe(order_id).to_json())).await?;
        }
        Ok(())
    }
}

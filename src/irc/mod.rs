//! IRC chat backend.
//!
//! Owns the connection lifecycle: dialing, the framer task that drains the
//! socket into a bounded queue, the registration handshake, and the
//! built-in actions. Implements the [`ChatApi`] capability contract so the
//! host loop never sees anything IRC-specific.

mod conn;
mod tls;

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use skald_proto::{Classifier, Event, Line};
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::chat::{ChatApi, Handler, Role};
use crate::config::{DEFAULT_NICK, IrcConfig};
use crate::error::ApiError;

/// Server numeric that marks registration as complete.
const READY_NUMERIC: &str = "005";
/// Display name announced in the USER line.
const REAL_NAME: &str = "Skald";
/// Farewell sent with QUIT on shutdown.
const FAREWELL: &str = "The saga is sung; I take my leave.";

/// Connection lifecycle states. One liveness wait and one handshake per
/// connection; re-entry after close is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Disconnected,
    Connecting,
    AwaitingFirstByte,
    Handshaking,
    Ready,
    Closing,
    Closed,
}

/// The IRC backend.
///
/// Shared across tasks behind an `Arc`; the write path is serialized by
/// its own lock, and the inbound queue is the only hand-off between the
/// framer and the consumer.
pub struct IrcClient {
    config: IrcConfig,
    classifier: Classifier,
    state: Mutex<SessionState>,
    writer: AsyncMutex<Option<conn::LineWriter>>,
    line_tx: mpsc::Sender<String>,
    line_rx: AsyncMutex<mpsc::Receiver<String>>,
    liveness_tx: watch::Sender<bool>,
    liveness_rx: watch::Receiver<bool>,
}

impl IrcClient {
    /// Create a client from a validated configuration. Independently
    /// rejects an empty host and a zero-capacity queue.
    pub fn new(config: IrcConfig) -> Result<Self, ApiError> {
        if config.host.is_empty() {
            return Err(ApiError::InvalidConfig(
                "no server host specified".to_string(),
            ));
        }
        if config.queue_capacity == 0 {
            return Err(ApiError::InvalidConfig(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        let classifier = Classifier::new()?;
        let (line_tx, line_rx) = mpsc::channel(config.queue_capacity);
        let (liveness_tx, liveness_rx) = watch::channel(false);
        Ok(Self {
            config,
            classifier,
            state: Mutex::new(SessionState::Disconnected),
            writer: AsyncMutex::new(None),
            line_tx,
            line_rx: AsyncMutex::new(line_rx),
            liveness_tx,
            liveness_rx,
        })
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock();
        debug!(from = ?*state, to = ?next, "session state");
        *state = next;
    }

    /// Whether registration has completed and the configured channels
    /// have been requested.
    #[allow(dead_code)]
    pub fn is_ready(&self) -> bool {
        *self.state.lock() == SessionState::Ready
    }

    /// Probe the server for liveness.
    pub async fn ping(&self) -> Result<(), ApiError> {
        self.send(&Event::ping(&self.config.host)).await
    }

    /// Request to join a channel.
    pub async fn join_channel(&self, channel: &str) -> Result<(), ApiError> {
        self.send(&Event::join(channel)).await
    }

    /// Request to leave a channel.
    pub async fn part_channel(&self, channel: &str) -> Result<(), ApiError> {
        self.send(&Event::part(channel)).await
    }

    /// Join every configured channel, in configuration order. The first
    /// failing join aborts the rest.
    async fn join_configured_channels(&self) -> Result<(), ApiError> {
        for channel in &self.config.channels {
            self.join_channel(channel).await?;
        }
        Ok(())
    }

    fn mark_ready(&self) {
        self.set_state(SessionState::Ready);
        info!(nick = %self.config.nick, "registration complete");
    }

    /// Wait for the first inbound line, bounded by the dial timeout.
    async fn await_liveness(&self) -> Result<(), ApiError> {
        let mut rx = self.liveness_rx.clone();
        match timeout(self.config.dial_timeout(), rx.wait_for(|live| *live)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(ApiError::Closed),
            Err(_) => {
                error!("timed out waiting for the server to start talking");
                Err(ApiError::LivenessTimeout)
            }
        }
    }

    /// Send the identity announcement pair: the nick declaration, then
    /// the user registration carrying the display name.
    async fn login(&self) -> Result<(), ApiError> {
        self.send(&Event::nick(&self.config.nick)).await?;
        let realname = if self.config.nick == DEFAULT_NICK {
            REAL_NAME.to_string()
        } else {
            format!("{REAL_NAME} ({})", self.config.nick)
        };
        self.send(&Event::user(&self.config.nick, &realname)).await
    }

    async fn send(&self, event: &Event) -> Result<(), ApiError> {
        let line = event.to_line();
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ApiError::NotConnected)?;
        writer.send(line.clone()).await?;
        debug!(line = %line.trim_end(), "sent line");
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChatApi for IrcClient {
    async fn start(&self) -> Result<(), ApiError> {
        self.set_state(SessionState::Connecting);
        let transport = match conn::dial(&self.config).await {
            Ok(transport) => transport,
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                return Err(e);
            }
        };
        let (reader, writer) = transport.into_split();
        *self.writer.lock().await = Some(writer);
        tokio::spawn(run_framer(
            reader,
            self.line_tx.clone(),
            self.liveness_tx.clone(),
        ));
        self.set_state(SessionState::AwaitingFirstByte);

        self.await_liveness().await?;
        self.set_state(SessionState::Handshaking);

        tokio::time::sleep(self.config.settle_delay()).await;
        self.login().await
    }

    async fn stop(&self) -> Result<(), ApiError> {
        self.set_state(SessionState::Closing);
        if let Err(e) = self.send(&Event::quit(FAREWELL)).await {
            warn!(error = %e, "failed to send farewell");
        }
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            if let Err(e) = writer.close().await {
                debug!(error = %e, "error closing transport");
            }
        }
        self.set_state(SessionState::Closed);
        Ok(())
    }

    async fn send_message(&self, event: &Event) -> Result<(), ApiError> {
        self.send(event).await
    }

    async fn receive_message(&self) -> Result<Event, ApiError> {
        let line = {
            let mut rx = self.line_rx.lock().await;
            rx.recv().await.ok_or(ApiError::Closed)?
        };
        debug!(line = %line.trim_end(), "received line");
        match self.classifier.classify(&line) {
            Line::Addressed {
                sender,
                command,
                receiver,
                text,
            } => Ok(Event {
                text,
                command,
                sender,
                receiver,
                raw: line,
            }),
            Line::Ping { token } => {
                self.send(&Event::pong(&token)).await?;
                Ok(Event {
                    command: "PING".to_string(),
                    text: token,
                    raw: line,
                    ..Event::default()
                })
            }
            Line::Fatal { message } => Err(ApiError::Server(message)),
            Line::Malformed { .. } => Err(ApiError::MalformedLine(line)),
        }
    }
}

/// The framer: drains the transport into the bounded queue as fast as the
/// peer sends. When the queue is full the send blocks, pausing further
/// reads; nothing is ever dropped. Stops on read error or peer close.
async fn run_framer(
    mut reader: conn::LineReader,
    tx: mpsc::Sender<String>,
    liveness: watch::Sender<bool>,
) {
    while let Some(read) = reader.next().await {
        match read {
            Ok(line) => {
                if !*liveness.borrow() {
                    let _ = liveness.send(true);
                }
                if tx.capacity() == 0 {
                    warn!(
                        capacity = tx.max_capacity(),
                        "inbound queue full; consumer is falling behind"
                    );
                }
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!(error = %e, "error reading line");
                break;
            }
        }
    }
    debug!("framer stopped");
}

/// Register the built-in IRC actions on the host.
pub fn register_actions(handler: &mut Handler, client: Arc<IrcClient>) -> Result<(), ApiError> {
    let on_ready = Arc::clone(&client);
    handler.register(
        READY_NUMERIC,
        "",
        "",
        "",
        Arc::new(move |_, _| {
            let client = Arc::clone(&on_ready);
            Box::pin(async move {
                client.mark_ready();
                client.join_configured_channels().await
            })
        }),
        &[],
    )?;

    let join = Arc::clone(&client);
    handler.register(
        "PRIVMSG",
        r"!join (.*)",
        "!join #channel",
        "Join the specified channel",
        Arc::new(move |re, event| {
            let client = Arc::clone(&join);
            Box::pin(async move {
                let channel = re
                    .captures(&event.text)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
                    .ok_or_else(|| ApiError::MalformedLine(event.text.clone()))?;
                client.join_channel(&channel).await
            })
        }),
        &[Role::Admin],
    )?;

    let part = Arc::clone(&client);
    handler.register(
        "PRIVMSG",
        r"!(part|leave)( (.*))?",
        "!part #channel",
        "Leave the specified channel, or the one the command came from",
        Arc::new(move |re, event| {
            let client = Arc::clone(&part);
            Box::pin(async move {
                let channel = re
                    .captures(&event.text)
                    .and_then(|caps| caps.get(3))
                    .map(|m| m.as_str().to_string())
                    .filter(|chan| !chan.is_empty())
                    .unwrap_or_else(|| event.receiver.clone());
                client.part_channel(&channel).await
            })
        }),
        &[Role::Admin],
    )?;

    let ping = Arc::clone(&client);
    handler.register(
        "PRIVMSG",
        "!ping",
        "!ping",
        "Ping the server and ask for a pong",
        Arc::new(move |_, _| {
            let client = Arc::clone(&ping);
            Box::pin(async move { client.ping().await })
        }),
        &[],
    )?;

    let mut listing = handler.render_help();
    listing.push("!help - List available commands".to_string());
    handler.register(
        "PRIVMSG",
        "!help",
        "!help",
        "List available commands",
        Arc::new(move |_, event| {
            let client = Arc::clone(&client);
            let listing = listing.clone();
            Box::pin(async move {
                for line in &listing {
                    client
                        .send_message(&Event::privmsg(event.sender_nick(), line))
                        .await?;
                }
                Ok(())
            })
        }),
        &[],
    )?;

    Ok(())
}

//! # Channel Connection Manager
//!
//! One shared websocket connection per process, owned by the composition
//! root and handed to every conversation session. Establishment is
//! single-flight: concurrent acquires wait on the same attempt instead of
//! racing to open duplicate sockets.
//!
//! A background driver owns the socket for the life of the manager. On
//! loss it reconnects forever with exponential backoff and re-joins every
//! previously joined room. Token rotation only swaps the credential used
//! by the next handshake; an established session is never dropped for it.

use futures_util::{SinkExt, StreamExt};
use lib_auth::identity::IdentityProvider;
use lib_core::{AppError, Result};
use shared::dto::chat::JoinPayload;
use shared::{ClientEvent, ServerEvent};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Lifecycle of the shared channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Initial reconnect delay, doubling per failed attempt.
const RECONNECT_DELAY: Duration = Duration::from_millis(500);
/// Backoff ceiling.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(4);
/// Capacity of the inbound server-event fanout.
const EVENT_CAPACITY: usize = 256;
/// How long `join` waits for the server's verdict.
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Running tally of failed connect attempts, published so acquires can
/// fail fast while the background retry loop keeps going.
#[derive(Debug, Clone, Default)]
struct ConnectFailure {
    attempts: u64,
    reason: String,
}

struct Shared {
    url: String,
    identity: Arc<dyn IdentityProvider>,
    events_tx: broadcast::Sender<ServerEvent>,
    state_tx: watch::Sender<ConnectionState>,
    failure_tx: watch::Sender<ConnectFailure>,
    /// Rooms confirmed joined on this connection; re-joined after reconnect.
    rooms: Mutex<HashSet<String>>,
    shutdown_tx: watch::Sender<bool>,
}

/// Shared channel connection manager.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    out_tx: mpsc::UnboundedSender<ClientEvent>,
    /// Guards driver startup only; waiting for establishment happens on
    /// the state watch so shutdown is never blocked behind an acquire.
    driver: Mutex<DriverSlot>,
}

struct DriverSlot {
    out_rx: Option<mpsc::UnboundedReceiver<ClientEvent>>,
    handle: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn new(url: impl Into<String>, identity: Arc<dyn IdentityProvider>) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (failure_tx, _) = watch::channel(ConnectFailure::default());
        let (shutdown_tx, _) = watch::channel(false);
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                identity,
                events_tx,
                state_tx,
                failure_tx,
                rooms: Mutex::new(HashSet::new()),
                shutdown_tx,
            }),
            out_tx,
            driver: Mutex::new(DriverSlot {
                out_rx: Some(out_rx),
                handle: None,
            }),
        }
    }

    /// Ensure the shared channel is up, waiting for establishment.
    ///
    /// Only the first caller starts the driver; concurrent callers wait on
    /// the same attempt. Returns `Ok` once the channel reports `Connected`
    /// and `Connection` as soon as the current attempt fails — the
    /// background retry loop keeps running either way, so a later acquire
    /// can still succeed.
    pub async fn acquire(&self) -> Result<()> {
        if self.shared.identity.current_identity().is_none() {
            return Err(AppError::Connection("not signed in".to_string()));
        }

        let mut state = self.shared.state_tx.subscribe();
        let mut failures = self.shared.failure_tx.subscribe();
        let mut shutdown = self.shared.shutdown_tx.subscribe();
        let baseline = failures.borrow().attempts;

        // The driver lock guards startup only; it is not held while
        // waiting, so shutdown can always get through.
        {
            let mut slot = self.driver.lock().await;
            if *self.shared.shutdown_tx.borrow() {
                return Err(AppError::Connection("connection manager shut down".to_string()));
            }

            if slot.handle.is_none() {
                let out_rx = slot.out_rx.take().ok_or_else(|| {
                    AppError::Connection("channel driver already consumed".to_string())
                })?;
                slot.handle = Some(tokio::spawn(drive(self.shared.clone(), out_rx)));
            }
        }

        loop {
            if *shutdown.borrow_and_update() {
                return Err(AppError::Connection("connection manager shut down".to_string()));
            }
            if *state.borrow_and_update() == ConnectionState::Connected {
                return Ok(());
            }
            {
                let failure = failures.borrow_and_update();
                if failure.attempts > baseline {
                    return Err(AppError::Connection(failure.reason.clone()));
                }
            }

            tokio::select! {
                changed = state.changed() => changed
                    .map_err(|_| AppError::Connection("channel driver stopped".to_string()))?,
                changed = failures.changed() => changed
                    .map_err(|_| AppError::Connection("channel driver stopped".to_string()))?,
                changed = shutdown.changed() => changed
                    .map_err(|_| AppError::Connection("channel driver stopped".to_string()))?,
            }
        }
    }

    /// Watch the connection lifecycle (reconnecting indicator for UIs).
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Subscribe to inbound server events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ServerEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Request room membership and await the server's verdict.
    pub async fn join(&self, conversation_id: &str) -> Result<()> {
        self.acquire().await?;

        let mut events = self.subscribe_events();
        self.out_tx
            .send(ClientEvent::join(conversation_id))
            .map_err(|_| AppError::Connection("channel closed".to_string()))?;

        let verdict = tokio::time::timeout(JOIN_TIMEOUT, async {
            loop {
                match events.recv().await {
                    Ok(ServerEvent::Joined(payload)) if payload.conversation_id == conversation_id => {
                        return Ok(());
                    }
                    Ok(ServerEvent::Error(payload)) => return Err(denial_error(&payload.message)),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(AppError::Connection("channel closed".to_string()));
                    }
                }
            }
        })
        .await
        .map_err(|_| AppError::Connection("join timed out".to_string()))?;

        verdict
    }

    /// Relay the caller's typing state. Fire-and-forget.
    pub fn typing(&self, conversation_id: &str, is_typing: bool) {
        let _ = self.out_tx.send(ClientEvent::typing(conversation_id, is_typing));
    }

    /// Tear the channel down permanently.
    pub async fn shutdown(&self) {
        let _ = self.shared.shutdown_tx.send(true);
        let mut slot = self.driver.lock().await;
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
        let _ = self.shared.state_tx.send(ConnectionState::Disconnected);
        info!("channel connection manager shut down");
    }
}

/// Map a server `error` event message onto the error taxonomy.
fn denial_error(message: &str) -> AppError {
    let lower = message.to_lowercase();
    if lower.contains("not found") {
        AppError::NotFound(message.to_string())
    } else if lower.contains("not allowed") {
        AppError::Forbidden(message.to_string())
    } else {
        AppError::Connection(message.to_string())
    }
}

/// Background driver: connect, pump frames, reconnect on loss.
async fn drive(shared: Arc<Shared>, mut out_rx: mpsc::UnboundedReceiver<ClientEvent>) {
    let mut rotation = shared.identity.subscribe_rotation();
    let mut shutdown = shared.shutdown_tx.subscribe();
    let mut delay = RECONNECT_DELAY;

    loop {
        let _ = shared.state_tx.send(ConnectionState::Connecting);

        match connect(&shared).await {
            Ok(stream) => {
                info!(url = %shared.url, "channel connected");
                delay = RECONNECT_DELAY;
                let _ = shared.state_tx.send(ConnectionState::Connected);

                if pump(&shared, stream, &mut out_rx, &mut shutdown).await {
                    return;
                }
                warn!(url = %shared.url, "channel lost, reconnecting");
            }
            Err(e) => {
                debug!(url = %shared.url, error = %e, "channel connect failed");
                let reason = match &e {
                    AppError::Connection(msg) => msg.clone(),
                    other => other.to_string(),
                };
                shared.failure_tx.send_modify(|failure| {
                    failure.attempts += 1;
                    failure.reason = reason;
                });
            }
        }

        let _ = shared.state_tx.send(ConnectionState::Disconnected);

        // Backoff between attempts. A credential rotation while we are
        // down retries immediately with the fresh token.
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = rotation.changed() => {
                debug!("credential rotated while disconnected, retrying now");
            }
            _ = shutdown.changed() => return,
        }
        delay = (delay * 2).min(MAX_RECONNECT_DELAY);
    }
}

/// Open the websocket with a freshly minted bearer token.
async fn connect(shared: &Shared) -> Result<WsStream> {
    let token = shared
        .identity
        .mint_token(true)
        .await
        .map_err(|e| AppError::Connection(e.to_string()))?;

    let mut request = shared
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| AppError::Connection(format!("bad channel url: {}", e)))?;
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", token)
            .parse()
            .map_err(|_| AppError::Connection("token is not a valid header value".to_string()))?,
    );

    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| AppError::Connection(e.to_string()))?;
    Ok(stream)
}

/// Pump one live connection until it drops or shutdown is requested.
///
/// Returns `true` on shutdown, `false` on connection loss.
async fn pump(
    shared: &Arc<Shared>,
    stream: WsStream,
    out_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    let (mut write, mut read) = stream.split();

    // Restore room memberships from before the reconnect.
    let rooms: Vec<String> = shared.rooms.lock().await.iter().cloned().collect();
    for room in rooms {
        debug!(room = %room, "re-joining room after reconnect");
        let event = ClientEvent::Join(JoinPayload {
            conversation_id: Some(room),
            task_id: None,
        });
        if send_event(&mut write, &event).await.is_err() {
            return false;
        }
    }

    loop {
        tokio::select! {
            outbound = out_rx.recv() => {
                match outbound {
                    Some(event) => {
                        if send_event(&mut write, &event).await.is_err() {
                            return false;
                        }
                    }
                    // All senders gone; the manager itself holds one, so
                    // this only happens during teardown.
                    None => return true,
                }
            }
            inbound = read.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => handle_frame(shared, &text).await,
                    Some(Ok(Message::Close(_))) | None => return false,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "channel read error");
                        return false;
                    }
                }
            }
            _ = shutdown.changed() => {
                let _ = write.send(Message::Close(None)).await;
                return true;
            }
        }
    }
}

async fn send_event(
    write: &mut (impl SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin),
    event: &ClientEvent,
) -> std::result::Result<(), ()> {
    let frame = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to serialize client event");
            return Ok(());
        }
    };
    write.send(Message::Text(frame)).await.map_err(|e| {
        debug!(error = %e, "channel write failed");
    })
}

async fn handle_frame(shared: &Arc<Shared>, text: &str) {
    let event = match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "unparseable server event");
            return;
        }
    };

    // Confirmed memberships feed the reconnect re-join set.
    if let ServerEvent::Joined(payload) = &event {
        shared
            .rooms
            .lock()
            .await
            .insert(payload.conversation_id.clone());
    }

    let _ = shared.events_tx.send(event);
}

//! # Conversation Session
//!
//! Per-conversation facade over the store and the shared channel. One
//! session per conversation id; switching conversations means dropping the
//! old session and constructing a new one. All background tasks are owned
//! by the session and aborted on drop.
//!
//! The session mirrors the message log through live snapshots (full
//! replacement per store notification, no deltas) and folds the peer's
//! typing broadcasts into the published state.

use crate::connection::ConnectionManager;
use lib_auth::identity::IdentityProvider;
use lib_core::model::store::models::Message;
use lib_core::model::store::ChatStore;
use lib_core::Result;
use shared::dto::chat::normalize_room_id;
use shared::ServerEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Hard cap on the snapshot window, matching the store-side limit.
const MAX_PAGE_SIZE: u32 = 500;
/// Quiet period after the last keystroke before the implicit stop relay.
const TYPING_STOP_AFTER: Duration = Duration::from_millis(800);

/// Options for constructing a session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub conversation_id: Option<String>,
    /// Legacy alias; used when `conversation_id` is absent.
    pub task_id: Option<String>,
    /// Known participant ids, used to materialize the conversation record.
    pub participants: Vec<String>,
    pub page_size: Option<u32>,
    /// Join the presence channel in addition to the store subscription.
    pub use_channel: bool,
}

/// Lifecycle of the message subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    Ready,
    Error(String),
}

/// State published to the UI on every change.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub messages: Vec<Message>,
    pub peer_typing: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Loading,
            messages: Vec::new(),
            peer_typing: false,
        }
    }
}

/// A live view onto one conversation.
pub struct ConversationSession {
    store: ChatStore,
    identity: Arc<dyn IdentityProvider>,
    room: Option<String>,
    task_id: Option<String>,
    participants: Vec<String>,
    snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,
    typing_tx: Option<mpsc::UnboundedSender<bool>>,
    self_typing: AtomicBool,
    tasks: Vec<JoinHandle<()>>,
}

impl ConversationSession {
    pub fn new(
        store: ChatStore,
        identity: Arc<dyn IdentityProvider>,
        connection: Option<Arc<ConnectionManager>>,
        options: SessionOptions,
    ) -> Self {
        let room = normalize_room_id(
            options.conversation_id.as_deref(),
            options.task_id.as_deref(),
        );
        let page_size = options.page_size.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE);
        let snapshot_tx = Arc::new(watch::Sender::new(SessionSnapshot::default()));

        let mut session = Self {
            store,
            identity,
            room,
            task_id: options.task_id.clone(),
            participants: options.participants,
            snapshot_tx,
            typing_tx: None,
            self_typing: AtomicBool::new(false),
            tasks: Vec::new(),
        };

        match session.room.clone() {
            Some(room) => {
                session.spawn_subscription(room.clone(), page_size);
                if options.use_channel {
                    if let Some(connection) = connection {
                        session.spawn_channel(room, connection);
                    }
                }
            }
            None => {
                // Nothing to subscribe to; publish an empty ready view.
                session.snapshot_tx.send_modify(|s| s.phase = SessionPhase::Ready);
            }
        }

        session
    }

    /// Watch the published session state.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.room.as_deref()
    }

    /// Whether the local caller is currently marked as typing.
    pub fn is_typing(&self) -> bool {
        self.self_typing.load(Ordering::Relaxed)
    }

    /// Idempotently materialize the conversation record.
    ///
    /// A no-op unless exactly two distinct non-empty participant ids are
    /// known and the current identity is one of them. The underlying write
    /// is a merge; the concurrent-ensure race is benign.
    pub async fn ensure_conversation_record(&self) -> Result<()> {
        let Some(room) = self.room.as_deref() else {
            return Ok(());
        };
        let Some(identity) = self.identity.current_identity() else {
            return Ok(());
        };
        let Some(pair) = participant_pair(&self.participants, &identity.id) else {
            return Ok(());
        };

        self.store
            .ensure_conversation(room, &pair, self.task_id.as_deref())
            .await
    }

    /// Persist a message to the conversation log.
    ///
    /// Silently a no-op on blank text, a missing conversation id, or an
    /// unresolved identity. Completes only once the append has succeeded;
    /// a store failure surfaces as `SendFailure` with no automatic retry.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let Some(room) = self.room.as_deref() else {
            return Ok(());
        };
        let Some(identity) = self.identity.current_identity() else {
            return Ok(());
        };
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.ensure_conversation_record().await {
            warn!(room, error = %e, "conversation ensure failed before send");
        }

        self.store
            .append_message(room, &identity.id, identity.display_name.as_deref(), text)
            .await?;
        Ok(())
    }

    /// Update the caller's typing state.
    ///
    /// Local state changes immediately; the relay is debounced. `true` is
    /// relayed only on the rising edge, and the session's stop timer
    /// relays the implicit `false` after a quiet period. Safe to call per
    /// keystroke.
    pub fn set_typing(&self, is_typing: bool) {
        self.self_typing.store(is_typing, Ordering::Relaxed);
        if let Some(tx) = &self.typing_tx {
            let _ = tx.send(is_typing);
        }
    }

    fn spawn_subscription(&mut self, room: String, page_size: u32) {
        let store = self.store.clone();
        let tx = self.snapshot_tx.clone();
        let ensure_pair = self
            .identity
            .current_identity()
            .and_then(|identity| participant_pair(&self.participants, &identity.id));
        let task_id = self.task_id.clone();

        self.tasks.push(tokio::spawn(async move {
            if let Some(pair) = ensure_pair {
                if let Err(e) = store
                    .ensure_conversation(&room, &pair, task_id.as_deref())
                    .await
                {
                    warn!(room, error = %e, "conversation ensure failed on subscribe");
                }
            }

            let mut feed = store.subscribe(&room).await;

            match store.snapshot(&room, page_size).await {
                Ok(messages) => tx.send_modify(|s| {
                    s.phase = SessionPhase::Ready;
                    s.messages = messages;
                }),
                Err(e) => {
                    tx.send_modify(|s| s.phase = SessionPhase::Error(e.user_message()));
                    return;
                }
            }

            loop {
                match feed.recv().await {
                    // A lagged receiver catches up for free: every tick
                    // reloads the full snapshot anyway.
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        match store.snapshot(&room, page_size).await {
                            Ok(messages) => tx.send_modify(|s| {
                                s.phase = SessionPhase::Ready;
                                s.messages = messages;
                            }),
                            Err(e) => {
                                tx.send_modify(|s| {
                                    s.phase = SessionPhase::Error(e.user_message())
                                });
                                return;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }));
    }

    fn spawn_channel(&mut self, room: String, connection: Arc<ConnectionManager>) {
        let tx = self.snapshot_tx.clone();
        let my_id = self.identity.current_identity().map(|i| i.id);

        // Debounced typing relay: session -> debouncer -> channel.
        let (typing_tx, typing_rx) = mpsc::unbounded_channel();
        let (relay_tx, mut relay_rx) = mpsc::unbounded_channel();
        self.typing_tx = Some(typing_tx);
        self.tasks
            .push(tokio::spawn(debounce_typing(typing_rx, relay_tx)));

        let relay_connection = connection.clone();
        let relay_room = room.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(is_typing) = relay_rx.recv().await {
                relay_connection.typing(&relay_room, is_typing);
            }
        }));

        self.tasks.push(tokio::spawn(async move {
            let mut events = connection.subscribe_events();

            if let Err(e) = connection.join(&room).await {
                // Presence is auxiliary; the message log keeps working
                // through the store subscription.
                warn!(room, error = %e, "room join failed");
                return;
            }
            debug!(room, "presence channel joined");

            loop {
                match events.recv().await {
                    Ok(ServerEvent::Typing(typing)) => {
                        if my_id.as_deref() != Some(typing.sender_id.as_str()) {
                            tx.send_modify(|s| s.peer_typing = typing.is_typing);
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(room, skipped, "presence events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }));
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Exactly two distinct non-empty participant ids including `identity_id`,
/// or nothing.
fn participant_pair(participants: &[String], identity_id: &str) -> Option<[String; 2]> {
    let mut unique: Vec<&str> = Vec::new();
    for p in participants {
        let p = p.trim();
        if !p.is_empty() && !unique.contains(&p) {
            unique.push(p);
        }
    }

    match unique.as_slice() {
        [a, b] if *a == identity_id || *b == identity_id => {
            Some([a.to_string(), b.to_string()])
        }
        _ => None,
    }
}

/// Edge-triggered typing debouncer.
///
/// Forwards `true` only on the rising edge, an explicit `false`
/// immediately, and an implicit `false` once no `true` has arrived for
/// the quiet period.
async fn debounce_typing(mut rx: mpsc::UnboundedReceiver<bool>, out: mpsc::UnboundedSender<bool>) {
    let mut typing = false;
    loop {
        if typing {
            tokio::select! {
                update = rx.recv() => match update {
                    Some(true) => {} // keystroke; timer restarts
                    Some(false) => {
                        typing = false;
                        if out.send(false).is_err() {
                            return;
                        }
                    }
                    None => return,
                },
                _ = tokio::time::sleep(TYPING_STOP_AFTER) => {
                    typing = false;
                    if out.send(false).is_err() {
                        return;
                    }
                }
            }
        } else {
            match rx.recv().await {
                Some(true) => {
                    typing = true;
                    if out.send(true).is_err() {
                        return;
                    }
                }
                Some(false) => {} // already stopped
                None => return,
            }
        }
    }
}

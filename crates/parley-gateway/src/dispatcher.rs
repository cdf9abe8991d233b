use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::warn;
use uuid::Uuid;

use parley_types::events::ServerEvent;

/// A broadcast bus frame. `exclude` lets a handler address "everyone except
/// the originator" (joined/left/system notices) without a second channel.
#[derive(Debug, Clone)]
pub struct BroadcastFrame {
    pub event: ServerEvent,
    pub exclude: Option<Uuid>,
}

/// Owns the live connection channels and the room delivery groups.
///
/// Delivery groups are an explicit room-id -> user-id index resolved against
/// the per-user channels at emit time; they are maintained by join/leave and
/// are independent of room directory membership, which outlives connections.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Global events; every connection's forward task filters its own frames
    broadcast_tx: broadcast::Sender<BroadcastFrame>,

    /// user_id -> (connection_id, targeted sender)
    user_channels: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<ServerEvent>)>>,

    /// room_id -> user_ids currently subscribed to that room's delivery
    room_groups: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                user_channels: RwLock::new(HashMap::new()),
                room_groups: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a connection for a user, superseding any previous one.
    /// Returns the connection id and a single receiver carrying both targeted
    /// events and (filtered) broadcast frames; a forward task does the merge
    /// and exits when the receiver is dropped.
    pub async fn register_connection(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .insert(user_id, (conn_id, tx.clone()));

        let mut broadcast_rx = self.inner.broadcast_tx.subscribe();
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(frame) => {
                        if frame.exclude == Some(user_id) {
                            continue;
                        }
                        if tx.send(frame.event).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("connection {conn_id} lagged {n} broadcast frames");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        (conn_id, rx)
    }

    /// Drop the user's channel, but only if `conn_id` still owns it. Returns
    /// whether this connection was the current one; a false return means a
    /// newer connection took over and nothing was touched.
    pub async fn unregister_connection(&self, user_id: Uuid, conn_id: Uuid) -> bool {
        let mut channels = self.inner.user_channels.write().await;
        match channels.get(&user_id) {
            Some((current, _)) if *current == conn_id => {
                channels.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    /// Best-effort targeted delivery. Returns false when the user has no live
    /// connection; callers treat that as non-fatal.
    pub async fn send_to_user(&self, user_id: Uuid, event: ServerEvent) -> bool {
        let channels = self.inner.user_channels.read().await;
        match channels.get(&user_id) {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Deliver to every connection subscribed to the room's delivery group.
    pub async fn send_to_room(&self, room_id: Uuid, event: ServerEvent, exclude: Option<Uuid>) {
        let groups = self.inner.room_groups.read().await;
        let Some(members) = groups.get(&room_id) else {
            return;
        };
        let channels = self.inner.user_channels.read().await;
        for user_id in members {
            if Some(*user_id) == exclude {
                continue;
            }
            if let Some((_, tx)) = channels.get(user_id) {
                let _ = tx.send(event.clone());
            }
        }
    }

    /// Deliver to every connection except (optionally) the originator's.
    pub async fn broadcast(&self, event: ServerEvent, exclude: Option<Uuid>) {
        let _ = self.inner.broadcast_tx.send(BroadcastFrame { event, exclude });
    }

    pub async fn join_group(&self, room_id: Uuid, user_id: Uuid) {
        self.inner
            .room_groups
            .write()
            .await
            .entry(room_id)
            .or_default()
            .insert(user_id);
    }

    pub async fn leave_group(&self, room_id: Uuid, user_id: Uuid) {
        if let Some(group) = self.inner.room_groups.write().await.get_mut(&room_id) {
            group.remove(&user_id);
        }
    }

    /// Remove the user from every delivery group (disconnect cleanup).
    pub async fn drop_user_groups(&self, user_id: Uuid) {
        let mut groups = self.inner.room_groups.write().await;
        for group in groups.values_mut() {
            group.remove(&user_id);
        }
    }

    pub async fn group_members(&self, room_id: Uuid) -> Vec<Uuid> {
        self.inner
            .room_groups
            .read()
            .await
            .get(&room_id)
            .map(|g| g.iter().copied().collect())
            .unwrap_or_default()
    }
}

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use parley_state::{MessageDraft, MessageLedger, PresenceRegistry, RoomDirectory, RoomError};
use parley_types::events::{ClientEvent, RoomCreatedPayload, ServerEvent};
use parley_types::models::{Identity, PresenceRecord, RoomSummary};

use crate::dispatcher::Dispatcher;
use crate::hook::{DispatchHook, EmitTarget, TracingHook};

/// Everything that can go wrong while handling one event. Each value is
/// recovered at the router boundary and turned into a single `error` event
/// to the offending connection; none of them touch other connections.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("user not online")]
    RecipientNotOnline,
    #[error("room not found")]
    RoomNotFound,
    #[error("not a member of this room")]
    NotAMember,
    #[error("not allowed to join this private room")]
    Forbidden,
    #[error("message not found")]
    MessageNotFound,
    #[error("not allowed to modify this message")]
    NotYourMessage,
    #[error("invalid event payload")]
    Validation,
}

impl From<RoomError> for EventError {
    fn from(e: RoomError) -> Self {
        match e {
            RoomError::NotFound => EventError::RoomNotFound,
            RoomError::Forbidden => EventError::Forbidden,
        }
    }
}

/// The three registries, explicitly owned and injected into the router so
/// tests can instantiate isolated instances. Each registry sits behind one
/// coarse lock; handlers never reach into another registry's storage.
#[derive(Clone, Default)]
pub struct CoordinatorState {
    pub presence: Arc<RwLock<PresenceRegistry>>,
    pub rooms: Arc<RwLock<RoomDirectory>>,
    pub ledger: Arc<RwLock<MessageLedger>>,
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Per-connection event dispatcher. A connection reaches the router only
/// after the credential gate admitted it; every handler works from the
/// connection's attached [`Identity`] and never trusts client-supplied
/// sender identity.
#[derive(Clone)]
pub struct EventRouter {
    state: CoordinatorState,
    dispatcher: Dispatcher,
    hook: Arc<dyn DispatchHook>,
}

impl EventRouter {
    pub fn new(state: CoordinatorState, dispatcher: Dispatcher) -> Self {
        Self::with_hook(state, dispatcher, Arc::new(TracingHook))
    }

    pub fn with_hook(
        state: CoordinatorState,
        dispatcher: Dispatcher,
        hook: Arc<dyn DispatchHook>,
    ) -> Self {
        Self {
            state,
            dispatcher,
            hook,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    /// Admission complete: register presence, tell everyone else, and send
    /// the new connection its presence and room snapshots.
    pub async fn on_connected(&self, identity: &Identity, connection_id: Uuid) {
        info!(
            "{} ({}) admitted on connection {}",
            identity.username, identity.user_id, connection_id
        );

        self.state.presence.write().await.add(PresenceRecord {
            user_id: identity.user_id,
            username: identity.username.clone(),
            connection_id,
            connected: true,
            last_active: Utc::now(),
        });

        self.emit_all(
            ServerEvent::UserJoined {
                user_id: identity.user_id,
                username: identity.username.clone(),
            },
            Some(identity.user_id),
        )
        .await;

        let users = self.state.presence.read().await.list_all();
        self.emit_to_user(identity.user_id, ServerEvent::UsersList(users))
            .await;

        let rooms = self.state.rooms.read().await.list_all();
        self.emit_to_user(identity.user_id, ServerEvent::RoomList(rooms))
            .await;
    }

    /// Explicit close or transport-detected loss. Idempotent: a second
    /// notification for an already-removed user (or for a connection that a
    /// reconnect superseded) is a no-op.
    pub async fn on_disconnected(&self, identity: &Identity, connection_id: Uuid) {
        {
            let mut presence = self.state.presence.write().await;
            match presence.get_by_id(identity.user_id) {
                Some(record) if record.connection_id == connection_id => {
                    presence.remove(identity.user_id);
                }
                _ => return,
            }
        }

        self.dispatcher.drop_user_groups(identity.user_id).await;

        info!("{} ({}) disconnected", identity.username, identity.user_id);
        self.emit_all(
            ServerEvent::UserLeft {
                user_id: identity.user_id,
                username: identity.username.clone(),
            },
            Some(identity.user_id),
        )
        .await;
    }

    /// Dispatch one inbound event. Errors are answered to the originating
    /// connection only and never abort anyone else's state.
    pub async fn handle_event(&self, identity: &Identity, event: ClientEvent) {
        self.hook.on_event(identity, event.name());
        self.state.presence.write().await.touch(identity.user_id);

        let result = match event {
            ClientEvent::PrivateMessage {
                recipient_id,
                content,
            } => self.private_message(identity, recipient_id, content).await,
            ClientEvent::RoomMessage { room_id, content } => {
                self.room_message(identity, room_id, content).await
            }
            ClientEvent::CreateRoom {
                name,
                description,
                is_private,
                initial_members,
            } => {
                self.create_room(identity, name, description, is_private, initial_members)
                    .await
            }
            ClientEvent::JoinRoom { room_id } => self.join_room(identity, room_id).await,
            ClientEvent::LeaveRoom { room_id } => self.leave_room(identity, room_id).await,
            ClientEvent::MarkRead { message_id } => self.mark_read(identity, message_id).await,
            ClientEvent::SystemMessage { content, timestamp } => {
                self.system_message(identity, content, timestamp).await
            }
        };

        if let Err(e) = result {
            self.reject(identity, e).await;
        }
    }

    /// Emit a `ValidationFailure`-class error for a payload that never made
    /// it into the closed event union.
    pub async fn reject(&self, identity: &Identity, error: EventError) {
        debug!(
            "rejecting event from {} ({}): {}",
            identity.username, identity.user_id, error
        );
        self.emit_to_user(
            identity.user_id,
            ServerEvent::Error {
                message: error.to_string(),
            },
        )
        .await;
    }

    async fn private_message(
        &self,
        identity: &Identity,
        recipient_id: Uuid,
        content: String,
    ) -> Result<(), EventError> {
        // Resolve the recipient before writing to the ledger: an offline
        // recipient must leave no record behind.
        let recipient = self
            .state
            .presence
            .read()
            .await
            .get_by_id(recipient_id)
            .cloned()
            .ok_or(EventError::RecipientNotOnline)?;

        let message = self.state.ledger.write().await.create(MessageDraft {
            from: identity.user_id,
            from_username: identity.username.clone(),
            to: recipient_id,
            content,
            is_room_message: false,
        });

        info!(
            "private message {} -> {} ({})",
            identity.username, recipient.username, message.id
        );

        self.emit_to_user(recipient_id, ServerEvent::PrivateMessage(message.clone()))
            .await;
        self.emit_to_user(identity.user_id, ServerEvent::MessageSent(message))
            .await;
        Ok(())
    }

    async fn room_message(
        &self,
        identity: &Identity,
        room_id: Uuid,
        content: String,
    ) -> Result<(), EventError> {
        {
            let rooms = self.state.rooms.read().await;
            let room = rooms.get(room_id).ok_or(EventError::RoomNotFound)?;
            if !room.members.contains(&identity.user_id) {
                return Err(EventError::NotAMember);
            }
        }

        let message = self.state.ledger.write().await.create(MessageDraft {
            from: identity.user_id,
            from_username: identity.username.clone(),
            to: room_id,
            content,
            is_room_message: true,
        });

        info!(
            "room message {} -> {} ({})",
            identity.username, room_id, message.id
        );

        self.emit_to_room(room_id, ServerEvent::RoomMessage(message.clone()), None)
            .await;
        self.emit_to_user(identity.user_id, ServerEvent::MessageSent(message))
            .await;
        Ok(())
    }

    async fn create_room(
        &self,
        identity: &Identity,
        name: String,
        description: Option<String>,
        is_private: bool,
        initial_members: Vec<Uuid>,
    ) -> Result<(), EventError> {
        let room = self.state.rooms.write().await.create(
            identity.user_id,
            name,
            description,
            is_private,
            &initial_members,
        );

        info!(
            "{} created room {} ({}, private={})",
            identity.username, room.name, room.id, room.is_private
        );

        // Creator is auto-subscribed to the delivery group and gets the full room
        self.dispatcher.join_group(room.id, identity.user_id).await;
        self.emit_to_user(
            identity.user_id,
            ServerEvent::RoomCreated(RoomCreatedPayload::Full(room.clone())),
        )
        .await;

        if room.is_private {
            // Only the resolved connections of the initial members hear of it
            let presence = self.state.presence.read().await;
            for member_id in &room.members {
                if *member_id == identity.user_id {
                    continue;
                }
                if presence.get_by_id(*member_id).is_some() {
                    self.emit_to_user(
                        *member_id,
                        ServerEvent::RoomCreated(RoomCreatedPayload::Full(room.clone())),
                    )
                    .await;
                }
            }
        } else {
            let summary = RoomSummary::from(&room);
            self.emit_all(
                ServerEvent::RoomCreated(RoomCreatedPayload::Summary(summary)),
                Some(identity.user_id),
            )
            .await;
        }
        Ok(())
    }

    async fn join_room(&self, identity: &Identity, room_id: Uuid) -> Result<(), EventError> {
        self.state
            .rooms
            .write()
            .await
            .join(room_id, identity.user_id)?;

        info!("{} joined room {}", identity.username, room_id);

        self.emit_to_room(
            room_id,
            ServerEvent::UserJoinedRoom {
                room_id,
                user_id: identity.user_id,
                username: identity.username.clone(),
            },
            Some(identity.user_id),
        )
        .await;
        self.dispatcher.join_group(room_id, identity.user_id).await;
        Ok(())
    }

    async fn leave_room(&self, identity: &Identity, room_id: Uuid) -> Result<(), EventError> {
        self.state
            .rooms
            .write()
            .await
            .leave(room_id, identity.user_id)?;

        info!("{} left room {}", identity.username, room_id);

        self.dispatcher.leave_group(room_id, identity.user_id).await;
        self.emit_to_room(
            room_id,
            ServerEvent::UserLeftRoom {
                room_id,
                user_id: identity.user_id,
                username: identity.username.clone(),
            },
            Some(identity.user_id),
        )
        .await;
        Ok(())
    }

    async fn mark_read(&self, identity: &Identity, message_id: Uuid) -> Result<(), EventError> {
        let message = {
            let mut ledger = self.state.ledger.write().await;
            let mut message = ledger
                .get_by_id(message_id)
                .cloned()
                .ok_or(EventError::MessageNotFound)?;
            if message.to != identity.user_id {
                return Err(EventError::NotYourMessage);
            }
            message.read = true;
            ledger
                .update(message)
                .map_err(|_| EventError::MessageNotFound)?
        };

        // Receipt goes to the original sender's connection, if still present
        self.emit_to_user(
            message.from,
            ServerEvent::MessageRead {
                message_id,
                read_at: Utc::now(),
            },
        )
        .await;
        Ok(())
    }

    async fn system_message(
        &self,
        identity: &Identity,
        content: String,
        timestamp: i64,
    ) -> Result<(), EventError> {
        info!("system message from {}: {}", identity.username, content);

        self.emit_all(
            ServerEvent::SystemMessage {
                user_id: identity.user_id,
                username: identity.username.clone(),
                content,
                timestamp,
            },
            Some(identity.user_id),
        )
        .await;

        self.emit_to_user(
            identity.user_id,
            ServerEvent::SystemAck {
                received: true,
                timestamp: Utc::now().timestamp_millis(),
            },
        )
        .await;
        Ok(())
    }

    async fn emit_to_user(&self, user_id: Uuid, event: ServerEvent) {
        self.hook.on_emit(EmitTarget::User(user_id), event.name());
        if !self.dispatcher.send_to_user(user_id, event).await {
            // Non-fatal: a stalled or vanished connection never rolls back
            // the event that produced this emission.
            debug!("no live connection for {user_id}, dropping event");
        }
    }

    async fn emit_to_room(&self, room_id: Uuid, event: ServerEvent, exclude: Option<Uuid>) {
        self.hook.on_emit(EmitTarget::Room(room_id), event.name());
        self.dispatcher.send_to_room(room_id, event, exclude).await;
    }

    async fn emit_all(&self, event: ServerEvent, exclude: Option<Uuid>) {
        self.hook.on_emit(EmitTarget::All, event.name());
        self.dispatcher.broadcast(event, exclude).await;
    }
}

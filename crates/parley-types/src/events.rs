use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, PresenceRecord, Room, RoomSummary};

/// Events sent FROM client TO server over the gateway.
///
/// This is a closed union: an unrecognized event name or a malformed payload
/// fails deserialization and is answered with an `error` event, never
/// dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Send a direct message to a currently-online user
    #[serde(rename = "message:private", rename_all = "camelCase")]
    PrivateMessage { recipient_id: Uuid, content: String },

    /// Send a message to a room the sender is a member of
    #[serde(rename = "message:room", rename_all = "camelCase")]
    RoomMessage { room_id: Uuid, content: String },

    /// Create a room; the creator is always an implicit member
    #[serde(rename = "room:created", rename_all = "camelCase")]
    CreateRoom {
        name: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        is_private: bool,
        #[serde(default)]
        initial_members: Vec<Uuid>,
    },

    /// Join an existing room
    #[serde(rename = "room:join", rename_all = "camelCase")]
    JoinRoom { room_id: Uuid },

    /// Leave a room
    #[serde(rename = "room:leave", rename_all = "camelCase")]
    LeaveRoom { room_id: Uuid },

    /// Mark a received direct message as read
    #[serde(rename = "message:read", rename_all = "camelCase")]
    MarkRead { message_id: Uuid },

    /// Broadcast a system notice to everyone else (epoch-millis timestamp)
    #[serde(rename = "system:message")]
    SystemMessage { content: String, timestamp: i64 },
}

impl ClientEvent {
    /// Wire name of the event, for dispatch hooks and logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PrivateMessage { .. } => "message:private",
            Self::RoomMessage { .. } => "message:room",
            Self::CreateRoom { .. } => "room:created",
            Self::JoinRoom { .. } => "room:join",
            Self::LeaveRoom { .. } => "room:leave",
            Self::MarkRead { .. } => "message:read",
            Self::SystemMessage { .. } => "system:message",
        }
    }
}

/// Events sent FROM server TO client over the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Another user connected
    #[serde(rename = "user:joined", rename_all = "camelCase")]
    UserJoined { user_id: Uuid, username: String },

    /// Another user disconnected
    #[serde(rename = "user:left", rename_all = "camelCase")]
    UserLeft { user_id: Uuid, username: String },

    /// Snapshot of everyone currently online, sent on admission
    #[serde(rename = "users:list")]
    UsersList(Vec<PresenceRecord>),

    /// Snapshot of all rooms, sent on admission
    #[serde(rename = "room:list")]
    RoomList(Vec<Room>),

    /// A user joined a room this connection is subscribed to
    #[serde(rename = "user:joined:room", rename_all = "camelCase")]
    UserJoinedRoom {
        room_id: Uuid,
        user_id: Uuid,
        username: String,
    },

    /// A user left a room this connection is subscribed to
    #[serde(rename = "user:left:room", rename_all = "camelCase")]
    UserLeftRoom {
        room_id: Uuid,
        user_id: Uuid,
        username: String,
    },

    /// Incoming direct message
    #[serde(rename = "message:private")]
    PrivateMessage(Message),

    /// Incoming room message
    #[serde(rename = "message:room")]
    RoomMessage(Message),

    /// Delivery acknowledgment to the sender
    #[serde(rename = "message:sent")]
    MessageSent(Message),

    /// Read receipt delivered to the original sender
    #[serde(rename = "message:read", rename_all = "camelCase")]
    MessageRead {
        message_id: Uuid,
        read_at: chrono::DateTime<chrono::Utc>,
    },

    /// A room was created. The creator and a private room's resolved members
    /// receive the full room; a public room is announced to everyone as a
    /// member-free summary under the same event name.
    #[serde(rename = "room:created")]
    RoomCreated(RoomCreatedPayload),

    /// Relayed system notice
    #[serde(rename = "system:message", rename_all = "camelCase")]
    SystemMessage {
        user_id: Uuid,
        username: String,
        content: String,
        timestamp: i64,
    },

    /// Acknowledgment of a received system notice
    #[serde(rename = "system:ack")]
    SystemAck { received: bool, timestamp: i64 },

    /// Error caused by this connection's own event; never broadcast
    #[serde(rename = "error")]
    Error { message: String },
}

/// Payload of `room:created` — full room or public summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomCreatedPayload {
    Full(Room),
    Summary(RoomSummary),
}

impl ServerEvent {
    /// Wire name of the event, for dispatch hooks and logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserJoined { .. } => "user:joined",
            Self::UserLeft { .. } => "user:left",
            Self::UsersList(_) => "users:list",
            Self::RoomList(_) => "room:list",
            Self::UserJoinedRoom { .. } => "user:joined:room",
            Self::UserLeftRoom { .. } => "user:left:room",
            Self::PrivateMessage(_) => "message:private",
            Self::RoomMessage(_) => "message:room",
            Self::MessageSent(_) => "message:sent",
            Self::MessageRead { .. } => "message:read",
            Self::RoomCreated(_) => "room:created",
            Self::SystemMessage { .. } => "system:message",
            Self::SystemAck { .. } => "system:ack",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_wire_names_round_trip() {
        let json = r#"{"event":"room:join","data":{"roomId":"7b56df7c-5795-4d27-8bc7-1a5d2ba52a4a"}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ClientEvent::JoinRoom { .. }));
        assert_eq!(serde_json::to_string(&event).unwrap(), json);
    }

    #[test]
    fn unknown_event_name_is_rejected() {
        let json = r#"{"event":"room:destroy","data":{}}"#;
        assert!(serde_json::from_str::<ClientEvent>(json).is_err());
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let json = r#"{"event":"message:private","data":{"content":"hi"}}"#;
        assert!(serde_json::from_str::<ClientEvent>(json).is_err());
    }

    #[test]
    fn create_room_defaults() {
        let json = r#"{"event":"room:created","data":{"name":"Team"}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::CreateRoom {
                name,
                description,
                is_private,
                initial_members,
            } => {
                assert_eq!(name, "Team");
                assert!(description.is_none());
                assert!(!is_private);
                assert!(initial_members.is_empty());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn room_created_summary_has_no_members() {
        let summary = RoomSummary {
            id: uuid::Uuid::new_v4(),
            name: "General".into(),
            description: None,
            created_at: chrono::Utc::now(),
            is_private: false,
        };
        let event = ServerEvent::RoomCreated(RoomCreatedPayload::Summary(summary));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "room:created");
        assert!(json["data"].get("members").is_none());
    }
}

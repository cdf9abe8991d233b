use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated identity derived from a verified token at admission time.
/// Immutable for the lifetime of a connection; event handlers trust this and
/// never a client-supplied sender id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
}

/// Live connection record for a user. One per currently-connected user id;
/// `connection_id` is a back-reference to the transport, never used for
/// ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub user_id: Uuid,
    pub username: String,
    pub connection_id: Uuid,
    pub connected: bool,
    pub last_active: DateTime<Utc>,
}

/// A named group entity used as a fan-out target for group messages.
/// Identity (`id`, `created_at`) is immutable after creation; `members`,
/// `name` and `description` mutate only through the room directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_private: bool,
    pub members: HashSet<Uuid>,
}

/// Public metadata of a room, broadcast on creation of a public room.
/// Carries no member list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_private: bool,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id,
            name: room.name.clone(),
            description: room.description.clone(),
            created_at: room.created_at,
            is_private: room.is_private,
        }
    }
}

/// A private or room message. `to` is a user id for private messages and a
/// room id for room messages; `read` is the only field mutated after
/// creation, and only by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub from: Uuid,
    pub from_username: String,
    pub to: Uuid,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_room_message: bool,
    pub read: bool,
}

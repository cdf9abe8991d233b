use std::collections::HashMap;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use parley_types::models::Message;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("message {0} not found")]
    NotFound(Uuid),
}

/// Everything about a message except the id, which the ledger assigns.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub from: Uuid,
    pub from_username: String,
    pub to: Uuid,
    pub content: String,
    pub is_room_message: bool,
}

#[derive(Debug, Clone)]
struct Entry {
    message: Message,
    seq: u64,
}

/// Append-only-by-id message store. Ids are assigned once and never reused;
/// the `read` flag is the only post-creation mutation. Cross-entity checks
/// (recipient online, room exists) are the router's job — the ledger stores
/// whatever well-formed envelope it is given.
#[derive(Debug, Default)]
pub struct MessageLedger {
    messages: HashMap<Uuid, Entry>,
    // Insertion sequence breaks timestamp ties so history order always
    // matches creation order.
    next_seq: u64,
}

impl MessageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns an id and a monotonic position, stores, returns the message.
    pub fn create(&mut self, draft: MessageDraft) -> Message {
        let message = Message {
            id: Uuid::new_v4(),
            from: draft.from,
            from_username: draft.from_username,
            to: draft.to,
            content: draft.content,
            timestamp: Utc::now(),
            is_room_message: draft.is_room_message,
            read: false,
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.messages.insert(
            message.id,
            Entry {
                message: message.clone(),
                seq,
            },
        );
        message
    }

    pub fn get_by_id(&self, id: Uuid) -> Option<&Message> {
        self.messages.get(&id).map(|e| &e.message)
    }

    /// Replaces the stored record matching `message.id`. Callers must create
    /// before update.
    pub fn update(&mut self, message: Message) -> Result<Message, LedgerError> {
        let entry = self
            .messages
            .get_mut(&message.id)
            .ok_or(LedgerError::NotFound(message.id))?;
        entry.message = message.clone();
        Ok(message)
    }

    pub fn delete(&mut self, id: Uuid) -> bool {
        self.messages.remove(&id).is_some()
    }

    /// All messages where the user is sender or direct recipient, timestamp
    /// ascending.
    pub fn history_for(&self, user_id: Uuid) -> Vec<Message> {
        self.collect_sorted(|m| m.from == user_id || m.to == user_id)
    }

    /// Direct messages addressed to the user that are still unread.
    pub fn unread_for(&self, user_id: Uuid) -> Vec<Message> {
        self.collect_sorted(|m| !m.is_room_message && m.to == user_id && !m.read)
    }

    /// All room messages for a room, timestamp ascending.
    pub fn history_for_room(&self, room_id: Uuid) -> Vec<Message> {
        self.collect_sorted(|m| m.is_room_message && m.to == room_id)
    }

    fn collect_sorted(&self, keep: impl Fn(&Message) -> bool) -> Vec<Message> {
        let mut entries: Vec<&Entry> = self
            .messages
            .values()
            .filter(|e| keep(&e.message))
            .collect();
        entries.sort_by_key(|e| (e.message.timestamp, e.seq));
        entries.iter().map(|e| e.message.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(from: Uuid, to: Uuid, content: &str, is_room_message: bool) -> MessageDraft {
        MessageDraft {
            from,
            from_username: "alice".into(),
            to,
            content: content.into(),
            is_room_message,
        }
    }

    #[test]
    fn create_then_get_by_id() {
        let mut ledger = MessageLedger::new();
        let message = ledger.create(draft(Uuid::new_v4(), Uuid::new_v4(), "hi", false));
        assert_eq!(ledger.get_by_id(message.id), Some(&message));
        assert!(!message.read);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let mut ledger = MessageLedger::new();
        let mut message = ledger.create(draft(Uuid::new_v4(), Uuid::new_v4(), "hi", false));
        ledger.delete(message.id);

        message.read = true;
        assert_eq!(
            ledger.update(message.clone()),
            Err(LedgerError::NotFound(message.id))
        );
    }

    #[test]
    fn update_replaces_the_stored_record() {
        let mut ledger = MessageLedger::new();
        let mut message = ledger.create(draft(Uuid::new_v4(), Uuid::new_v4(), "hi", false));

        message.read = true;
        ledger.update(message.clone()).unwrap();
        assert!(ledger.get_by_id(message.id).unwrap().read);
    }

    #[test]
    fn history_preserves_creation_order() {
        let mut ledger = MessageLedger::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let a = ledger.create(draft(alice, bob, "A", false));
        let b = ledger.create(draft(alice, bob, "B", false));
        let c = ledger.create(draft(alice, bob, "C", false));

        let history = ledger.history_for(bob);
        assert_eq!(
            history.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![a.id, b.id, c.id]
        );
    }

    #[test]
    fn unread_excludes_read_and_room_messages() {
        let mut ledger = MessageLedger::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let room = Uuid::new_v4();

        let mut first = ledger.create(draft(alice, bob, "direct read", false));
        let second = ledger.create(draft(alice, bob, "direct unread", false));
        ledger.create(draft(alice, room, "room", true));

        first.read = true;
        ledger.update(first).unwrap();

        let unread = ledger.unread_for(bob);
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, second.id);
    }

    #[test]
    fn room_history_only_contains_that_room() {
        let mut ledger = MessageLedger::new();
        let alice = Uuid::new_v4();
        let room = Uuid::new_v4();
        let other_room = Uuid::new_v4();

        let first = ledger.create(draft(alice, room, "one", true));
        ledger.create(draft(alice, other_room, "elsewhere", true));
        let second = ledger.create(draft(alice, room, "two", true));

        let history = ledger.history_for_room(room);
        assert_eq!(
            history.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
    }
}

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use parley_types::models::PresenceRecord;

/// Single source of truth for who is online and on which connection.
/// Size equals the count of currently-admitted, not-yet-disconnected
/// connections; there is no background expiry.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    users: HashMap<Uuid, PresenceRecord>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `record.user_id`. Replacing is not an
    /// error: a re-connection supersedes the previous one.
    pub fn add(&mut self, record: PresenceRecord) {
        self.users.insert(record.user_id, record);
    }

    pub fn get_by_id(&self, user_id: Uuid) -> Option<&PresenceRecord> {
        self.users.get(&user_id)
    }

    pub fn get_by_connection_id(&self, connection_id: Uuid) -> Option<&PresenceRecord> {
        self.users
            .values()
            .find(|u| u.connection_id == connection_id)
    }

    pub fn get_by_username(&self, username: &str) -> Option<&PresenceRecord> {
        self.users.values().find(|u| u.username == username)
    }

    /// Refresh `last_active` for a user. Returns false on miss.
    pub fn touch(&mut self, user_id: Uuid) -> bool {
        match self.users.get_mut(&user_id) {
            Some(record) => {
                record.last_active = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Returns whether a record existed.
    pub fn remove(&mut self, user_id: Uuid) -> bool {
        self.users.remove(&user_id).is_some()
    }

    /// Snapshot used to populate new-connection views. Order is unspecified.
    pub fn list_all(&self) -> Vec<PresenceRecord> {
        self.users.values().cloned().collect()
    }

    pub fn online_count(&self) -> usize {
        self.users.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(username: &str) -> PresenceRecord {
        PresenceRecord {
            user_id: Uuid::new_v4(),
            username: username.into(),
            connection_id: Uuid::new_v4(),
            connected: true,
            last_active: Utc::now(),
        }
    }

    #[test]
    fn add_then_get_then_remove() {
        let mut registry = PresenceRegistry::new();
        let alice = record("alice");

        registry.add(alice.clone());
        assert_eq!(registry.get_by_id(alice.user_id), Some(&alice));
        assert_eq!(registry.online_count(), 1);

        assert!(registry.remove(alice.user_id));
        assert_eq!(registry.get_by_id(alice.user_id), None);
        assert!(!registry.remove(alice.user_id));
    }

    #[test]
    fn reconnection_replaces_without_duplicating() {
        let mut registry = PresenceRegistry::new();
        let mut alice = record("alice");
        registry.add(alice.clone());

        alice.connection_id = Uuid::new_v4();
        registry.add(alice.clone());

        assert_eq!(registry.online_count(), 1);
        assert_eq!(
            registry.get_by_id(alice.user_id).unwrap().connection_id,
            alice.connection_id
        );
    }

    #[test]
    fn secondary_lookups() {
        let mut registry = PresenceRegistry::new();
        let alice = record("alice");
        registry.add(alice.clone());

        assert_eq!(registry.get_by_username("alice"), Some(&alice));
        assert_eq!(registry.get_by_username("bob"), None);
        assert_eq!(
            registry.get_by_connection_id(alice.connection_id),
            Some(&alice)
        );
    }

    #[test]
    fn touch_updates_last_active() {
        let mut registry = PresenceRegistry::new();
        let alice = record("alice");
        let before = alice.last_active;
        registry.add(alice.clone());

        assert!(registry.touch(alice.user_id));
        assert!(registry.get_by_id(alice.user_id).unwrap().last_active >= before);
        assert!(!registry.touch(Uuid::new_v4()));
    }
}

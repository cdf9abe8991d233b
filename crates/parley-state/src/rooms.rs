use std::collections::HashMap;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use parley_types::models::Room;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room not found")]
    NotFound,
    #[error("not a member of this private room")]
    Forbidden,
}

/// Owns room metadata and membership. Authorization policy lives here, not in
/// the router: joining or sending to a private room without prior membership
/// fails with `Forbidden`, never silently succeeds.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<Uuid, Room>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh room id. The creator is always an implicit member.
    /// There is no uniqueness constraint on names.
    pub fn create(
        &mut self,
        creator_id: Uuid,
        name: String,
        description: Option<String>,
        is_private: bool,
        initial_members: &[Uuid],
    ) -> Room {
        let mut members: std::collections::HashSet<Uuid> =
            initial_members.iter().copied().collect();
        members.insert(creator_id);

        let room = Room {
            id: Uuid::new_v4(),
            name,
            description,
            created_at: Utc::now(),
            is_private,
            members,
        };
        self.rooms.insert(room.id, room.clone());
        room
    }

    /// Idempotent: joining a room the user is already in is ok.
    pub fn join(&mut self, room_id: Uuid, user_id: Uuid) -> Result<(), RoomError> {
        let room = self.rooms.get_mut(&room_id).ok_or(RoomError::NotFound)?;
        if room.is_private && !room.members.contains(&user_id) {
            return Err(RoomError::Forbidden);
        }
        room.members.insert(user_id);
        Ok(())
    }

    /// Idempotent: leaving a room the user is not in is ok. Rooms are
    /// retained even when they become empty.
    pub fn leave(&mut self, room_id: Uuid, user_id: Uuid) -> Result<(), RoomError> {
        let room = self.rooms.get_mut(&room_id).ok_or(RoomError::NotFound)?;
        room.members.remove(&user_id);
        Ok(())
    }

    pub fn get(&self, room_id: Uuid) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    pub fn list_all(&self) -> Vec<Room> {
        self.rooms.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creator_is_always_a_member() {
        let mut rooms = RoomDirectory::new();
        let creator = Uuid::new_v4();
        let other = Uuid::new_v4();

        let room = rooms.create(creator, "Team".into(), None, false, &[other]);
        assert!(room.members.contains(&creator));
        assert!(room.members.contains(&other));
        assert_eq!(room.members.len(), 2);
    }

    #[test]
    fn private_room_rejects_non_members_without_mutation() {
        let mut rooms = RoomDirectory::new();
        let creator = Uuid::new_v4();
        let outsider = Uuid::new_v4();

        let room = rooms.create(creator, "Secret".into(), None, true, &[]);
        assert_eq!(rooms.join(room.id, outsider), Err(RoomError::Forbidden));

        let after = rooms.get(room.id).unwrap();
        assert_eq!(after.members, room.members);
    }

    #[test]
    fn private_room_admits_existing_members() {
        let mut rooms = RoomDirectory::new();
        let creator = Uuid::new_v4();
        let invited = Uuid::new_v4();

        let room = rooms.create(creator, "Secret".into(), None, true, &[invited]);
        assert_eq!(rooms.join(room.id, invited), Ok(()));
    }

    #[test]
    fn join_unknown_room_is_not_found() {
        let mut rooms = RoomDirectory::new();
        assert_eq!(
            rooms.join(Uuid::new_v4(), Uuid::new_v4()),
            Err(RoomError::NotFound)
        );
    }

    #[test]
    fn leave_is_idempotent_and_retains_empty_rooms() {
        let mut rooms = RoomDirectory::new();
        let creator = Uuid::new_v4();
        let room = rooms.create(creator, "Team".into(), None, false, &[]);

        assert_eq!(rooms.leave(room.id, creator), Ok(()));
        let after_once = rooms.get(room.id).unwrap().members.clone();
        assert_eq!(rooms.leave(room.id, creator), Ok(()));
        let after_twice = rooms.get(room.id).unwrap().members.clone();

        assert_eq!(after_once, after_twice);
        assert!(after_twice.is_empty());
        assert!(rooms.get(room.id).is_some());
    }

    #[test]
    fn join_is_idempotent() {
        let mut rooms = RoomDirectory::new();
        let creator = Uuid::new_v4();
        let joiner = Uuid::new_v4();
        let room = rooms.create(creator, "Team".into(), None, false, &[]);

        assert_eq!(rooms.join(room.id, joiner), Ok(()));
        assert_eq!(rooms.join(room.id, joiner), Ok(()));
        assert_eq!(rooms.get(room.id).unwrap().members.len(), 2);
    }
}

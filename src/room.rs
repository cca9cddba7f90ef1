//! Room struct definition
//!
//! Represents a named chat room holding an unordered set of member sessions.

use std::collections::HashSet;

use crate::types::{ClientId, RoomName};

/// Named chat room
///
/// Rooms are created by `/create` and are never removed from the registry,
/// even once every member has left.
#[derive(Debug)]
pub struct Room {
    /// Registry key
    pub name: RoomName,
    /// Member sessions, unique by connection
    pub members: HashSet<ClientId>,
}

impl Room {
    /// Create a new room whose only member is its creator
    pub fn new(name: RoomName, creator: ClientId) -> Self {
        let mut members = HashSet::new();
        members.insert(creator);
        Self { name, members }
    }

    /// Add a member. Returns false if it was already present.
    pub fn add_member(&mut self, client_id: ClientId) -> bool {
        self.members.insert(client_id)
    }

    /// Remove a member. Removing a non-member is a no-op.
    pub fn remove_member(&mut self, client_id: ClientId) -> bool {
        self.members.remove(&client_id)
    }

    /// Check if a client is in this room
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.members.contains(&client_id)
    }

    /// Get the number of members in the room
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_creation() {
        let creator = ClientId::new();
        let room = Room::new(RoomName::new("lobby"), creator);

        assert_eq!(room.name.as_str(), "lobby");
        assert!(room.contains(creator));
        assert_eq!(room.member_count(), 1);
        assert!(!room.is_empty());
    }

    #[test]
    fn test_room_members_are_a_set() {
        let creator = ClientId::new();
        let guest = ClientId::new();
        let mut room = Room::new(RoomName::new("lobby"), creator);

        assert!(room.add_member(guest));
        assert!(!room.add_member(guest));
        assert_eq!(room.member_count(), 2);
    }

    #[test]
    fn test_room_remove_member() {
        let creator = ClientId::new();
        let guest = ClientId::new();
        let mut room = Room::new(RoomName::new("lobby"), creator);
        room.add_member(guest);

        assert!(room.remove_member(guest));
        assert!(!room.contains(guest));

        // Idempotent
        assert!(!room.remove_member(guest));

        // Last member leaving leaves an empty room behind
        assert!(room.remove_member(creator));
        assert!(room.is_empty());
    }
}

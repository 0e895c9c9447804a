use std::collections::{HashMap, HashSet};

use gridward_shared::{ConnectionId, PlayerId};

use crate::player::Player;

/// Owns every connected [`Player`]. Every other component (spatial index, visibility tracker,
/// connection actors) refers to a player only by [`PlayerId`]; this is the one place that holds
/// the actual record.
#[derive(Default)]
pub struct PlayerRegistry {
    players: HashMap<PlayerId, Player>,
    by_conn: HashMap<ConnectionId, PlayerId>,
    dirty: HashSet<PlayerId>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, player: Player) {
        self.by_conn.insert(player.conn_id, player.id);
        self.players.insert(player.id, player);
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn get_by_conn(&self, conn_id: ConnectionId) -> Option<&Player> {
        self.by_conn.get(&conn_id).and_then(|id| self.players.get(id))
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&id)?;
        self.by_conn.remove(&player.conn_id);
        self.dirty.remove(&id);
        Some(player)
    }

    pub fn mark_dirty(&mut self, id: PlayerId) {
        self.dirty.insert(id);
    }

    /// Takes the current dirty set, leaving it empty for the next tick.
    pub fn drain_dirty(&mut self) -> Vec<PlayerId> {
        self.dirty.drain().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gridward_shared::Direction;

    use super::*;

    fn player(id: u64, conn: u64) -> Player {
        Player::new(
            PlayerId(id),
            ConnectionId(conn),
            0,
            0,
            Direction::North,
            Duration::from_millis(100),
        )
    }

    #[test]
    fn insert_then_lookup_by_id_and_conn() {
        let mut registry = PlayerRegistry::new();
        registry.insert(player(1, 100));
        assert!(registry.get(PlayerId(1)).is_some());
        assert_eq!(registry.get_by_conn(ConnectionId(100)).unwrap().id, PlayerId(1));
    }

    #[test]
    fn remove_clears_both_indexes() {
        let mut registry = PlayerRegistry::new();
        registry.insert(player(1, 100));
        registry.mark_dirty(PlayerId(1));

        assert!(registry.remove(PlayerId(1)).is_some());
        assert!(registry.get(PlayerId(1)).is_none());
        assert!(registry.get_by_conn(ConnectionId(100)).is_none());
        assert!(registry.drain_dirty().is_empty());
    }

    #[test]
    fn drain_dirty_empties_the_set() {
        let mut registry = PlayerRegistry::new();
        registry.insert(player(1, 100));
        registry.insert(player(2, 200));
        registry.mark_dirty(PlayerId(1));
        registry.mark_dirty(PlayerId(2));

        let mut drained = registry.drain_dirty();
        drained.sort_by_key(|id| id.0);
        assert_eq!(drained, vec![PlayerId(1), PlayerId(2)]);
        assert!(registry.drain_dirty().is_empty());
    }
}

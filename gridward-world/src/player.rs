use std::time::{Duration, Instant};

use gridward_shared::{ConnectionId, Direction, PlayerId};

use crate::tile_map::TileMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveResult {
    Success,
    Blocked,
    Cooldown,
    OutOfBounds,
}

/// A connected (or bot) player. Owned exclusively by [`crate::registry::PlayerRegistry`]; every
/// other component references it only by [`PlayerId`].
pub struct Player {
    pub id: PlayerId,
    pub conn_id: ConnectionId,
    pub x: i16,
    pub y: i16,
    pub facing: Direction,
    pub is_bot: bool,
    last_move: Option<Instant>,
    cooldown: Duration,
}

impl Player {
    pub fn new(
        id: PlayerId,
        conn_id: ConnectionId,
        x: i16,
        y: i16,
        facing: Direction,
        cooldown: Duration,
    ) -> Self {
        Self {
            id,
            conn_id,
            x,
            y,
            facing,
            is_bot: false,
            last_move: None,
            cooldown,
        }
    }

    /// Validates and, on success, commits a move. Does not touch the spatial index or the
    /// registry's dirty set — callers must do that themselves after a `Success` result (see
    /// `World::update_player_position` and `PlayerRegistry::mark_dirty`).
    pub fn attempt_move(
        &mut self,
        dir: Direction,
        requested_facing: Direction,
        map: &TileMap,
        is_occupied: impl FnOnce(i32, i32, PlayerId) -> bool,
        now: Instant,
    ) -> MoveResult {
        if let Some(last_move) = self.last_move {
            if now.duration_since(last_move) < self.cooldown {
                return MoveResult::Cooldown;
            }
        }

        let (dx, dy) = dir.offset();
        let target_x = self.x as i32 + dx;
        let target_y = self.y as i32 + dy;

        if target_x < 0 || target_y < 0 || target_x >= map.width() || target_y >= map.height() {
            return MoveResult::OutOfBounds;
        }
        if map.is_blocked(target_x, target_y) {
            return MoveResult::Blocked;
        }
        if is_occupied(target_x, target_y, self.id) {
            return MoveResult::Blocked;
        }

        self.facing = requested_facing;
        self.x = target_x as i16;
        self.y = target_y as i16;
        self.last_move = Some(now);
        MoveResult::Success
    }

    /// Turning in place never fails: it only changes facing, never position.
    pub fn turn(&mut self, facing: Direction) {
        self.facing = facing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_at(x: i16, y: i16) -> Player {
        Player::new(
            PlayerId(1),
            ConnectionId(1),
            x,
            y,
            Direction::North,
            Duration::from_millis(100),
        )
    }

    #[test]
    fn successful_move_commits_position_and_facing() {
        let map = TileMap::open(16, 16);
        let mut player = player_at(5, 5);
        let result = player.attempt_move(
            Direction::East,
            Direction::East,
            &map,
            |_, _, _| false,
            Instant::now(),
        );
        assert_eq!(result, MoveResult::Success);
        assert_eq!((player.x, player.y), (6, 5));
        assert_eq!(player.facing, Direction::East);
    }

    #[test]
    fn blocked_move_leaves_position_unchanged_but_may_still_turn() {
        let map = TileMap::from_fn(16, 16, |x, y| x == 6 && y == 5);
        let mut player = player_at(5, 5);
        let result = player.attempt_move(
            Direction::East,
            Direction::East,
            &map,
            |_, _, _| false,
            Instant::now(),
        );
        assert_eq!(result, MoveResult::Blocked);
        assert_eq!((player.x, player.y), (5, 5));
    }

    #[test]
    fn out_of_bounds_move_is_rejected() {
        let map = TileMap::open(16, 16);
        let mut player = player_at(0, 0);
        let result = player.attempt_move(
            Direction::West,
            Direction::West,
            &map,
            |_, _, _| false,
            Instant::now(),
        );
        assert_eq!(result, MoveResult::OutOfBounds);
    }

    #[test]
    fn occupied_target_is_blocked() {
        let map = TileMap::open(16, 16);
        let mut player = player_at(5, 5);
        let result = player.attempt_move(
            Direction::East,
            Direction::East,
            &map,
            |_, _, _| true,
            Instant::now(),
        );
        assert_eq!(result, MoveResult::Blocked);
    }

    #[test]
    fn move_within_cooldown_window_is_rejected() {
        let map = TileMap::open(16, 16);
        let mut player = player_at(5, 5);
        let now = Instant::now();
        assert_eq!(
            player.attempt_move(Direction::East, Direction::East, &map, |_, _, _| false, now),
            MoveResult::Success
        );
        assert_eq!(
            player.attempt_move(Direction::East, Direction::East, &map, |_, _, _| false, now),
            MoveResult::Cooldown
        );
    }
}

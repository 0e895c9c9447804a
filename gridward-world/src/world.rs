use gridward_shared::{Config, PlayerId};

use crate::spatial_hash::{SpatialHash, SpatialHashError};
use crate::tile_map::TileMap;
use crate::visibility::VisibilityTracker;

/// Everything the tick loop consults to answer "where is everyone, and who can see whom" — the
/// terrain, the spatial index, and the visibility graph. Player records themselves live in
/// [`crate::registry::PlayerRegistry`]; this type never stores more than an id.
pub struct World {
    map: TileMap,
    spatial: SpatialHash,
    visibility: VisibilityTracker,
    view_range: i32,
}

impl World {
    pub fn new(config: &Config) -> Self {
        Self::with_map(
            config,
            TileMap::open(config.map_width, config.map_height),
        )
    }

    pub fn with_map(config: &Config, map: TileMap) -> Self {
        Self {
            spatial: SpatialHash::new(config.map_width, config.map_height, config.cell_size),
            map,
            visibility: VisibilityTracker::new(),
            view_range: config.view_range,
        }
    }

    pub fn map(&self) -> &TileMap {
        &self.map
    }

    pub fn view_range(&self) -> i32 {
        self.view_range
    }

    /// Registers a newly spawned player's position and seeds its visibility state from whoever
    /// is already in range.
    pub fn add_player(&mut self, id: PlayerId, x: i32, y: i32) -> Result<(), SpatialHashError> {
        self.spatial.insert(id, x, y)?;
        let initial = self.players_in_range(x, y, self.view_range, Some(id));
        self.visibility.initialize(id, initial);
        Ok(())
    }

    /// Removes a player from both the spatial index and the visibility graph. The returned list
    /// is who used to observe `id` and must be told it left — the caller owns sending `0x26`.
    pub fn remove_player(&mut self, id: PlayerId) -> Vec<PlayerId> {
        self.spatial.remove(id);
        let observers = self
            .visibility
            .known_by(id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        self.visibility.remove_player(id);
        observers
    }

    /// Moves `id` to `(new_x, new_y)` in the spatial index. Callers must have already committed
    /// the position on the `Player` record itself (see `Player::attempt_move`).
    pub fn update_player_position(&mut self, id: PlayerId, new_x: i32, new_y: i32) {
        self.spatial.update(id, new_x, new_y);
    }

    pub fn is_occupied(&self, x: i32, y: i32, exclude: Option<PlayerId>) -> bool {
        self.spatial.is_occupied(x, y, exclude)
    }

    /// Exact Chebyshev-distance range query: unlike `SpatialHash::for_each_in_range`, this filters
    /// out the loose cell-grid overscan and excludes `id` itself if given.
    pub fn players_in_range(&self, x: i32, y: i32, r: i32, exclude: Option<PlayerId>) -> Vec<PlayerId> {
        let mut found = Vec::new();
        self.spatial.for_each_in_range(x, y, r, |id| {
            if Some(id) == exclude {
                return;
            }
            if let Some((px, py)) = self.spatial.position(id) {
                if (px - x).abs().max((py - y).abs()) <= r {
                    found.push(id);
                }
            }
        });
        found
    }

    /// Diffs a player's current view against its previous one, updating the visibility graph.
    pub fn update_visibility(&mut self, id: PlayerId, x: i32, y: i32) -> crate::visibility::Diff {
        let currently_visible = self.players_in_range(x, y, self.view_range, Some(id));
        self.visibility.update(id, currently_visible)
    }

    pub fn visibility(&self) -> &VisibilityTracker {
        &self.visibility
    }
}

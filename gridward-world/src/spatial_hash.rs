use std::collections::HashMap;

use gridward_shared::PlayerId;
use thiserror::Error;

type CellKey = (i32, i32);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialHashError {
    #[error("player {0} is already present in the spatial index")]
    DuplicateId(PlayerId),
}

struct Entry {
    x: i32,
    y: i32,
    cell: CellKey,
}

/// A flat-grid spatial index over player positions. Supports O(1) insert/remove/reindex and
/// range queries over a bounded square without a per-query allocation.
///
/// The index is the source of truth for *where a player used to be*: callers must mutate the
/// `Player`'s position first, then call [`SpatialHash::update`] with the new coordinates — the
/// index derives the old cell from its own stored key, not from re-deriving it off the (already
/// mutated) player.
pub struct SpatialHash {
    cell_size: i32,
    grid_width: i32,
    grid_height: i32,
    cells: Vec<Vec<PlayerId>>,
    /// Cells for positions that fall outside the configured grid bounds. Populated only if a bug
    /// elsewhere produces an out-of-bounds position; logged when that happens.
    overflow: HashMap<CellKey, Vec<PlayerId>>,
    entries: HashMap<PlayerId, Entry>,
}

impl SpatialHash {
    pub fn new(map_width: i32, map_height: i32, cell_size: i32) -> Self {
        assert!(cell_size > 0);
        let grid_width = div_ceil(map_width, cell_size).max(1);
        let grid_height = div_ceil(map_height, cell_size).max(1);
        Self {
            cell_size,
            grid_width,
            grid_height,
            cells: vec![Vec::new(); (grid_width * grid_height) as usize],
            overflow: HashMap::new(),
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, id: PlayerId, x: i32, y: i32) -> Result<(), SpatialHashError> {
        if self.entries.contains_key(&id) {
            return Err(SpatialHashError::DuplicateId(id));
        }
        let cell = self.cell_key(x, y);
        self.cell_list_mut(cell).push(id);
        self.entries.insert(id, Entry { x, y, cell });
        Ok(())
    }

    pub fn remove(&mut self, id: PlayerId) {
        match self.entries.remove(&id) {
            Some(entry) => self.remove_from_cell(entry.cell, id),
            None => log::debug!("spatial hash: remove of unknown player {id}"),
        }
    }

    pub fn update(&mut self, id: PlayerId, new_x: i32, new_y: i32) {
        let Some(entry) = self.entries.get(&id) else {
            log::error!("spatial hash: update of unknown player {id}");
            return;
        };
        let old_cell = entry.cell;
        let new_cell = self.cell_key(new_x, new_y);
        if new_cell != old_cell {
            self.remove_from_cell(old_cell, id);
            self.cell_list_mut(new_cell).push(id);
        }
        let entry = self.entries.get_mut(&id).unwrap();
        entry.x = new_x;
        entry.y = new_y;
        entry.cell = new_cell;
    }

    /// The last position passed to `insert` or `update` for `id`.
    pub fn position(&self, id: PlayerId) -> Option<(i32, i32)> {
        self.entries.get(&id).map(|entry| (entry.x, entry.y))
    }

    /// True if some player other than `exclude` occupies exactly `(x, y)`.
    pub fn is_occupied(&self, x: i32, y: i32, exclude: Option<PlayerId>) -> bool {
        let cell = self.cell_key(x, y);
        self.cell_list(cell).iter().any(|&id| {
            Some(id) != exclude
                && self
                    .entries
                    .get(&id)
                    .is_some_and(|entry| entry.x == x && entry.y == y)
        })
    }

    /// Invokes `visitor` for every player whose cell overlaps the square
    /// `[x - r, x + r] x [y - r, y + r]`. May include false positives near the edge of the
    /// square; callers needing exact Chebyshev distance should filter inside `visitor`.
    pub fn for_each_in_range(&self, x: i32, y: i32, r: i32, mut visitor: impl FnMut(PlayerId)) {
        let (min_cx, min_cy) = self.cell_key(x - r, y - r);
        let (max_cx, max_cy) = self.cell_key(x + r, y + r);
        for cy in min_cy..=max_cy {
            for cx in min_cx..=max_cx {
                for &id in self.cell_list((cx, cy)) {
                    visitor(id);
                }
            }
        }
    }

    fn cell_key(&self, x: i32, y: i32) -> CellKey {
        (x.div_euclid(self.cell_size), y.div_euclid(self.cell_size))
    }

    fn in_grid(&self, key: CellKey) -> bool {
        key.0 >= 0 && key.1 >= 0 && key.0 < self.grid_width && key.1 < self.grid_height
    }

    fn flat_index(&self, key: CellKey) -> usize {
        (key.1 * self.grid_width + key.0) as usize
    }

    fn cell_list(&self, key: CellKey) -> &[PlayerId] {
        if self.in_grid(key) {
            &self.cells[self.flat_index(key)]
        } else {
            self.overflow.get(&key).map(Vec::as_slice).unwrap_or(&[])
        }
    }

    fn cell_list_mut(&mut self, key: CellKey) -> &mut Vec<PlayerId> {
        if self.in_grid(key) {
            let idx = self.flat_index(key);
            &mut self.cells[idx]
        } else {
            log::warn!("spatial hash: position maps to out-of-grid cell {key:?}, using fallback");
            self.overflow.entry(key).or_default()
        }
    }

    fn remove_from_cell(&mut self, key: CellKey, id: PlayerId) {
        let list = self.cell_list_mut(key);
        if let Some(pos) = list.iter().position(|&x| x == id) {
            list.swap_remove(pos);
        }
    }
}

fn div_ceil(a: i32, b: i32) -> i32 {
    (a + b - 1) / b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> SpatialHash {
        SpatialHash::new(64, 64, 8)
    }

    #[test]
    fn insert_then_range_query_finds_it() {
        let mut index = index();
        index.insert(PlayerId(1), 10, 10).unwrap();
        let mut found = Vec::new();
        index.for_each_in_range(10, 10, 1, |id| found.push(id));
        assert_eq!(found, vec![PlayerId(1)]);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut index = index();
        index.insert(PlayerId(1), 0, 0).unwrap();
        assert_eq!(
            index.insert(PlayerId(1), 1, 1),
            Err(SpatialHashError::DuplicateId(PlayerId(1)))
        );
    }

    #[test]
    fn remove_of_unknown_id_does_not_panic() {
        let mut index = index();
        index.remove(PlayerId(99));
    }

    #[test]
    fn update_moves_between_cells() {
        let mut index = index();
        index.insert(PlayerId(1), 0, 0).unwrap();
        index.update(PlayerId(1), 40, 40);

        let mut found_near_origin = Vec::new();
        index.for_each_in_range(0, 0, 1, |id| found_near_origin.push(id));
        assert!(found_near_origin.is_empty());

        let mut found_near_new = Vec::new();
        index.for_each_in_range(40, 40, 1, |id| found_near_new.push(id));
        assert_eq!(found_near_new, vec![PlayerId(1)]);
    }

    #[test]
    fn idempotent_update_is_a_no_op() {
        let mut index = index();
        index.insert(PlayerId(1), 5, 5).unwrap();
        index.update(PlayerId(1), 5, 5);

        let mut found = Vec::new();
        index.for_each_in_range(5, 5, 0, |id| found.push(id));
        assert_eq!(found, vec![PlayerId(1)]);
    }

    #[test]
    fn range_query_visits_each_player_exactly_once() {
        let mut index = index();
        for i in 0..20 {
            index.insert(PlayerId(i), i as i32, 0).unwrap();
        }
        let mut counts = HashMap::new();
        index.for_each_in_range(10, 0, 20, |id| {
            *counts.entry(id).or_insert(0) += 1;
        });
        for i in 0..20 {
            assert_eq!(counts.get(&PlayerId(i)), Some(&1));
        }
    }

    #[test]
    fn is_occupied_respects_exclude() {
        let mut index = index();
        index.insert(PlayerId(1), 3, 3).unwrap();
        assert!(index.is_occupied(3, 3, None));
        assert!(!index.is_occupied(3, 3, Some(PlayerId(1))));
        assert!(!index.is_occupied(4, 4, None));
    }

    #[test]
    fn out_of_grid_positions_use_fallback_without_panicking() {
        let mut index = index();
        index.insert(PlayerId(1), 1000, 1000).unwrap();
        let mut found = Vec::new();
        index.for_each_in_range(1000, 1000, 1, |id| found.push(id));
        assert_eq!(found, vec![PlayerId(1)]);
    }
}

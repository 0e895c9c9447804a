use std::collections::{HashMap, HashSet};

use gridward_shared::PlayerId;

/// The result of one [`VisibilityTracker::update`] call: which players newly entered or left a
/// player's knows-about set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diff {
    pub entered: Vec<PlayerId>,
    pub left: Vec<PlayerId>,
}

/// Tracks, for every player, the set of other players it currently knows about, and maintains the
/// reverse mapping so that disconnect cleanup touches only the players actually affected
/// (`known_by(id)` observers) rather than sweeping every player in the game.
///
/// Invariant: `b ∈ knows(a) ⇔ a ∈ known_by(b)` for all `a`, `b`.
#[derive(Default)]
pub struct VisibilityTracker {
    knows: HashMap<PlayerId, HashSet<PlayerId>>,
    known_by: HashMap<PlayerId, HashSet<PlayerId>>,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `knows(id)` with `initial_known`, updating `known_by` symmetrically. Call once, when
    /// a player first joins.
    pub fn initialize(&mut self, id: PlayerId, initial_known: impl IntoIterator<Item = PlayerId>) {
        let set: HashSet<PlayerId> = initial_known.into_iter().collect();
        for &other in &set {
            self.known_by.entry(other).or_default().insert(id);
        }
        self.knows.insert(id, set);
        self.known_by.entry(id).or_default();
    }

    /// Diffs `currently_visible` against what `id` knew as of the previous call, updating both
    /// maps symmetrically and returning the `{entered, left}` sets so the caller can emit
    /// enter/leave packets.
    pub fn update(
        &mut self,
        id: PlayerId,
        currently_visible: impl IntoIterator<Item = PlayerId>,
    ) -> Diff {
        let current: HashSet<PlayerId> = currently_visible.into_iter().collect();
        let previous = self.knows.entry(id).or_default();

        let entered: Vec<PlayerId> = current.difference(previous).copied().collect();
        let left: Vec<PlayerId> = previous.difference(&current).copied().collect();

        for &b in &entered {
            self.known_by.entry(b).or_default().insert(id);
        }
        for &b in &left {
            if let Some(set) = self.known_by.get_mut(&b) {
                set.remove(&id);
            }
        }
        self.knows.insert(id, current);

        Diff { entered, left }
    }

    /// The set of players currently observing `id`. `None` if `id` has never been initialized.
    pub fn known_by(&self, id: PlayerId) -> Option<&HashSet<PlayerId>> {
        self.known_by.get(&id)
    }

    /// The set of players `id` currently knows about. `None` if `id` has never been initialized.
    pub fn knows(&self, id: PlayerId) -> Option<&HashSet<PlayerId>> {
        self.knows.get(&id)
    }

    /// Removes every trace of `id` from both maps. O(|knows(id)| + |known_by(id)|).
    pub fn remove_player(&mut self, id: PlayerId) {
        if let Some(known) = self.knows.remove(&id) {
            for b in known {
                if let Some(set) = self.known_by.get_mut(&b) {
                    set.remove(&id);
                }
            }
        }
        if let Some(observers) = self.known_by.remove(&id) {
            for a in observers {
                if let Some(set) = self.knows.get_mut(&a) {
                    set.remove(&id);
                }
            }
        }
    }

    /// After `id` moves to `(new_x, new_y)`, returns the observers that previously knew about
    /// `id` but whose own position (as reported by `pos_fn`) is now outside `range` of the new
    /// position. Severs those edges in both maps.
    pub fn notify_observers_of_departure(
        &mut self,
        id: PlayerId,
        new_x: i32,
        new_y: i32,
        range: i32,
        pos_fn: impl Fn(PlayerId) -> Option<(i32, i32)>,
    ) -> Vec<PlayerId> {
        let observers: Vec<PlayerId> = self
            .known_by
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        let mut departed = Vec::new();
        for observer in observers {
            let Some((ox, oy)) = pos_fn(observer) else {
                continue;
            };
            let distance = (ox - new_x).abs().max((oy - new_y).abs());
            if distance > range {
                departed.push(observer);
            }
        }

        for &observer in &departed {
            if let Some(set) = self.knows.get_mut(&observer) {
                set.remove(&id);
            }
            if let Some(set) = self.known_by.get_mut(&id) {
                set.remove(&observer);
            }
        }
        departed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_reports_entered_and_left() {
        let mut tracker = VisibilityTracker::new();
        tracker.initialize(PlayerId(1), [PlayerId(2)]);

        let diff = tracker.update(PlayerId(1), [PlayerId(2), PlayerId(3)]);
        assert_eq!(diff.entered, vec![PlayerId(3)]);
        assert!(diff.left.is_empty());

        let diff = tracker.update(PlayerId(1), [PlayerId(3)]);
        assert_eq!(diff.left, vec![PlayerId(2)]);
        assert!(diff.entered.is_empty());
    }

    #[test]
    fn symmetric_invariant_holds_after_update() {
        let mut tracker = VisibilityTracker::new();
        tracker.initialize(PlayerId(1), []);
        tracker.update(PlayerId(1), [PlayerId(2)]);

        assert!(tracker.knows(PlayerId(1)).unwrap().contains(&PlayerId(2)));
        assert!(tracker
            .known_by(PlayerId(2))
            .unwrap()
            .contains(&PlayerId(1)));
    }

    #[test]
    fn remove_player_is_bidirectional() {
        let mut tracker = VisibilityTracker::new();
        tracker.initialize(PlayerId(1), []);
        tracker.initialize(PlayerId(2), []);
        tracker.update(PlayerId(1), [PlayerId(2)]);
        tracker.update(PlayerId(2), [PlayerId(1)]);

        tracker.remove_player(PlayerId(2));

        assert!(tracker.knows(PlayerId(1)).unwrap().is_empty());
        assert!(tracker.known_by(PlayerId(1)).unwrap().is_empty());
        assert!(tracker.knows(PlayerId(2)).is_none());
    }

    #[test]
    fn disconnect_cleanup_touches_only_observers() {
        let mut tracker = VisibilityTracker::new();
        let victim = PlayerId(0);
        tracker.initialize(victim, []);
        for i in 1..=1000u64 {
            tracker.initialize(PlayerId(i), []);
        }
        // Exactly 8 players know about the victim.
        for i in 1..=8u64 {
            tracker.update(PlayerId(i), [victim]);
        }

        tracker.remove_player(victim);

        for i in 1..=8u64 {
            assert!(tracker.knows(PlayerId(i)).unwrap().is_empty());
        }
        for i in 9..=1000u64 {
            assert!(!tracker.knows(PlayerId(i)).unwrap().contains(&victim));
        }
    }

    #[test]
    fn notify_observers_of_departure_only_severs_out_of_range_edges() {
        let mut tracker = VisibilityTracker::new();
        tracker.initialize(PlayerId(1), []);
        tracker.initialize(PlayerId(2), []);
        tracker.initialize(PlayerId(3), []);
        let moving = PlayerId(0);
        tracker.initialize(moving, []);
        tracker.update(PlayerId(1), [moving]);
        tracker.update(PlayerId(2), [moving]);
        tracker.update(PlayerId(3), [moving]);

        let positions: HashMap<PlayerId, (i32, i32)> = HashMap::from([
            (PlayerId(1), (0, 0)),
            (PlayerId(2), (100, 100)),
            (PlayerId(3), (1, 1)),
        ]);

        let departed =
            tracker.notify_observers_of_departure(moving, 0, 0, 5, |id| positions.get(&id).copied());

        assert_eq!(departed, vec![PlayerId(2)]);
        assert!(!tracker.known_by(moving).unwrap().contains(&PlayerId(2)));
        assert!(tracker.known_by(moving).unwrap().contains(&PlayerId(1)));
        assert!(tracker.known_by(moving).unwrap().contains(&PlayerId(3)));
    }
}

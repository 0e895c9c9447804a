use std::time::Duration;

/// Tunables shared between the tick loop and the connection layer. Constructed once at startup
/// (see `gridward-dedicated`'s `clap::Parser` args) and handed down by value or shared reference;
/// nothing here is a process-wide global.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Target tick rate, in ticks per second.
    pub tick_rate: u32,
    /// Chebyshev distance within which a player is visible to another.
    pub view_range: i32,
    /// Minimum time between two accepted moves from the same player.
    pub move_cooldown: Duration,
    /// Tiles per spatial-hash cell.
    pub cell_size: i32,
    /// Map width in tiles.
    pub map_width: i32,
    /// Map height in tiles.
    pub map_height: i32,
    /// Maximum number of entries coalesced into a single `BatchSpatial` packet.
    pub max_batch_entries: usize,
    /// Maximum actions drained from the action queue in a single tick.
    pub max_actions_per_tick: usize,
}

impl Config {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            view_range: 12,
            move_cooldown: Duration::from_millis(150),
            cell_size: 16,
            map_width: 256,
            map_height: 256,
            max_batch_entries: 200,
            max_actions_per_tick: 512,
        }
    }
}

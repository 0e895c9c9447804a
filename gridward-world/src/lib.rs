pub mod player;
pub mod registry;
pub mod spatial_hash;
pub mod tile_map;
pub mod visibility;
pub mod world;

pub use player::{MoveResult, Player};
pub use registry::PlayerRegistry;
pub use spatial_hash::{SpatialHash, SpatialHashError};
pub use tile_map::TileMap;
pub use visibility::{Diff, VisibilityTracker};
pub use world::World;

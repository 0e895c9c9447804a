pub mod cancel;
pub mod config;
pub mod direction;
pub mod ids;

pub use config::Config;
pub use direction::{Direction, ReadDirectionError};
pub use ids::{ConnectionId, ConnectionIdAllocator, PlayerId, PlayerIdAllocator};

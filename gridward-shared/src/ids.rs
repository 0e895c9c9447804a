use std::convert::Infallible;
use std::fmt::{self, Display, Formatter};

use gridward_stream_codec::{ReadError, StreamCodec};

/// A stable, server-assigned identity for a player. Distinct from the [`ConnectionId`] of the
/// socket the player is (currently) attached to: the registry is the only place that maps one to
/// the other, so nothing else needs to hold a reference that could dangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(pub u64);

impl Display for PlayerId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "player:{}", self.0)
    }
}

impl StreamCodec for PlayerId {
    type ReadError = ReadError;
    type WriteError = Infallible;

    fn read_from(r: &mut &[u8]) -> Result<Self, ReadError> {
        Ok(Self(u64::read_from(r)?))
    }

    fn write_to(&self, w: &mut Vec<u8>) -> Result<(), Infallible> {
        self.0.write_to(w)
    }
}

/// Identifies a single accepted TCP connection, independent of whatever player (if any) is
/// currently associated with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl Display for ConnectionId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Hands out sequential, never-repeating [`PlayerId`]s for the lifetime of the process.
#[derive(Debug)]
pub struct PlayerIdAllocator {
    next: u64,
}

impl PlayerIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> PlayerId {
        let id = self.next;
        self.next += 1;
        PlayerId(id)
    }
}

impl Default for PlayerIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands out sequential, never-repeating [`ConnectionId`]s for the lifetime of the process.
#[derive(Debug)]
pub struct ConnectionIdAllocator {
    next: u64,
}

impl ConnectionIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Starts issuing ids from `start` instead of 1. Used to carve out a disjoint id space, e.g.
    /// for bot placeholders that never correspond to a real socket.
    pub fn starting_at(start: u64) -> Self {
        Self { next: start }
    }

    pub fn allocate(&mut self) -> ConnectionId {
        let id = self.next;
        self.next += 1;
        ConnectionId(id)
    }
}

impl Default for ConnectionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_allocator_never_repeats() {
        let mut alloc = PlayerIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_ne!(a, b);
    }

    #[test]
    fn connection_allocator_never_repeats() {
        let mut alloc = ConnectionIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_ne!(a, b);
    }
}

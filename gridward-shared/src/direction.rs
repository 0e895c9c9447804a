use std::convert::Infallible;

use gridward_stream_codec::{ReadError, StreamCodec};
use thiserror::Error;

/// One of the four cardinal directions. Used both as a movement direction and as a player's
/// facing; the wire encoding is the same in both cases (`0=N, 1=E, 2=S, 3=W`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

#[derive(Error, Debug)]
pub enum ReadDirectionError {
    #[error("{0}")]
    ReadError(#[from] ReadError),

    #[error("invalid direction encoding 0x{0:02x}")]
    InvalidEncoding(u8),
}

impl Direction {
    /// The (dx, dy) offset one step in this direction, assuming +y is south and +x is east.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = ReadDirectionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::North),
            1 => Ok(Self::East),
            2 => Ok(Self::South),
            3 => Ok(Self::West),
            x => Err(ReadDirectionError::InvalidEncoding(x)),
        }
    }
}

impl StreamCodec for Direction {
    type ReadError = ReadDirectionError;
    type WriteError = Infallible;

    fn read_from(r: &mut &[u8]) -> Result<Self, Self::ReadError> {
        u8::read_from(r)?.try_into()
    }

    fn write_to(&self, w: &mut Vec<u8>) -> Result<(), Infallible> {
        (*self as u8).write_to(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_unit_vectors() {
        assert_eq!(Direction::North.offset(), (0, -1));
        assert_eq!(Direction::East.offset(), (1, 0));
        assert_eq!(Direction::South.offset(), (0, 1));
        assert_eq!(Direction::West.offset(), (-1, 0));
    }

    #[test]
    fn rejects_out_of_range_encoding() {
        assert!(Direction::try_from(4).is_err());
    }
}

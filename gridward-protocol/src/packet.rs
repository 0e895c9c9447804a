use std::convert::Infallible;

use gridward_shared::direction::ReadDirectionError;
use gridward_shared::{Direction, PlayerId};
use gridward_stream_codec::{ReadError, StreamCodec};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadPacketError {
    #[error("{0}")]
    ReadError(#[from] ReadError),

    #[error("{0}")]
    ReadDirectionError(#[from] ReadDirectionError),

    #[error("invalid client opcode: 0x{0:02x}")]
    InvalidClientOpcode(u8),

    #[error("invalid server opcode: 0x{0:02x}")]
    InvalidServerOpcode(u8),

    #[error("unexpected trailing data: {0} byte(s)")]
    TrailingData(usize),
}

impl From<Infallible> for ReadPacketError {
    fn from(e: Infallible) -> Self {
        match e {}
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientOpcode {
    ClientHello = 0x00,
    Move = 0x01,
    Turn = 0x02,
    Interact = 0x04,
    Attack = 0x40,
}

impl TryFrom<u8> for ClientOpcode {
    type Error = ReadPacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == Self::ClientHello as u8 => Ok(Self::ClientHello),
            x if x == Self::Move as u8 => Ok(Self::Move),
            x if x == Self::Turn as u8 => Ok(Self::Turn),
            x if x == Self::Interact as u8 => Ok(Self::Interact),
            x if x == Self::Attack as u8 => Ok(Self::Attack),
            x => Err(ReadPacketError::InvalidClientOpcode(x)),
        }
    }
}

/// A packet sent from client to server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientPacket {
    ClientHello { protocol_version: u16 },
    Move { dir: Direction, facing: Direction },
    Turn { facing: Direction },
    Interact,
    Attack,
}

impl ClientPacket {
    pub fn opcode(&self) -> ClientOpcode {
        match self {
            Self::ClientHello { .. } => ClientOpcode::ClientHello,
            Self::Move { .. } => ClientOpcode::Move,
            Self::Turn { .. } => ClientOpcode::Turn,
            Self::Interact => ClientOpcode::Interact,
            Self::Attack => ClientOpcode::Attack,
        }
    }
}

impl StreamCodec for ClientPacket {
    type ReadError = ReadPacketError;
    type WriteError = Infallible;

    fn read_from(r: &mut &[u8]) -> Result<Self, Self::ReadError> {
        match ClientOpcode::try_from(u8::read_from(r)?)? {
            ClientOpcode::ClientHello => Ok(Self::ClientHello {
                protocol_version: u16::read_from(r)?,
            }),
            ClientOpcode::Move => Ok(Self::Move {
                dir: Direction::read_from(r)?,
                facing: Direction::read_from(r)?,
            }),
            ClientOpcode::Turn => Ok(Self::Turn {
                facing: Direction::read_from(r)?,
            }),
            ClientOpcode::Interact => Ok(Self::Interact),
            ClientOpcode::Attack => Ok(Self::Attack),
        }
    }

    fn write_to(&self, w: &mut Vec<u8>) -> Result<(), Infallible> {
        (self.opcode() as u8).write_to(w)?;
        match self {
            Self::ClientHello { protocol_version } => protocol_version.write_to(w)?,
            Self::Move { dir, facing } => {
                dir.write_to(w)?;
                facing.write_to(w)?;
            }
            Self::Turn { facing } => facing.write_to(w)?,
            Self::Interact | Self::Attack => (),
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerOpcode {
    Welcome = 0x10,
    PositionCorrection = 0x11,
    FacingCorrection = 0x12,
    BatchSpatial = 0x25,
    PlayerLeft = 0x26,
    HandshakeAccepted = 0xF0,
    ServerShutdown = 0xF2,
}

impl TryFrom<u8> for ServerOpcode {
    type Error = ReadPacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == Self::Welcome as u8 => Ok(Self::Welcome),
            x if x == Self::PositionCorrection as u8 => Ok(Self::PositionCorrection),
            x if x == Self::FacingCorrection as u8 => Ok(Self::FacingCorrection),
            x if x == Self::BatchSpatial as u8 => Ok(Self::BatchSpatial),
            x if x == Self::PlayerLeft as u8 => Ok(Self::PlayerLeft),
            x if x == Self::HandshakeAccepted as u8 => Ok(Self::HandshakeAccepted),
            x if x == Self::ServerShutdown as u8 => Ok(Self::ServerShutdown),
            x => Err(ReadPacketError::InvalidServerOpcode(x)),
        }
    }
}

/// One entry in a [`ServerPacket::BatchSpatial`] packet: a snapshot of one visible player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpatialEntry {
    pub id: PlayerId,
    pub x: i16,
    pub y: i16,
    pub facing: Direction,
}

impl StreamCodec for SpatialEntry {
    type ReadError = ReadPacketError;
    type WriteError = Infallible;

    fn read_from(r: &mut &[u8]) -> Result<Self, Self::ReadError> {
        Ok(Self {
            id: PlayerId::read_from(r)?,
            x: i16::read_from(r)?,
            y: i16::read_from(r)?,
            facing: Direction::read_from(r)?,
        })
    }

    fn write_to(&self, w: &mut Vec<u8>) -> Result<(), Infallible> {
        self.id.write_to(w)?;
        self.x.write_to(w)?;
        self.y.write_to(w)?;
        self.facing.write_to(w)?;
        Ok(())
    }
}

/// A packet sent from server to client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerPacket {
    Welcome {
        id: PlayerId,
        x: i16,
        y: i16,
        facing: Direction,
    },
    PositionCorrection {
        x: i16,
        y: i16,
        facing: Direction,
    },
    FacingCorrection {
        facing: Direction,
    },
    BatchSpatial {
        entries: Vec<SpatialEntry>,
    },
    PlayerLeft {
        id: PlayerId,
    },
    HandshakeAccepted,
    ServerShutdown {
        reason: u8,
    },
}

/// Named values for [`ServerPacket::ServerShutdown`]'s `reason` byte. The wire format only ever
/// carries the raw `u8`; these constants keep call sites from scattering magic numbers.
pub mod shutdown_reason {
    pub const SERVER_SHUTDOWN: u8 = 0;
    pub const UNSUPPORTED_PROTOCOL_VERSION: u8 = 1;
    pub const NO_FREE_SPAWN_POINT: u8 = 2;
    pub const OVERLOADED: u8 = 3;
}

impl ServerPacket {
    pub fn opcode(&self) -> ServerOpcode {
        match self {
            Self::Welcome { .. } => ServerOpcode::Welcome,
            Self::PositionCorrection { .. } => ServerOpcode::PositionCorrection,
            Self::FacingCorrection { .. } => ServerOpcode::FacingCorrection,
            Self::BatchSpatial { .. } => ServerOpcode::BatchSpatial,
            Self::PlayerLeft { .. } => ServerOpcode::PlayerLeft,
            Self::HandshakeAccepted => ServerOpcode::HandshakeAccepted,
            Self::ServerShutdown { .. } => ServerOpcode::ServerShutdown,
        }
    }
}

impl StreamCodec for ServerPacket {
    type ReadError = ReadPacketError;
    type WriteError = Infallible;

    fn read_from(r: &mut &[u8]) -> Result<Self, Self::ReadError> {
        match ServerOpcode::try_from(u8::read_from(r)?)? {
            ServerOpcode::Welcome => Ok(Self::Welcome {
                id: PlayerId::read_from(r)?,
                x: i16::read_from(r)?,
                y: i16::read_from(r)?,
                facing: Direction::read_from(r)?,
            }),
            ServerOpcode::PositionCorrection => Ok(Self::PositionCorrection {
                x: i16::read_from(r)?,
                y: i16::read_from(r)?,
                facing: Direction::read_from(r)?,
            }),
            ServerOpcode::FacingCorrection => Ok(Self::FacingCorrection {
                facing: Direction::read_from(r)?,
            }),
            ServerOpcode::BatchSpatial => {
                let count = u8::read_from(r)?;
                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    entries.push(SpatialEntry::read_from(r)?);
                }
                Ok(Self::BatchSpatial { entries })
            }
            ServerOpcode::PlayerLeft => Ok(Self::PlayerLeft {
                id: PlayerId::read_from(r)?,
            }),
            ServerOpcode::HandshakeAccepted => Ok(Self::HandshakeAccepted),
            ServerOpcode::ServerShutdown => Ok(Self::ServerShutdown {
                reason: u8::read_from(r)?,
            }),
        }
    }

    fn write_to(&self, w: &mut Vec<u8>) -> Result<(), Infallible> {
        (self.opcode() as u8).write_to(w)?;
        match self {
            Self::Welcome {
                id,
                x,
                y,
                facing,
            } => {
                id.write_to(w)?;
                x.write_to(w)?;
                y.write_to(w)?;
                facing.write_to(w)?;
            }
            Self::PositionCorrection { x, y, facing } => {
                x.write_to(w)?;
                y.write_to(w)?;
                facing.write_to(w)?;
            }
            Self::FacingCorrection { facing } => facing.write_to(w)?,
            Self::BatchSpatial { entries } => {
                assert!(entries.len() <= u8::MAX as usize);
                (entries.len() as u8).write_to(w)?;
                for entry in entries {
                    entry.write_to(w)?;
                }
            }
            Self::PlayerLeft { id } => id.write_to(w)?,
            Self::HandshakeAccepted => (),
            Self::ServerShutdown { reason } => reason.write_to(w)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip_client(packet: ClientPacket) {
        let mut w = Vec::new();
        packet.write_to(&mut w).unwrap();
        let mut r = &w[..];
        let decoded = ClientPacket::read_from(&mut r).unwrap();
        assert!(r.is_empty());
        assert_eq!(decoded, packet);
    }

    fn round_trip_server(packet: ServerPacket) {
        let mut w = Vec::new();
        packet.write_to(&mut w).unwrap();
        let mut r = &w[..];
        let decoded = ServerPacket::read_from(&mut r).unwrap();
        assert!(r.is_empty());
        assert_eq!(decoded, packet);
    }

    #[test]
    fn round_trips_every_client_opcode() {
        round_trip_client(ClientPacket::ClientHello {
            protocol_version: 1,
        });
        round_trip_client(ClientPacket::Move {
            dir: Direction::East,
            facing: Direction::East,
        });
        round_trip_client(ClientPacket::Turn {
            facing: Direction::West,
        });
        round_trip_client(ClientPacket::Interact);
        round_trip_client(ClientPacket::Attack);
    }

    #[test]
    fn round_trips_every_server_opcode() {
        round_trip_server(ServerPacket::Welcome {
            id: PlayerId(1),
            x: 5,
            y: -5,
            facing: Direction::North,
        });
        round_trip_server(ServerPacket::PositionCorrection {
            x: 0,
            y: 0,
            facing: Direction::South,
        });
        round_trip_server(ServerPacket::FacingCorrection {
            facing: Direction::West,
        });
        round_trip_server(ServerPacket::BatchSpatial {
            entries: vec![SpatialEntry {
                id: PlayerId(2),
                x: 1,
                y: 2,
                facing: Direction::East,
            }],
        });
        round_trip_server(ServerPacket::PlayerLeft { id: PlayerId(3) });
        round_trip_server(ServerPacket::HandshakeAccepted);
        round_trip_server(ServerPacket::ServerShutdown { reason: 0 });
    }

    #[test]
    fn rejects_unknown_client_opcode() {
        let mut r = &[0x99u8][..];
        assert!(matches!(
            ClientPacket::read_from(&mut r),
            Err(ReadPacketError::InvalidClientOpcode(0x99))
        ));
    }

    #[test]
    fn rejects_unknown_server_opcode() {
        let mut r = &[0x99u8][..];
        assert!(matches!(
            ServerPacket::read_from(&mut r),
            Err(ReadPacketError::InvalidServerOpcode(0x99))
        ));
    }
}

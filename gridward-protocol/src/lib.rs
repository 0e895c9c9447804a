pub mod frame;
pub mod packet;

pub use frame::{encode_frame, FrameDecoder, FrameError, MAGIC, MAX_PAYLOAD_SIZE};
pub use packet::{shutdown_reason, ClientOpcode, ClientPacket, ReadPacketError, ServerOpcode, ServerPacket};

/// The protocol version this server implements. Sent by clients in `ClientHello` and checked
/// against during the handshake.
pub const PROTOCOL_VERSION: u16 = 1;

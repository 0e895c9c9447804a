use thiserror::Error;

/// The two magic bytes that open every frame.
pub const MAGIC: [u8; 2] = [0x11, 0x68];

/// The largest payload the wire format can represent (a `u16` length).
pub const MAX_WIRE_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// The operational cap enforced by this server. Frames with a larger declared size are rejected
/// before their payload is even buffered.
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("bad magic bytes")]
    BadMagic,

    #[error("frame too large: {size} bytes exceeds the {max} byte cap")]
    FrameTooLarge { size: usize, max: usize },
}

/// Encodes a single frame (`[magic][size_hi][size_lo][payload]`) around `payload`.
///
/// Panics if `payload` exceeds [`MAX_WIRE_PAYLOAD_SIZE`]; callers only ever encode packets built
/// internally, which are always well under the cap.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= MAX_WIRE_PAYLOAD_SIZE);
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&MAGIC);
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    NeedHeader,
    NeedPayload { size: u16 },
}

/// Incrementally reassembles frames out of a byte stream that may arrive in arbitrary chunk
/// sizes. Never blocks and never allocates more than one payload buffer per emitted frame.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecodeState,
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::NeedHeader,
            buf: Vec::new(),
        }
    }

    /// Appends newly-read bytes to the internal buffer.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Attempts to extract the next complete frame's payload. Returns `Ok(None)` when more bytes
    /// are needed; the caller should read more from the socket and call this again.
    pub fn poll_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        loop {
            match self.state {
                DecodeState::NeedHeader => {
                    if self.buf.len() < 4 {
                        return Ok(None);
                    }
                    if self.buf[0..2] != MAGIC {
                        return Err(FrameError::BadMagic);
                    }
                    let size = u16::from_be_bytes([self.buf[2], self.buf[3]]);
                    if size as usize > MAX_PAYLOAD_SIZE {
                        return Err(FrameError::FrameTooLarge {
                            size: size as usize,
                            max: MAX_PAYLOAD_SIZE,
                        });
                    }
                    self.buf.drain(0..4);
                    self.state = DecodeState::NeedPayload { size };
                }
                DecodeState::NeedPayload { size } => {
                    let size = size as usize;
                    if self.buf.len() < size {
                        return Ok(None);
                    }
                    let payload = self.buf.drain(0..size).collect();
                    self.state = DecodeState::NeedHeader;
                    return Ok(Some(payload));
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_single_frame() {
        let frame = encode_frame(b"hello");
        let mut decoder = FrameDecoder::new();
        decoder.push(&frame);
        assert_eq!(decoder.poll_frame().unwrap(), Some(b"hello".to_vec()));
        assert_eq!(decoder.poll_frame().unwrap(), None);
    }

    #[test]
    fn handles_byte_at_a_time_delivery() {
        let frame = encode_frame(b"abc");
        let mut decoder = FrameDecoder::new();
        let mut result = None;
        for byte in &frame {
            decoder.push(&[*byte]);
            if let Some(payload) = decoder.poll_frame().unwrap() {
                result = Some(payload);
            }
        }
        assert_eq!(result, Some(b"abc".to_vec()));
    }

    #[test]
    fn handles_multiple_frames_in_one_chunk() {
        let mut bytes = encode_frame(b"one");
        bytes.extend(encode_frame(b"two"));
        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes);
        assert_eq!(decoder.poll_frame().unwrap(), Some(b"one".to_vec()));
        assert_eq!(decoder.poll_frame().unwrap(), Some(b"two".to_vec()));
        assert_eq!(decoder.poll_frame().unwrap(), None);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0xff, 0xff, 0x00, 0x00]);
        assert_eq!(decoder.poll_frame(), Err(FrameError::BadMagic));
    }

    #[test]
    fn rejects_oversize_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&MAGIC);
        decoder.push(&(MAX_PAYLOAD_SIZE as u16 + 1).to_be_bytes());
        assert!(matches!(
            decoder.poll_frame(),
            Err(FrameError::FrameTooLarge { .. })
        ));
    }
}

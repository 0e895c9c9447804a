use std::io;

use gridward_protocol::{
    encode_frame, shutdown_reason, ClientPacket, FrameDecoder, FrameError, ReadPacketError,
    ServerPacket, PROTOCOL_VERSION,
};
use gridward_shared::cancel;
use gridward_shared::ConnectionId;
use gridward_stream_codec::StreamCodec;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

const READ_BUFFER_SIZE: usize = 4096;
const REQUEST_BUFFER_SIZE: usize = 64;
const EVENT_BUFFER_SIZE: usize = 64;
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Handshaking,
    Active,
    Closing,
}

#[derive(Debug)]
pub enum Request {
    Send(ServerPacket),
    Close,
}

#[must_use]
#[derive(Debug)]
pub enum Event {
    StateChanged(ConnectionState),
    Packet(ClientPacket),
    Closed,
}

#[derive(Error, Debug)]
enum RunError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),
    #[error("malformed packet: {0}")]
    Packet(#[from] ReadPacketError),
    #[error("peer sent a packet before completing the handshake")]
    PacketBeforeHandshake,
    #[error("peer sent an unsupported protocol version {0}")]
    UnsupportedProtocolVersion(u16),
}

/// One actor per connected socket. Owns the framed byte stream; only ever exchanges
/// [`Request`]/[`Event`] with the rest of the server. See `gridward_session` for the tick-loop
/// side of this channel.
pub struct Connection<S> {
    conn_id: ConnectionId,
    stream: S,
    requests: mpsc::Receiver<Request>,
    events: mpsc::Sender<Event>,
    decoder: FrameDecoder,
    state: ConnectionState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn spawn(
        conn_id: ConnectionId,
        stream: S,
    ) -> (cancel::Guard, mpsc::Sender<Request>, mpsc::Receiver<Event>) {
        let cancel_token = cancel::Token::new();
        let (request_tx, request_rx) = mpsc::channel(REQUEST_BUFFER_SIZE);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER_SIZE);

        let connection = Self {
            conn_id,
            stream,
            requests: request_rx,
            events: event_tx,
            decoder: FrameDecoder::new(),
            state: ConnectionState::Handshaking,
        };
        tokio::spawn(connection.run(cancel_token.clone()));

        (cancel_token.guard(), request_tx, event_rx)
    }

    async fn run(mut self, cancel_token: cancel::Token) {
        let handshake_deadline = sleep(HANDSHAKE_TIMEOUT);
        tokio::pin!(handshake_deadline);
        let mut read_buf = [0u8; READ_BUFFER_SIZE];

        let result = loop {
            if self.state == ConnectionState::Closing {
                break Ok(());
            }
            select! {
                biased;

                _ = cancel_token.cancelled() => {
                    let _ = self
                        .send_packet(ServerPacket::ServerShutdown {
                            reason: shutdown_reason::SERVER_SHUTDOWN,
                        })
                        .await;
                    break Ok(());
                }

                () = &mut handshake_deadline, if self.state == ConnectionState::Handshaking => {
                    log::debug!("connection {}: handshake timed out", self.conn_id);
                    break Ok(());
                }

                request = self.requests.recv() => {
                    match request {
                        Some(request) => match self.handle_request(request).await {
                            Ok(()) => (),
                            Err(e) => break Err(e),
                        },
                        None => break Ok(()),
                    }
                }

                result = self.stream.read(&mut read_buf) => {
                    match result {
                        Ok(0) => {
                            log::info!("connection {}: closed by peer", self.conn_id);
                            break Ok(());
                        }
                        Ok(n) => match self.handle_bytes(&read_buf[..n]).await {
                            Ok(()) => (),
                            Err(e) => break Err(e),
                        },
                        Err(e) => break Err(e.into()),
                    }
                }
            }
        };

        if let Err(e) = result {
            log::debug!("connection {}: closing after error: {e}", self.conn_id);
        }
        let _ = self.events.send(Event::Closed).await;
    }

    async fn handle_request(&mut self, request: Request) -> Result<(), RunError> {
        match request {
            Request::Send(packet) => self.send_packet(packet).await,
            Request::Close => {
                self.state = ConnectionState::Closing;
                Ok(())
            }
        }
    }

    async fn send_packet(&mut self, packet: ServerPacket) -> Result<(), RunError> {
        let mut payload = Vec::new();
        packet.write_to(&mut payload).unwrap();
        let frame = encode_frame(&payload);
        self.stream.write_all(&frame).await?;
        Ok(())
    }

    async fn handle_bytes(&mut self, bytes: &[u8]) -> Result<(), RunError> {
        self.decoder.push(bytes);
        while let Some(payload) = self.decoder.poll_frame()? {
            self.handle_frame(&payload).await?;
        }
        Ok(())
    }

    async fn handle_frame(&mut self, payload: &[u8]) -> Result<(), RunError> {
        let mut r = payload;
        let packet = ClientPacket::read_from(&mut r)?;
        if !r.is_empty() {
            return Err(RunError::Packet(ReadPacketError::TrailingData(r.len())));
        }

        match self.state {
            ConnectionState::Handshaking => self.handle_handshake_frame(packet).await,
            ConnectionState::Active => {
                let _ = self.events.send(Event::Packet(packet)).await;
                Ok(())
            }
            ConnectionState::Closing => Ok(()),
        }
    }

    async fn handle_handshake_frame(&mut self, packet: ClientPacket) -> Result<(), RunError> {
        let ClientPacket::ClientHello { protocol_version } = packet else {
            return Err(RunError::PacketBeforeHandshake);
        };
        if protocol_version != PROTOCOL_VERSION {
            self.send_packet(ServerPacket::ServerShutdown {
                reason: shutdown_reason::UNSUPPORTED_PROTOCOL_VERSION,
            })
            .await?;
            return Err(RunError::UnsupportedProtocolVersion(protocol_version));
        }
        self.send_packet(ServerPacket::HandshakeAccepted).await?;
        self.state = ConnectionState::Active;
        log::info!("connection {}: handshake accepted", self.conn_id);
        let _ = self
            .events
            .send(Event::StateChanged(ConnectionState::Active))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use gridward_shared::Direction;
    use tokio::io::duplex;

    use super::*;

    fn spawn_pair() -> (
        cancel::Guard,
        mpsc::Sender<Request>,
        mpsc::Receiver<Event>,
        tokio::io::DuplexStream,
    ) {
        let (server_side, client_side) = duplex(64 * 1024);
        let (guard, requests, events) = Connection::spawn(ConnectionId(1), server_side);
        (guard, requests, events, client_side)
    }

    async fn write_client_packet(client: &mut tokio::io::DuplexStream, packet: ClientPacket) {
        let mut payload = Vec::new();
        packet.write_to(&mut payload).unwrap();
        client.write_all(&encode_frame(&payload)).await.unwrap();
    }

    async fn read_server_packet(client: &mut tokio::io::DuplexStream) -> ServerPacket {
        let mut decoder = FrameDecoder::new();
        loop {
            let mut buf = [0u8; 4096];
            let n = client.read(&mut buf).await.unwrap();
            decoder.push(&buf[..n]);
            if let Some(payload) = decoder.poll_frame().unwrap() {
                let mut r = &payload[..];
                return ServerPacket::read_from(&mut r).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn valid_hello_is_accepted_and_activates_the_connection() {
        let (_guard, _requests, mut events, mut client) = spawn_pair();
        write_client_packet(
            &mut client,
            ClientPacket::ClientHello {
                protocol_version: PROTOCOL_VERSION,
            },
        )
        .await;

        let packet = read_server_packet(&mut client).await;
        assert_eq!(packet, ServerPacket::HandshakeAccepted);

        match events.recv().await.unwrap() {
            Event::StateChanged(ConnectionState::Active) => (),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn mismatched_protocol_version_is_rejected() {
        let (_guard, _requests, mut events, mut client) = spawn_pair();
        write_client_packet(
            &mut client,
            ClientPacket::ClientHello {
                protocol_version: PROTOCOL_VERSION + 1,
            },
        )
        .await;

        let packet = read_server_packet(&mut client).await;
        assert_eq!(
            packet,
            ServerPacket::ServerShutdown {
                reason: shutdown_reason::UNSUPPORTED_PROTOCOL_VERSION
            }
        );

        match events.recv().await.unwrap() {
            Event::Closed => (),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn packets_after_handshake_are_forwarded_as_events() {
        let (_guard, _requests, mut events, mut client) = spawn_pair();
        write_client_packet(
            &mut client,
            ClientPacket::ClientHello {
                protocol_version: PROTOCOL_VERSION,
            },
        )
        .await;
        assert!(matches!(
            events.recv().await.unwrap(),
            Event::StateChanged(ConnectionState::Active)
        ));
        let _ = read_server_packet(&mut client).await;

        write_client_packet(
            &mut client,
            ClientPacket::Move {
                dir: Direction::North,
                facing: Direction::North,
            },
        )
        .await;

        match events.recv().await.unwrap() {
            Event::Packet(ClientPacket::Move { dir, facing }) => {
                assert_eq!(dir, Direction::North);
                assert_eq!(facing, Direction::North);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_send_delivers_a_framed_packet_to_the_peer() {
        let (_guard, requests, _events, mut client) = spawn_pair();
        requests
            .send(Request::Send(ServerPacket::HandshakeAccepted))
            .await
            .unwrap();

        let packet = read_server_packet(&mut client).await;
        assert_eq!(packet, ServerPacket::HandshakeAccepted);
    }

    #[tokio::test]
    async fn request_close_ends_the_connection() {
        let (_guard, requests, mut events, _client) = spawn_pair();
        requests.send(Request::Close).await.unwrap();

        match events.recv().await.unwrap() {
            Event::Closed => (),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

//! TCP network layer: accepts connections, frames the stream and runs the
//! per-peer reader, writer and keepalive tasks. Everything a connection
//! produces funnels into one event channel drained by the main loop.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, error, info, warn};
use shared::protocol::{decode_join_request, Frame, ServerMessage, MAX_FRAME_LEN};
use shared::PeerId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::utils::get_timestamp;

/// Silence longer than this drops the peer.
const READ_TIMEOUT: Duration = Duration::from_secs(10);
/// Interval between keepalive pings.
const PING_INTERVAL: Duration = Duration::from_secs(2);

/// What a connection reports into the main loop.
#[derive(Debug)]
pub enum PeerEvent {
    /// Handshake arrived; the game decides whether to admit the peer.
    ConnectRequest {
        peer: PeerId,
        username: String,
        display_name: String,
        handle: PeerHandle,
    },
    Data {
        peer: PeerId,
        bytes: Vec<u8>,
    },
    /// Measured round trip in seconds.
    Ping {
        peer: PeerId,
        rtt: f32,
    },
    Disconnected {
        peer: PeerId,
        reason: String,
    },
}

/// Sending side of one connection, handed to the game on connect.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    peer: PeerId,
    frames: mpsc::UnboundedSender<Frame>,
}

impl PeerHandle {
    pub fn new(peer: PeerId, frames: mpsc::UnboundedSender<Frame>) -> PeerHandle {
        PeerHandle { peer, frames }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn send(&self, frame: Frame) {
        if self.frames.send(frame).is_err() {
            debug!("Peer {} is gone, dropping frame", self.peer);
        }
    }

    pub fn send_message(&self, message: &ServerMessage) {
        match bincode::serialize(message) {
            Ok(bytes) => self.send(Frame::Data(bytes)),
            Err(err) => error!("Failed to serialize message for peer {}: {err}", self.peer),
        }
    }

    /// Refuse the join. The writer closes the connection after this.
    pub fn deny(&self, reason: &str) {
        self.send(Frame::Deny(reason.to_string()));
    }

    pub fn disconnect(&self, reason: &str) {
        self.send(Frame::Disconnect(reason.to_string()));
    }
}

/// Listener plus the event funnel for every accepted connection.
pub struct NetworkServer {
    local_addr: SocketAddr,
    events: mpsc::UnboundedReceiver<PeerEvent>,
}

impl NetworkServer {
    pub async fn bind(addr: &str) -> io::Result<NetworkServer> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {local_addr}");

        let (event_tx, events) = mpsc::unbounded_channel();
        tokio::spawn(accept_loop(listener, event_tx));

        Ok(NetworkServer { local_addr, events })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn recv(&mut self) -> Option<PeerEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PeerEvent> {
        self.events.try_recv().ok()
    }
}

async fn accept_loop(listener: TcpListener, event_tx: mpsc::UnboundedSender<PeerEvent>) {
    let mut next_peer: PeerId = 1;
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let peer = next_peer;
                next_peer += 1;
                debug!("Peer {peer} connected from {addr}");
                spawn_peer(stream, peer, event_tx.clone());
            }
            Err(err) => {
                error!("Accept failed: {err}");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

fn spawn_peer(stream: TcpStream, peer: PeerId, event_tx: mpsc::UnboundedSender<PeerEvent>) {
    let (mut reader, mut writer) = stream.into_split();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Frame>();

    // Writer half: drain the queue until the peer is gone or a closing
    // frame went out.
    tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let closing = matches!(frame, Frame::Deny(_) | Frame::Disconnect(_));
            if let Err(err) = write_frame(&mut writer, &frame).await {
                debug!("Write to peer {peer} failed: {err}");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // Keepalive pings until the writer goes away.
    let ping_tx = frame_tx.clone();
    let ping_task = tokio::spawn(async move {
        let mut timer = interval(PING_INTERVAL);
        // First tick fires immediately.
        timer.tick().await;
        loop {
            timer.tick().await;
            if ping_tx.send(Frame::Ping(get_timestamp())).is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        let reason = read_loop(&mut reader, peer, frame_tx, &event_tx).await;
        ping_task.abort();
        let _ = event_tx.send(PeerEvent::Disconnected { peer, reason });
    });
}

async fn read_loop(
    reader: &mut OwnedReadHalf,
    peer: PeerId,
    frame_tx: mpsc::UnboundedSender<Frame>,
    event_tx: &mpsc::UnboundedSender<PeerEvent>,
) -> String {
    // Handshake: the first frame has to be a join request.
    let join = match timeout(READ_TIMEOUT, read_frame(reader)).await {
        Ok(Ok(Frame::Data(bytes))) => bytes,
        Ok(Ok(frame)) => {
            warn!("Peer {peer} opened with {frame:?} instead of a join request");
            return "Bad handshake".to_string();
        }
        Ok(Err(err)) => return close_reason(&err),
        Err(_) => return "Timed out".to_string(),
    };
    let (username, display_name) = match decode_join_request(&join) {
        Ok(parts) => parts,
        Err(err) => {
            warn!("Peer {peer} sent an unreadable join request: {err}");
            return "Bad handshake".to_string();
        }
    };
    let handle = PeerHandle::new(peer, frame_tx.clone());
    if event_tx
        .send(PeerEvent::ConnectRequest {
            peer,
            username,
            display_name,
            handle,
        })
        .is_err()
    {
        return "Server closed".to_string();
    }

    loop {
        match timeout(READ_TIMEOUT, read_frame(reader)).await {
            Ok(Ok(Frame::Data(bytes))) => {
                if event_tx.send(PeerEvent::Data { peer, bytes }).is_err() {
                    return "Server closed".to_string();
                }
            }
            Ok(Ok(Frame::Pong(sent))) => {
                let rtt = get_timestamp().saturating_sub(sent) as f32 / 1000.0;
                if event_tx.send(PeerEvent::Ping { peer, rtt }).is_err() {
                    return "Server closed".to_string();
                }
            }
            Ok(Ok(Frame::Ping(sent))) => {
                let _ = frame_tx.send(Frame::Pong(sent));
            }
            Ok(Ok(Frame::Disconnect(reason))) => return reason,
            Ok(Ok(Frame::Deny(_))) => warn!("Peer {peer} sent a deny frame"),
            Ok(Err(err)) => return close_reason(&err),
            Err(_) => return "Timed out".to_string(),
        }
    }
}

fn close_reason(err: &io::Error) -> String {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        "Connection closed".to_string()
    } else {
        format!("Connection error: {err}")
    }
}

async fn read_frame(reader: &mut OwnedReadHalf) -> io::Result<Frame> {
    let len = reader.read_u32_le().await?;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds limit"),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Frame::decode(&payload).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

async fn write_frame(writer: &mut OwnedWriteHalf, frame: &Frame) -> io::Result<()> {
    let payload = frame.encode();
    writer.write_u32_le(payload.len() as u32).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::encode_join_request;
    use tokio::time::Duration;

    async fn client_write(stream: &mut TcpStream, frame: &Frame) {
        let payload = frame.encode();
        stream.write_u32_le(payload.len() as u32).await.unwrap();
        stream.write_all(&payload).await.unwrap();
    }

    async fn client_read(stream: &mut TcpStream) -> Frame {
        let len = stream.read_u32_le().await.unwrap();
        let mut payload = vec![0u8; len as usize];
        stream.read_exact(&mut payload).await.unwrap();
        Frame::decode(&payload).unwrap()
    }

    async fn recv_event(server: &mut NetworkServer) -> PeerEvent {
        timeout(Duration::from_secs(2), server.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_handshake_produces_connect_request() {
        let mut server = NetworkServer::bind("127.0.0.1:0").await.unwrap();
        let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

        client_write(&mut stream, &Frame::Data(encode_join_request("alice", "Alice"))).await;

        match recv_event(&mut server).await {
            PeerEvent::ConnectRequest {
                username,
                display_name,
                ..
            } => {
                assert_eq!(username, "alice");
                assert_eq!(display_name, "Alice");
            }
            other => panic!("expected connect request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_sends_frames_to_the_peer() {
        let mut server = NetworkServer::bind("127.0.0.1:0").await.unwrap();
        let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
        client_write(&mut stream, &Frame::Data(encode_join_request("alice", "Alice"))).await;

        let handle = match recv_event(&mut server).await {
            PeerEvent::ConnectRequest { handle, .. } => handle,
            other => panic!("expected connect request, got {other:?}"),
        };
        handle.send(Frame::Disconnect("bye".to_string()));

        loop {
            match client_read(&mut stream).await {
                // Keepalives may interleave.
                Frame::Ping(_) => continue,
                Frame::Disconnect(reason) => {
                    assert_eq!(reason, "bye");
                    break;
                }
                other => panic!("expected disconnect, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_bad_handshake_reports_disconnect() {
        let mut server = NetworkServer::bind("127.0.0.1:0").await.unwrap();
        let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

        client_write(&mut stream, &Frame::Pong(7)).await;

        match recv_event(&mut server).await {
            PeerEvent::Disconnected { reason, .. } => assert_eq!(reason, "Bad handshake"),
            other => panic!("expected disconnect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_peer_closing_reports_disconnect() {
        let mut server = NetworkServer::bind("127.0.0.1:0").await.unwrap();
        let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
        client_write(&mut stream, &Frame::Data(encode_join_request("alice", "Alice"))).await;
        match recv_event(&mut server).await {
            PeerEvent::ConnectRequest { .. } => {}
            other => panic!("expected connect request, got {other:?}"),
        }

        drop(stream);

        match recv_event(&mut server).await {
            PeerEvent::Disconnected { reason, .. } => assert_eq!(reason, "Connection closed"),
            other => panic!("expected disconnect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_data_frames_reach_the_game() {
        let mut server = NetworkServer::bind("127.0.0.1:0").await.unwrap();
        let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
        client_write(&mut stream, &Frame::Data(encode_join_request("alice", "Alice"))).await;
        match recv_event(&mut server).await {
            PeerEvent::ConnectRequest { .. } => {}
            other => panic!("expected connect request, got {other:?}"),
        }

        client_write(&mut stream, &Frame::Data(vec![1, 2, 3])).await;

        match recv_event(&mut server).await {
            PeerEvent::Data { bytes, .. } => assert_eq!(bytes, vec![1, 2, 3]),
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_oversized_frame_drops_the_peer() {
        let mut server = NetworkServer::bind("127.0.0.1:0").await.unwrap();
        let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

        stream.write_u32_le(MAX_FRAME_LEN + 1).await.unwrap();

        match recv_event(&mut server).await {
            PeerEvent::Disconnected { reason, .. } => {
                assert!(reason.contains("exceeds limit"), "reason: {reason}");
            }
            other => panic!("expected disconnect, got {other:?}"),
        }
    }
}

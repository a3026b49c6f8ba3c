//! Client side of the connection: framing, keepalive replies and the
//! event queue the game loop drains.

use std::io;

use log::{debug, error, warn};
use shared::protocol::{
    encode_join_request, ClientMessage, Frame, ServerMessage, MAX_FRAME_LEN,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Connection lifecycle as seen by the game loop.
#[derive(Debug)]
pub enum NetEvent {
    Message(ServerMessage),
    /// The server refused the join request.
    Denied(String),
    Disconnected(String),
}

pub struct Connection {
    frames: mpsc::UnboundedSender<Frame>,
    events: mpsc::UnboundedReceiver<NetEvent>,
}

impl Connection {
    /// Open a connection and send the join request. Whether the server
    /// lets us in arrives later as a [`NetEvent`].
    pub async fn connect(addr: &str, username: &str, display_name: &str) -> io::Result<Connection> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();

        let _ = frame_tx.send(Frame::Data(encode_join_request(username, display_name)));

        tokio::spawn(write_loop(writer, frame_rx));
        let replies = frame_tx.clone();
        tokio::spawn(async move {
            let last = read_loop(reader, replies, &event_tx).await;
            let _ = event_tx.send(last);
        });

        Ok(Connection { frames: frame_tx, events })
    }

    pub fn send(&self, message: &ClientMessage) {
        match bincode::serialize(message) {
            Ok(bytes) => {
                if self.frames.send(Frame::Data(bytes)).is_err() {
                    debug!("Connection is gone, dropping message");
                }
            }
            Err(err) => error!("Failed to serialize message: {err}"),
        }
    }

    pub fn try_recv(&mut self) -> Option<NetEvent> {
        self.events.try_recv().ok()
    }

    pub async fn recv(&mut self) -> Option<NetEvent> {
        self.events.recv().await
    }

    /// Tell the server we are leaving. The writer closes after this.
    pub fn disconnect(&self, reason: &str) {
        let _ = self.frames.send(Frame::Disconnect(reason.to_string()));
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    replies: mpsc::UnboundedSender<Frame>,
    events: &mpsc::UnboundedSender<NetEvent>,
) -> NetEvent {
    loop {
        match read_frame(&mut reader).await {
            Ok(Frame::Data(bytes)) => match bincode::deserialize::<ServerMessage>(&bytes) {
                Ok(message) => {
                    if events.send(NetEvent::Message(message)).is_err() {
                        return NetEvent::Disconnected("Client closed".to_string());
                    }
                }
                Err(err) => warn!("Unreadable server message: {err}"),
            },
            Ok(Frame::Ping(timestamp)) => {
                let _ = replies.send(Frame::Pong(timestamp));
            }
            Ok(Frame::Pong(_)) => {}
            Ok(Frame::Deny(reason)) => return NetEvent::Denied(reason),
            Ok(Frame::Disconnect(reason)) => return NetEvent::Disconnected(reason),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                return NetEvent::Disconnected("Connection closed".to_string());
            }
            Err(err) => return NetEvent::Disconnected(format!("Connection error: {err}")),
        }
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut frames: mpsc::UnboundedReceiver<Frame>) {
    while let Some(frame) = frames.recv().await {
        let closing = matches!(frame, Frame::Disconnect(_));
        if let Err(err) = write_frame(&mut writer, &frame).await {
            debug!("Write failed: {err}");
            break;
        }
        if closing {
            break;
        }
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
pub(crate) fn test_pair() -> (
    Connection,
    mpsc::UnboundedSender<NetEvent>,
    mpsc::UnboundedReceiver<Frame>,
) {
    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let connection = Connection {
        frames: frame_tx,
        events: event_rx,
    };
    (connection, event_tx, frame_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::decode_join_request;
    use tokio::net::TcpListener;
    use tokio::time::{timeout, Duration};

    async fn server_read(stream: &mut TcpStream) -> Frame {
        let len = stream.read_u32_le().await.unwrap();
        let mut payload = vec![0u8; len as usize];
        stream.read_exact(&mut payload).await.unwrap();
        Frame::decode(&payload).unwrap()
    }

    async fn server_write(stream: &mut TcpStream, frame: &Frame) {
        let payload = frame.encode();
        stream.write_u32_le(payload.len() as u32).await.unwrap();
        stream.write_all(&payload).await.unwrap();
    }

    async fn recv_event(connection: &mut Connection) -> NetEvent {
        timeout(Duration::from_secs(2), connection.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_join_request_is_sent_first() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let addr = addr.to_string();
        let connect = Connection::connect(&addr, "alice", "Alice");
        let accept = listener.accept();
        let (_connection, accepted) = tokio::join!(connect, accept);
        let (mut stream, _) = accepted.unwrap();

        match server_read(&mut stream).await {
            Frame::Data(bytes) => {
                let (username, display_name) = decode_join_request(&bytes).unwrap();
                assert_eq!(username, "alice");
                assert_eq!(display_name, "Alice");
            }
            other => panic!("expected join request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pings_are_answered_with_pongs() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let addr = addr.to_string();
        let connect = Connection::connect(&addr, "alice", "Alice");
        let accept = listener.accept();
        let (_connection, accepted) = tokio::join!(connect, accept);
        let (mut stream, _) = accepted.unwrap();
        let _join = server_read(&mut stream).await;

        server_write(&mut stream, &Frame::Ping(1234)).await;

        match server_read(&mut stream).await {
            Frame::Pong(timestamp) => assert_eq!(timestamp, 1234),
            other => panic!("expected pong, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deny_and_disconnect_surface_as_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let addr = addr.to_string();
        let connect = Connection::connect(&addr, "alice", "Alice");
        let accept = listener.accept();
        let (connection, accepted) = tokio::join!(connect, accept);
        let mut connection = connection.unwrap();
        let (mut stream, _) = accepted.unwrap();
        let _join = server_read(&mut stream).await;

        server_write(&mut stream, &Frame::Deny("Empty username".to_string())).await;

        match recv_event(&mut connection).await {
            NetEvent::Denied(reason) => assert_eq!(reason, "Empty username"),
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_messages_arrive_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let addr = addr.to_string();
        let connect = Connection::connect(&addr, "alice", "Alice");
        let accept = listener.accept();
        let (connection, accepted) = tokio::join!(connect, accept);
        let mut connection = connection.unwrap();
        let (mut stream, _) = accepted.unwrap();
        let _join = server_read(&mut stream).await;

        for text in ["first", "second"] {
            let message = ServerMessage::Chat(shared::ChatMessage {
                from: None,
                timestamp_ms: 0,
                text: text.to_string(),
            });
            server_write(&mut stream, &Frame::Data(bincode::serialize(&message).unwrap())).await;
        }

        for expected in ["first", "second"] {
            match recv_event(&mut connection).await {
                NetEvent::Message(ServerMessage::Chat(chat)) => assert_eq!(chat.text, expected),
                other => panic!("expected chat, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_server_hanging_up_disconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let addr = addr.to_string();
        let connect = Connection::connect(&addr, "alice", "Alice");
        let accept = listener.accept();
        let (connection, accepted) = tokio::join!(connect, accept);
        let mut connection = connection.unwrap();
        let (stream, _) = accepted.unwrap();

        drop(stream);

        match recv_event(&mut connection).await {
            NetEvent::Disconnected(reason) => assert_eq!(reason, "Connection closed"),
            other => panic!("expected disconnect, got {other:?}"),
        }
    }
}

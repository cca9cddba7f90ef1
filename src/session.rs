//! Session struct definition
//!
//! Server-side state of one connected client: identity, room membership,
//! outbound channel and connect time.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{ClientId, RoomName};

/// Item on a session's outbound channel
///
/// The connection's writer task turns `Line` into `text + "\n"` and ends on
/// `Close`, which tears the connection down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Line(ServerMessage),
    Close,
}

/// Connected client information
#[derive(Debug)]
pub struct Session {
    /// Connection key in the session registry
    pub id: ClientId,
    /// Self-declared username, not unique
    pub username: String,
    /// Peer address of the connection
    pub addr: SocketAddr,
    /// Current room, if any
    pub room: Option<RoomName>,
    /// Server → Client channel
    pub sender: mpsc::Sender<Outbound>,
    pub connected_at: Instant,
}

impl Session {
    /// Create a session that is in no room yet
    pub fn new(
        id: ClientId,
        username: String,
        addr: SocketAddr,
        sender: mpsc::Sender<Outbound>,
    ) -> Self {
        Self {
            id,
            username,
            addr,
            room: None,
            sender,
            connected_at: Instant::now(),
        }
    }

    /// Send a line to this client
    ///
    /// Returns an error if the channel is closed (client disconnected).
    pub async fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender
            .send(Outbound::Line(msg))
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Ask the connection's writer to close the connection
    pub async fn close(&self) -> Result<(), SendError> {
        self.sender
            .send(Outbound::Close)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Whether the session currently sits in the given room
    pub fn is_in(&self, room: &RoomName) -> bool {
        self.room.as_ref() == Some(room)
    }

    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_session_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let session = Session::new(ClientId::new(), "alice".to_string(), addr(), tx);

        assert_eq!(session.username, "alice");
        assert!(session.room.is_none());
        assert!(!session.is_in(&RoomName::new("lobby")));
    }

    #[tokio::test]
    async fn test_session_send_and_close_order() {
        let (tx, mut rx) = mpsc::channel(32);
        let session = Session::new(ClientId::new(), "alice".to_string(), addr(), tx);

        session.send(ServerMessage::YouWereKicked).await.unwrap();
        session.close().await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(Outbound::Line(ServerMessage::YouWereKicked))
        );
        assert_eq!(rx.recv().await, Some(Outbound::Close));
    }

    #[tokio::test]
    async fn test_session_send_after_receiver_dropped() {
        let (tx, rx) = mpsc::channel(32);
        let session = Session::new(ClientId::new(), "alice".to_string(), addr(), tx);
        drop(rx);

        assert!(session.send(ServerMessage::Welcome).await.is_err());
    }
}

//! ChatServer Actor implementation
//!
//! The central actor that owns all shared state: the session registry, the
//! room registry and the ban list. Every read or mutation of any of them is
//! a `ServerCommand` processed one at a time, so the actor's mailbox is the
//! single serialization domain for the whole relay. Broadcasts are fanned
//! out from inside the actor, which means a slow recipient holds up every
//! other command until its channel has room again.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::{AppError, ProtocolError};
use crate::message::ServerMessage;
use crate::room::Room;
use crate::session::{Outbound, Session};
use crate::status::{RoomStatus, SessionStatus, StatusSnapshot};
use crate::types::{ClientId, RoomName};

/// Commands sent from connection handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Accept gate: is this address on the ban list?
    CheckBan {
        addr: IpAddr,
        reply: oneshot::Sender<bool>,
    },
    /// Username received, register the session
    Connect {
        client_id: ClientId,
        username: String,
        addr: SocketAddr,
        sender: mpsc::Sender<Outbound>,
    },
    /// Connection ended, for whatever reason
    Disconnect {
        client_id: ClientId,
    },
    /// `/create <room>`
    CreateRoom {
        client_id: ClientId,
        room: String,
    },
    /// `/join <room>`
    JoinRoom {
        client_id: ClientId,
        room: String,
    },
    /// `/ban <user>`
    Ban {
        client_id: ClientId,
        target: String,
    },
    /// `/kick <user>`
    Kick {
        client_id: ClientId,
        target: String,
    },
    /// `/exit`
    Exit {
        client_id: ClientId,
    },
    /// `/status typing`, or the notice ahead of a chat message. The reply,
    /// when asked for, tells whether the caller is in a room.
    Typing {
        client_id: ClientId,
        reply: Option<oneshot::Sender<bool>>,
    },
    /// `/status`
    Status {
        client_id: ClientId,
    },
    /// Free-text chat message
    Chat {
        client_id: ClientId,
        content: String,
    },
    /// Deliver a line to one session only
    Reply {
        client_id: ClientId,
        message: ServerMessage,
    },
    /// Status reporter query
    Snapshot {
        reply: oneshot::Sender<StatusSnapshot>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Moderation {
    Ban,
    Kick,
}

/// Cloneable front door to a running ChatServer
#[derive(Debug, Clone)]
pub struct ServerHandle {
    sender: mpsc::Sender<ServerCommand>,
}

impl ServerHandle {
    pub fn new(sender: mpsc::Sender<ServerCommand>) -> Self {
        Self { sender }
    }

    /// Queue a command for the actor
    pub async fn send(&self, cmd: ServerCommand) -> Result<(), AppError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| AppError::ChannelSend)
    }

    /// Check an address against the ban list
    pub async fn is_banned(&self, addr: IpAddr) -> Result<bool, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(ServerCommand::CheckBan { addr, reply }).await?;
        rx.await.map_err(|_| AppError::ChannelSend)
    }

    /// Announce that a session is typing. Returns false when it is in no
    /// room, in which case nothing was announced.
    pub async fn announce_typing(&self, client_id: ClientId) -> Result<bool, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(ServerCommand::Typing {
            client_id,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| AppError::ChannelSend)
    }

    /// Take a consistent snapshot of both registries
    pub async fn snapshot(&self) -> Result<StatusSnapshot, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(ServerCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| AppError::ChannelSend)
    }
}

/// The main ChatServer actor
pub struct ChatServer {
    /// Session registry: ClientId -> Session
    sessions: HashMap<ClientId, Session>,
    /// Room registry: RoomName -> Room
    rooms: HashMap<RoomName, Room>,
    /// Banned peer IPs
    banned: HashSet<IpAddr>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            sessions: HashMap::new(),
            rooms: HashMap::new(),
            banned: HashSet::new(),
            receiver,
        }
    }

    /// Start a ChatServer on its own task and return a handle to it
    pub fn spawn(buffer: usize) -> ServerHandle {
        let (tx, rx) = mpsc::channel(buffer);
        tokio::spawn(ChatServer::new(rx).run());
        ServerHandle::new(tx)
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::CheckBan { addr, reply } => {
                let _ = reply.send(self.banned.contains(&addr));
            }
            ServerCommand::Connect {
                client_id,
                username,
                addr,
                sender,
            } => {
                self.handle_connect(client_id, username, addr, sender).await;
            }
            ServerCommand::Disconnect { client_id } => {
                self.handle_disconnect(client_id).await;
            }
            ServerCommand::CreateRoom { client_id, room } => {
                self.handle_create_room(client_id, room).await;
            }
            ServerCommand::JoinRoom { client_id, room } => {
                self.handle_join_room(client_id, room).await;
            }
            ServerCommand::Ban { client_id, target } => {
                self.handle_moderation(client_id, target, Moderation::Ban)
                    .await;
            }
            ServerCommand::Kick { client_id, target } => {
                self.handle_moderation(client_id, target, Moderation::Kick)
                    .await;
            }
            ServerCommand::Exit { client_id } => {
                self.handle_exit(client_id).await;
            }
            ServerCommand::Typing { client_id, reply } => {
                let in_room = self.handle_typing(client_id).await;
                if let Some(reply) = reply {
                    let _ = reply.send(in_room);
                }
            }
            ServerCommand::Status { client_id } => {
                self.handle_status(client_id).await;
            }
            ServerCommand::Chat { client_id, content } => {
                self.handle_chat(client_id, content).await;
            }
            ServerCommand::Reply { client_id, message } => {
                if let Some(session) = self.sessions.get(&client_id) {
                    let _ = session.send(message).await;
                }
            }
            ServerCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Handle session registration
    async fn handle_connect(
        &mut self,
        client_id: ClientId,
        username: String,
        addr: SocketAddr,
        sender: mpsc::Sender<Outbound>,
    ) {
        info!("Client {} registered as '{}' from {}", client_id, username, addr);
        let session = Session::new(client_id, username, addr, sender);
        let _ = session.send(ServerMessage::Welcome).await;
        self.sessions.insert(client_id, session);
        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.sessions.len(),
            self.rooms.len()
        );
    }

    /// Teardown shared by every termination path
    ///
    /// Idempotent: a session already removed by a ban or kick is ignored,
    /// so no second departure notice goes out.
    async fn handle_disconnect(&mut self, client_id: ClientId) {
        let Some(session) = self.remove_session(client_id) else {
            debug!("Client {} already removed", client_id);
            return;
        };

        info!("Client {} ('{}') disconnected", client_id, session.username);

        if let Some(room) = &session.room {
            self.broadcast_to_room(
                room,
                ServerMessage::Disconnected {
                    username: session.username.clone(),
                },
                Some(client_id),
            )
            .await;
        }

        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.sessions.len(),
            self.rooms.len()
        );
    }

    /// Handle room creation
    ///
    /// An existing room with the same name is replaced. Its other members
    /// drop out of it and end up in no room.
    async fn handle_create_room(&mut self, client_id: ClientId, room: String) {
        let name = RoomName::new(room);

        let Some(session) = self.sessions.get_mut(&client_id) else {
            return;
        };

        if let Some(previous) = session.room.replace(name.clone()) {
            if let Some(previous_room) = self.rooms.get_mut(&previous) {
                previous_room.remove_member(client_id);
            }
        }

        let room = Room::new(name.clone(), client_id);
        if let Some(replaced) = self.rooms.insert(name.clone(), room) {
            for member in replaced.members {
                if member == client_id {
                    continue;
                }
                if let Some(session) = self.sessions.get_mut(&member) {
                    if session.is_in(&name) {
                        session.room = None;
                    }
                }
            }
            debug!("Room {} replaced", name);
        }

        info!("Client {} created room {}", client_id, name);

        if let Some(session) = self.sessions.get(&client_id) {
            let _ = session
                .send(ServerMessage::RoomCreated {
                    room: name.to_string(),
                })
                .await;
        }
    }

    /// Handle room joining
    async fn handle_join_room(&mut self, client_id: ClientId, room: String) {
        let Some(session) = self.sessions.get_mut(&client_id) else {
            return;
        };

        let Some(target) = self.rooms.get_mut(room.as_str()) else {
            let _ = session.send(ProtocolError::RoomNotFound(room).into()).await;
            return;
        };

        target.add_member(client_id);
        let name = target.name.clone();

        if let Some(previous) = session.room.replace(name.clone()) {
            if previous != name {
                if let Some(previous_room) = self.rooms.get_mut(&previous) {
                    previous_room.remove_member(client_id);
                }
            }
        }

        info!("Client {} joined room {}", client_id, name);

        let _ = session
            .send(ServerMessage::RoomJoined {
                room: name.to_string(),
            })
            .await;
    }

    /// Handle ban and kick
    ///
    /// The target is the first session with a matching username in registry
    /// iteration order. No authorization check is made on the issuer.
    async fn handle_moderation(&mut self, client_id: ClientId, target: String, action: Moderation) {
        let Some(issuer) = self.sessions.get(&client_id) else {
            return;
        };
        let issuer_room = issuer.room.clone();

        let Some(target_id) = self.find_by_username(&target) else {
            let _ = issuer.send(ProtocolError::UserNotFound(target).into()).await;
            return;
        };

        let Some(victim) = self.remove_session(target_id) else {
            return;
        };

        let (notice, announcement) = match action {
            Moderation::Ban => {
                self.banned.insert(victim.addr.ip());
                (
                    ServerMessage::YouWereBanned,
                    ServerMessage::UserBanned {
                        username: victim.username.clone(),
                    },
                )
            }
            Moderation::Kick => (
                ServerMessage::YouWereKicked,
                ServerMessage::UserKicked {
                    username: victim.username.clone(),
                },
            ),
        };

        let _ = victim.send(notice).await;
        let _ = victim.close().await;

        info!(
            "Client {} {:?} '{}' ({})",
            client_id, action, victim.username, victim.addr
        );

        self.broadcast_server_wide(announcement, client_id, issuer_room.as_ref())
            .await;
    }

    /// Handle `/exit`: leave the current room with an offline notice
    async fn handle_exit(&mut self, client_id: ClientId) {
        let Some(session) = self.sessions.get_mut(&client_id) else {
            return;
        };

        let Some(room) = session.room.take() else {
            return;
        };
        let username = session.username.clone();

        self.broadcast_to_room(&room, ServerMessage::Offline { username }, Some(client_id))
            .await;

        if let Some(room) = self.rooms.get_mut(&room) {
            room.remove_member(client_id);
        }

        info!("Client {} left room {}", client_id, room);
    }

    /// Handle typing notice
    async fn handle_typing(&mut self, client_id: ClientId) -> bool {
        let Some(session) = self.sessions.get(&client_id) else {
            return false;
        };

        let Some(room) = &session.room else {
            return false;
        };

        self.broadcast_to_room(
            room,
            ServerMessage::Typing {
                username: session.username.clone(),
            },
            Some(client_id),
        )
        .await;

        true
    }

    /// Handle `/status`: member list to the caller only
    async fn handle_status(&mut self, client_id: ClientId) {
        let Some(session) = self.sessions.get(&client_id) else {
            return;
        };

        let Some(room) = session.room.as_ref().and_then(|name| self.rooms.get(name)) else {
            return;
        };

        let mut users: Vec<String> = room
            .members
            .iter()
            .filter_map(|id| self.sessions.get(id))
            .map(|member| member.username.clone())
            .collect();
        users.sort();

        let _ = session
            .send(ServerMessage::OnlineUsers {
                room: room.name.to_string(),
                users,
            })
            .await;
    }

    /// Handle chat message
    ///
    /// Dropped silently when the sender is in no room.
    async fn handle_chat(&mut self, client_id: ClientId, content: String) {
        let Some(session) = self.sessions.get(&client_id) else {
            return;
        };

        debug!("Received message from {}: {}", session.username, content);

        let Some(room) = &session.room else {
            return;
        };

        self.broadcast_to_room(
            room,
            ServerMessage::Chat {
                from: session.username.clone(),
                content,
            },
            Some(client_id),
        )
        .await;
    }

    /// Deliver to every member of `room` except `exclude`
    ///
    /// Delivery failures are ignored.
    async fn broadcast_to_room(
        &self,
        room: &RoomName,
        msg: ServerMessage,
        exclude: Option<ClientId>,
    ) {
        let Some(room) = self.rooms.get(room) else {
            return;
        };

        for member_id in &room.members {
            if Some(*member_id) == exclude {
                continue;
            }
            if let Some(member) = self.sessions.get(member_id) {
                let _ = member.send(msg.clone()).await;
            }
        }
    }

    /// Deliver to every registered session sharing `room` with `exclude`
    ///
    /// Scans the whole session registry rather than the room's member set,
    /// and sessions in no room match an issuer in no room.
    async fn broadcast_server_wide(
        &self,
        msg: ServerMessage,
        exclude: ClientId,
        room: Option<&RoomName>,
    ) {
        for session in self.sessions.values() {
            if session.id != exclude && session.room.as_ref() == room {
                let _ = session.send(msg.clone()).await;
            }
        }
    }

    /// First session with this username, in registry iteration order
    fn find_by_username(&self, username: &str) -> Option<ClientId> {
        self.sessions
            .values()
            .find(|session| session.username == username)
            .map(|session| session.id)
    }

    /// Remove a session from the session registry and from its room
    ///
    /// The returned session keeps its `room` so callers can announce the
    /// departure. Returns None if it was already gone.
    fn remove_session(&mut self, client_id: ClientId) -> Option<Session> {
        let session = self.sessions.remove(&client_id)?;
        if let Some(room) = session.room.as_ref().and_then(|name| self.rooms.get_mut(name)) {
            room.remove_member(client_id);
        }
        Some(session)
    }

    fn snapshot(&self) -> StatusSnapshot {
        let mut sessions: Vec<SessionStatus> = self
            .sessions
            .values()
            .map(|session| SessionStatus {
                username: session.username.clone(),
                address: session.addr.to_string(),
                room: session.room.as_ref().map(|room| room.to_string()),
                connected_secs: session.connected_for().as_secs(),
            })
            .collect();
        sessions.sort_by(|a, b| a.username.cmp(&b.username));

        let mut rooms: Vec<RoomStatus> = self
            .rooms
            .values()
            .map(|room| RoomStatus {
                name: room.name.to_string(),
                members: room.member_count(),
            })
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));

        StatusSnapshot { sessions, rooms }
    }
}

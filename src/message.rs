//! Message protocol definitions
//!
//! Line-based bidirectional protocol. Every client line is classified into a
//! [`Command`]; every server line is a [`ServerMessage`] rendered through
//! `Display` and terminated by `\n` on the wire.

use std::fmt;

use crate::error::ProtocolError;

/// Client → Server line
///
/// Classification follows a fixed precedence: the first matching pattern
/// wins, and anything unmatched is a plain chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/create <name>`
    Create { room: String },
    /// `/join <name>`
    Join { room: String },
    /// `/help`
    Help,
    /// `/ban <user>`
    Ban { target: String },
    /// `/kick <user>`
    Kick { target: String },
    /// `/exit`
    Exit,
    /// `/status typing`
    Typing,
    /// `/status`
    Status,
    /// `/gpt <query>`
    Gpt { query: String },
    /// Free text
    Chat { content: String },
}

impl Command {
    /// Classify one line. The line is trimmed first.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();

        if let Some(room) = line.strip_prefix("/create ") {
            return Command::Create {
                room: room.trim().to_string(),
            };
        }
        if let Some(room) = line.strip_prefix("/join ") {
            return Command::Join {
                room: room.trim().to_string(),
            };
        }
        if line == "/help" {
            return Command::Help;
        }
        if let Some(target) = line.strip_prefix("/ban ") {
            return Command::Ban {
                target: target.trim().to_string(),
            };
        }
        if let Some(target) = line.strip_prefix("/kick ") {
            return Command::Kick {
                target: target.trim().to_string(),
            };
        }
        if line == "/exit" {
            return Command::Exit;
        }
        if line.starts_with("/status typing") {
            return Command::Typing;
        }
        if line == "/status" {
            return Command::Status;
        }
        if let Some(query) = line.strip_prefix("/gpt ") {
            return Command::Gpt {
                query: query.trim().to_string(),
            };
        }

        Command::Chat {
            content: line.to_string(),
        }
    }
}

/// Server → Client line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Connection rejected at accept time
    Banned,
    /// Session established
    Welcome,
    /// Room created (or replaced)
    RoomCreated { room: String },
    /// Room joined
    RoomJoined { room: String },
    /// `/join` on an unknown room
    RoomNotFound { room: String },
    /// `/ban` or `/kick` on an unknown user
    UserNotFound { username: String },
    /// Sent to the target of a ban
    YouWereBanned,
    /// Sent to the target of a kick
    YouWereKicked,
    /// Peers of the moderator after a ban
    UserBanned { username: String },
    /// Peers of the moderator after a kick
    UserKicked { username: String },
    /// Explicit `/exit` from a room
    Offline { username: String },
    /// Connection lost while in a room
    Disconnected { username: String },
    /// Typing notice
    Typing { username: String },
    /// Chat message
    Chat { from: String, content: String },
    /// Member list of the caller's room
    OnlineUsers { room: String, users: Vec<String> },
    /// Command summary
    Help,
    /// Completion reply
    CompletionReply { reply: String },
    /// Completion failure
    CompletionFailed { reason: String },
}

const HELP_LINES: &[&str] = &[
    "/create <room>: create a chat room and enter it",
    "/join <room>: join an existing chat room",
    "/status: list the users in your chat room",
    "/status typing: tell your chat room you are typing",
    "/ban <username>: ban a user from the server",
    "/kick <username>: kick a user from the server",
    "/gpt <question>: ask the assistant a question",
    "/exit: leave the server",
];

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Banned => write!(f, "You are banned from this server."),
            ServerMessage::Welcome => write!(
                f,
                "Welcome to the server! Type \"/help\" to get a list of commands."
            ),
            ServerMessage::RoomCreated { room } => write!(f, "Chat room '{}' created.", room),
            ServerMessage::RoomJoined { room } => write!(f, "Joined chat room '{}'.", room),
            ServerMessage::RoomNotFound { room } => {
                write!(f, "Chat room '{}' does not exist.", room)
            }
            ServerMessage::UserNotFound { username } => {
                write!(f, "User '{}' not found.", username)
            }
            ServerMessage::YouWereBanned => write!(f, "You have been banned from the server."),
            ServerMessage::YouWereKicked => write!(f, "You have been kicked from the server."),
            ServerMessage::UserBanned { username } => {
                write!(f, "User {} has been banned.", username)
            }
            ServerMessage::UserKicked { username } => {
                write!(f, "User {} has been kicked.", username)
            }
            ServerMessage::Offline { username } => write!(f, "{} is now offline.", username),
            ServerMessage::Disconnected { username } => {
                write!(f, "User {} has disconnected.", username)
            }
            ServerMessage::Typing { username } => write!(f, "{} is typing...", username),
            ServerMessage::Chat { from, content } => write!(f, "{}: {}", from, content),
            ServerMessage::OnlineUsers { room, users } => {
                write!(f, "Online users in room {}: {}", room, users.join(", "))
            }
            ServerMessage::Help => write!(f, "{}", HELP_LINES.join("\n")),
            ServerMessage::CompletionReply { reply } => write!(f, "GPT response: {}", reply),
            ServerMessage::CompletionFailed { reason } => {
                write!(f, "Error querying GPT: {}", reason)
            }
        }
    }
}

/// Convert ProtocolError to ServerMessage for client notification
impl From<ProtocolError> for ServerMessage {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::RoomNotFound(room) => ServerMessage::RoomNotFound { room },
            ProtocolError::UserNotFound(username) => ServerMessage::UserNotFound { username },
            ProtocolError::Completion(e) => ServerMessage::CompletionFailed {
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;

    #[test]
    fn test_parse_room_commands() {
        assert_eq!(
            Command::parse("/create lobby\n"),
            Command::Create {
                room: "lobby".to_string()
            }
        );
        assert_eq!(
            Command::parse("  /join lobby  "),
            Command::Join {
                room: "lobby".to_string()
            }
        );
    }

    #[test]
    fn test_parse_moderation_commands() {
        assert_eq!(
            Command::parse("/ban bob"),
            Command::Ban {
                target: "bob".to_string()
            }
        );
        assert_eq!(
            Command::parse("/kick bob"),
            Command::Kick {
                target: "bob".to_string()
            }
        );
    }

    #[test]
    fn test_parse_status_precedence() {
        assert_eq!(Command::parse("/status typing"), Command::Typing);
        assert_eq!(Command::parse("/status"), Command::Status);
        assert_eq!(
            Command::parse("/status of things"),
            Command::Chat {
                content: "/status of things".to_string()
            }
        );
    }

    #[test]
    fn test_parse_bare_keyword_without_argument_is_chat() {
        // "/create " trims down to "/create", which no longer matches
        assert_eq!(
            Command::parse("/create "),
            Command::Chat {
                content: "/create".to_string()
            }
        );
        assert_eq!(
            Command::parse("/gpt"),
            Command::Chat {
                content: "/gpt".to_string()
            }
        );
    }

    #[test]
    fn test_parse_exit_help_and_gpt() {
        assert_eq!(Command::parse("/exit"), Command::Exit);
        assert_eq!(Command::parse("/help\r\n"), Command::Help);
        assert_eq!(
            Command::parse("/gpt what is rust?"),
            Command::Gpt {
                query: "what is rust?".to_string()
            }
        );
        assert_eq!(
            Command::parse("hello there"),
            Command::Chat {
                content: "hello there".to_string()
            }
        );
    }

    #[test]
    fn test_server_message_lines() {
        assert_eq!(
            ServerMessage::RoomCreated {
                room: "lobby".to_string()
            }
            .to_string(),
            "Chat room 'lobby' created."
        );
        assert_eq!(
            ServerMessage::Chat {
                from: "alice".to_string(),
                content: "hello".to_string()
            }
            .to_string(),
            "alice: hello"
        );
        assert_eq!(
            ServerMessage::OnlineUsers {
                room: "lobby".to_string(),
                users: vec!["alice".to_string(), "bob".to_string()],
            }
            .to_string(),
            "Online users in room lobby: alice, bob"
        );
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = ServerMessage::Help.to_string();
        for command in ["/create", "/join", "/status", "/ban", "/kick", "/gpt", "/exit"] {
            assert!(help.contains(command), "missing {command}");
        }
        assert!(!help.ends_with('\n'));
    }

    #[test]
    fn test_protocol_error_to_message() {
        let msg: ServerMessage = ProtocolError::RoomNotFound("nowhere".to_string()).into();
        assert_eq!(msg.to_string(), "Chat room 'nowhere' does not exist.");

        let msg: ServerMessage = ProtocolError::UserNotFound("ghost".to_string()).into();
        assert_eq!(msg.to_string(), "User 'ghost' not found.");

        let msg: ServerMessage = ProtocolError::Completion(CompletionError::Unavailable).into();
        assert_eq!(
            msg.to_string(),
            "Error querying GPT: completion service is not configured"
        );
    }
}

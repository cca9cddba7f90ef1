//! Multi-Room Line Chat Relay Library
//!
//! A text chat relay built on tokio. Clients connect over TCP (optionally
//! TLS), send a username as their first line, then create or join named
//! rooms and exchange newline-delimited messages.
//!
//! # Features
//! - Ban list checked when a connection is accepted
//! - Room creation and joining by name
//! - Room-scoped chat with typing notices and a pacing delay
//! - `/status` member listing
//! - Ban and kick moderation
//! - `/gpt` questions forwarded to a completion backend
//! - HTTP status endpoint with a snapshot of sessions and rooms
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` owns the session registry, room registry and ban list
//! - Each connection runs a `handler` task that parses lines into commands
//!   and forwards them to the server
//! - Each session has a writer task draining its outbound channel
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio::net::TcpListener;
//! use chat_relay::{serve, ChatServer, DisabledCompletion, SessionContext};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:9000").await.unwrap();
//!     let context = SessionContext {
//!         server: ChatServer::spawn(256),
//!         completion: Arc::new(DisabledCompletion),
//!         typing_delay: Duration::from_millis(500),
//!     };
//!     serve(listener, None, context).await;
//! }
//! ```

pub mod completion;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod room;
pub mod server;
pub mod session;
pub mod status;
pub mod tls;
pub mod types;

// Re-export main types for convenience
pub use completion::{CompletionQuery, DisabledCompletion, OpenAiCompletion};
pub use config::ServerConfig;
pub use error::{AppError, CompletionError, ProtocolError, SendError};
pub use handler::{handle_connection, serve, SessionContext};
pub use message::{Command, ServerMessage};
pub use room::Room;
pub use server::{ChatServer, ServerCommand, ServerHandle};
pub use session::{Outbound, Session};
pub use status::StatusSnapshot;
pub use types::{ClientId, RoomName};

//! Error types for the chat relay
//!
//! Defines application-level errors, protocol errors reported to clients,
//! message send errors and completion collaborator errors. Uses thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Fatal errors: bootstrap failures and connection termination.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal for the connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS configuration error (fatal at startup)
    #[error("TLS error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    /// Invalid configuration (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel send error (fatal - server actor gone)
    #[error("Channel send error")]
    ChannelSend,
}

/// Protocol misuse and collaborator failures
///
/// Never fatal: each one becomes a single response line to the issuing
/// client and leaves the registries untouched.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// No room registered under the given name
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// No connected session with the given username
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Completion collaborator failed
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),
}

/// Message send errors
///
/// Occurs when attempting to send messages through closed channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Completion collaborator errors
#[derive(Debug, Error)]
pub enum CompletionError {
    /// No completion backend configured
    #[error("completion service is not configured")]
    Unavailable,

    /// Transport or HTTP status failure
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered without any choice
    #[error("empty response from completion service")]
    EmptyResponse,
}

//! Connection handler
//!
//! Accept loop, accept gate, session establishment and the per-session
//! command interpreter. Registry state is only touched through the
//! ChatServer actor; this module owns the socket.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::completion::CompletionQuery;
use crate::error::{AppError, ProtocolError};
use crate::message::{Command, ServerMessage};
use crate::server::{ServerCommand, ServerHandle};
use crate::session::Outbound;
use crate::types::ClientId;

/// Outbound channel capacity per session
const CLIENT_BUFFER_SIZE: usize = 32;

/// Shared dependencies of every connection handler
#[derive(Clone)]
pub struct SessionContext {
    pub server: ServerHandle,
    pub completion: Arc<dyn CompletionQuery>,
    /// Pause between the typing notice and the chat message itself
    pub typing_delay: Duration,
}

/// Accept connections forever, one task per connection
///
/// With an acceptor the TLS handshake runs before the accept gate.
pub async fn serve(listener: TcpListener, tls: Option<TlsAcceptor>, context: SessionContext) {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };

        info!("New connection from {}", peer_addr);
        let context = context.clone();
        let tls = tls.clone();

        tokio::spawn(async move {
            let result = match tls {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(stream) => handle_connection(stream, peer_addr, context).await,
                    Err(e) => Err(AppError::Io(e)),
                },
                None => handle_connection(stream, peer_addr, context).await,
            };

            if let Err(e) = result {
                error!("Connection handler error: {}", e);
            }
        });
    }
}

/// Handle one accepted connection from ban check to teardown
pub async fn handle_connection<S>(
    stream: S,
    peer_addr: SocketAddr,
    context: SessionContext,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (reader, mut writer) = tokio::io::split(stream);

    // Accept gate
    if context.server.is_banned(peer_addr.ip()).await? {
        info!("Rejected banned address {}", peer_addr);
        writer
            .write_all(format!("{}\n", ServerMessage::Banned).as_bytes())
            .await?;
        let _ = writer.shutdown().await;
        return Ok(());
    }

    let mut reader = BufReader::new(reader);

    // First line is the username
    let Some(username) = read_line_lossy(&mut reader, &mut Vec::new()).await? else {
        debug!("{} closed before sending a username", peer_addr);
        return Ok(());
    };
    let username = username.trim().to_string();

    let client_id = ClientId::new();
    let (msg_tx, msg_rx) = mpsc::channel::<Outbound>(CLIENT_BUFFER_SIZE);

    context
        .server
        .send(ServerCommand::Connect {
            client_id,
            username,
            addr: peer_addr,
            sender: msg_tx,
        })
        .await?;

    let mut write_task = tokio::spawn(write_outbound(writer, msg_rx));

    // The writer ends on a server-side close (ban, kick) or a write error;
    // either way the reader is cancelled.
    let writer_done = tokio::select! {
        _ = interpret(&mut reader, client_id, &context) => false,
        _ = &mut write_task => true,
    };

    let _ = context
        .server
        .send(ServerCommand::Disconnect { client_id })
        .await;

    // Disconnect drops the session's sender, so the writer drains and stops
    if !writer_done {
        let _ = write_task.await;
    }

    debug!("Handler for client {} finished", client_id);

    Ok(())
}

/// Command interpreter: runs until end-of-stream, a read error, `/exit`,
/// or the server actor going away.
async fn interpret<R>(reader: &mut R, client_id: ClientId, context: &SessionContext)
where
    R: AsyncBufRead + Unpin,
{
    let server = &context.server;
    let mut buf = Vec::new();

    loop {
        let line = match read_line_lossy(reader, &mut buf).await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Client {} closed the connection", client_id);
                return;
            }
            Err(e) => {
                debug!("Read error from client {}: {}", client_id, e);
                return;
            }
        };

        let result = match Command::parse(&line) {
            Command::Create { room } => {
                server
                    .send(ServerCommand::CreateRoom { client_id, room })
                    .await
            }
            Command::Join { room } => server.send(ServerCommand::JoinRoom { client_id, room }).await,
            Command::Help => {
                server
                    .send(ServerCommand::Reply {
                        client_id,
                        message: ServerMessage::Help,
                    })
                    .await
            }
            Command::Ban { target } => server.send(ServerCommand::Ban { client_id, target }).await,
            Command::Kick { target } => {
                server
                    .send(ServerCommand::Kick { client_id, target })
                    .await
            }
            Command::Exit => {
                let _ = server.send(ServerCommand::Exit { client_id }).await;
                return;
            }
            Command::Typing => {
                server
                    .send(ServerCommand::Typing {
                        client_id,
                        reply: None,
                    })
                    .await
            }
            Command::Status => server.send(ServerCommand::Status { client_id }).await,
            Command::Gpt { query } => {
                let message = match context.completion.query(&query).await {
                    Ok(reply) => ServerMessage::CompletionReply { reply },
                    Err(e) => {
                        warn!("Completion query from client {} failed: {}", client_id, e);
                        ProtocolError::from(e).into()
                    }
                };
                server.send(ServerCommand::Reply { client_id, message }).await
            }
            // Outside a room the line is dropped without the pacing delay
            Command::Chat { content } => match server.announce_typing(client_id).await {
                Ok(true) => {
                    tokio::time::sleep(context.typing_delay).await;
                    server.send(ServerCommand::Chat { client_id, content }).await
                }
                Ok(false) => {
                    debug!("Client {} is in no room, dropping chat line", client_id);
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };

        if result.is_err() {
            warn!("Server closed, ending session {}", client_id);
            return;
        }
    }
}

/// Read one line without its terminator, replacing invalid UTF-8 with
/// U+FFFD. `None` at end-of-stream.
async fn read_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// Writer task: drains a session's outbound channel onto the connection
async fn write_outbound<W>(mut writer: W, mut receiver: mpsc::Receiver<Outbound>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = receiver.recv().await {
        let Outbound::Line(msg) = item else {
            break;
        };

        let line = format!("{}\n", msg);
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            debug!("Write failed, ending write task: {}", e);
            break;
        }
    }

    let _ = writer.shutdown().await;
}

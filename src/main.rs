//! Chat Relay - Entry Point
//!
//! Loads configuration, starts the ChatServer actor and the status endpoint,
//! then accepts chat connections.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_relay::completion::{CompletionQuery, DisabledCompletion, OpenAiCompletion};
use chat_relay::status::run_status_server;
use chat_relay::tls::load_tls;
use chat_relay::{serve, ChatServer, ServerConfig, SessionContext};

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let tls = match &config.tls {
        Some(paths) => {
            let acceptor = load_tls(&paths.cert, &paths.key)?;
            info!("TLS enabled with certificate {}", paths.cert.display());
            Some(acceptor)
        }
        None => None,
    };

    // Bind everything up front so a bad address fails the process
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Chat relay listening on {}", config.bind_addr);

    let status_listener = match &config.status_addr {
        Some(addr) => Some(TcpListener::bind(addr).await?),
        None => None,
    };

    let server = ChatServer::spawn(CHANNEL_BUFFER_SIZE);
    info!("ChatServer actor started");

    if let Some(status_listener) = status_listener {
        tokio::spawn(run_status_server(status_listener, server.clone()));
    }

    let completion: Arc<dyn CompletionQuery> = match config.openai_api_key.clone() {
        Some(key) => {
            info!("Completion backend enabled (model {})", config.completion_model);
            Arc::new(OpenAiCompletion::new(key, config.completion_model.clone()))
        }
        None => {
            info!("OPENAI_API_KEY not set, /gpt is disabled");
            Arc::new(DisabledCompletion)
        }
    };

    let context = SessionContext {
        server,
        completion,
        typing_delay: config.typing_delay,
    };

    serve(listener, tls, context).await;

    Ok(())
}

//! Status reporting
//!
//! Read-only snapshot of the session and room registries, plus the HTTP
//! endpoint that serves it. Snapshots are produced by the server actor, so
//! they never observe a half-applied mutation.

use std::fmt;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::server::ServerHandle;

/// One connected session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub username: String,
    pub address: String,
    pub room: Option<String>,
    pub connected_secs: u64,
}

/// One registered room
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomStatus {
    pub name: String,
    pub members: usize,
}

/// Point-in-time view of both registries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub sessions: Vec<SessionStatus>,
    pub rooms: Vec<RoomStatus>,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Server Activity:")?;
        for session in &self.sessions {
            writeln!(
                f,
                "User: {} - Connected for: {}s",
                session.username, session.connected_secs
            )?;
        }
        for room in &self.rooms {
            writeln!(f, "Room: {} - Users: {}", room.name, room.members)?;
        }
        Ok(())
    }
}

/// Build the status router
///
/// - `GET /admin`: plain-text snapshot
/// - `GET /admin.json`: the same snapshot as JSON
pub fn router(handle: ServerHandle) -> Router {
    Router::new()
        .route("/admin", get(admin_text))
        .route("/admin.json", get(admin_json))
        .with_state(handle)
}

async fn admin_text(State(handle): State<ServerHandle>) -> Result<String, StatusCode> {
    handle
        .snapshot()
        .await
        .map(|snapshot| snapshot.to_string())
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

async fn admin_json(
    State(handle): State<ServerHandle>,
) -> Result<Json<StatusSnapshot>, StatusCode> {
    handle
        .snapshot()
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

/// Serve the status endpoint on an already bound listener.
///
/// Long-running; spawn it in the background.
pub async fn run_status_server(listener: TcpListener, handle: ServerHandle) {
    match listener.local_addr() {
        Ok(addr) => info!("Status endpoint listening on {}", addr),
        Err(e) => error!("Status endpoint has no local address: {}", e),
    }

    if let Err(e) = axum::serve(listener, router(handle)).await {
        error!("Status endpoint error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{ChatServer, ServerCommand};
    use crate::types::ClientId;
    use tokio::sync::mpsc;

    fn sample() -> StatusSnapshot {
        StatusSnapshot {
            sessions: vec![SessionStatus {
                username: "alice".to_string(),
                address: "127.0.0.1:40000".to_string(),
                room: Some("lobby".to_string()),
                connected_secs: 12,
            }],
            rooms: vec![RoomStatus {
                name: "lobby".to_string(),
                members: 1,
            }],
        }
    }

    #[test]
    fn test_snapshot_text() {
        assert_eq!(
            sample().to_string(),
            "Server Activity:\nUser: alice - Connected for: 12s\nRoom: lobby - Users: 1\n"
        );
    }

    #[test]
    fn test_snapshot_json() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["sessions"][0]["username"], "alice");
        assert_eq!(json["sessions"][0]["room"], "lobby");
        assert_eq!(json["rooms"][0]["members"], 1);
    }

    #[tokio::test]
    async fn test_admin_endpoint_serves_snapshot() {
        let handle = ChatServer::spawn(16);

        let (tx, _rx) = mpsc::channel(8);
        handle
            .send(ServerCommand::Connect {
                client_id: ClientId::new(),
                username: "alice".to_string(),
                addr: "127.0.0.1:40000".parse().unwrap(),
                sender: tx,
            })
            .await
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(run_status_server(listener, handle));

        let body = reqwest::get(format!("http://{}/admin", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.starts_with("Server Activity:\n"));
        assert!(body.contains("User: alice - Connected for:"));

        let json: serde_json::Value = reqwest::get(format!("http://{}/admin.json", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["sessions"][0]["username"], "alice");
        assert_eq!(json["rooms"].as_array().unwrap().len(), 0);
    }
}

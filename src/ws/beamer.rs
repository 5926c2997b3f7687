//! Watch handlers for screens and consoles
//!
//! `WatchSession` attaches a connection to a session without creating a
//! player; beamer screens and host consoles both use it. `RequestSnapshot`
//! reloads the mirrored view from state, which also heals a connection that
//! fell behind the broadcast channel.

use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::SessionId;
use std::sync::Arc;

use super::{attach_session, command_failed, Conn};

pub async fn handle_watch_session(
    state: &Arc<AppState>,
    conn: &mut Conn,
    session_id: SessionId,
) -> Vec<ServerMessage> {
    tracing::info!("{:?} watching session {}", conn.role, session_id);
    match attach_session(state, conn, &session_id).await {
        Ok((_, snapshot)) => vec![snapshot],
        Err(e) => {
            vec![ServerMessage::Error {
                code: "WATCH_FAILED".to_string(),
                msg: e,
            }]
        }
    }
}

pub async fn handle_request_snapshot(state: &Arc<AppState>, conn: &mut Conn) -> Vec<ServerMessage> {
    let session_id = match conn.session_id() {
        Some(id) => id.clone(),
        None => {
            return vec![ServerMessage::Error {
                code: "NOT_ATTACHED".to_string(),
                msg: "Watch or join a session first".to_string(),
            }];
        }
    };
    match attach_session(state, conn, &session_id).await {
        Ok((_, snapshot)) => vec![snapshot],
        Err(e) => command_failed(conn, "SNAPSHOT_FAILED", e),
    }
}

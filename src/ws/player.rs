//! Player message handlers
//!
//! Joining, reconnecting, and answering for the session the connection is
//! attached to. A successful join stores the player id on the connection;
//! everything after that rides on it.

use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{PlayerId, SessionId};
use std::sync::Arc;

use super::{attach_session, command_failed, Conn};

pub async fn handle_join_session(
    state: &Arc<AppState>,
    conn: &mut Conn,
    session_id: SessionId,
    name: Option<String>,
) -> Vec<ServerMessage> {
    tracing::info!("Join request for session {}: name={:?}", session_id, name);
    let player = match state.join_session(&session_id, name).await {
        Ok(p) => p,
        Err(e) => {
            return vec![ServerMessage::Error {
                code: "JOIN_FAILED".to_string(),
                msg: e,
            }];
        }
    };
    conn.player_id = Some(player.id.clone());

    match attach_session(state, conn, &session_id).await {
        Ok((session, snapshot)) => vec![ServerMessage::Joined { player, session }, snapshot],
        Err(e) => command_failed(conn, "JOIN_FAILED", e),
    }
}

/// Re-attach as an existing player after a dropped connection. The player
/// keeps their id, name, and score.
pub async fn handle_rejoin_session(
    state: &Arc<AppState>,
    conn: &mut Conn,
    session_id: SessionId,
    player_id: PlayerId,
) -> Vec<ServerMessage> {
    tracing::info!("Rejoin request: player {} session {}", player_id, session_id);
    let known = match state.get_player(&player_id).await {
        Some(p) if p.session_id == session_id => p,
        _ => {
            return vec![ServerMessage::Error {
                code: "REJOIN_FAILED".to_string(),
                msg: format!("Unknown player {} in session {}", player_id, session_id),
            }];
        }
    };

    // Flips the player back to active and refreshes last_active_at.
    state.touch_player(&known.id).await;
    conn.player_id = Some(known.id.clone());

    match attach_session(state, conn, &session_id).await {
        Ok((session, snapshot)) => {
            let player = state.get_player(&known.id).await.unwrap_or(known);
            vec![ServerMessage::Joined { player, session }, snapshot]
        }
        Err(e) => command_failed(conn, "REJOIN_FAILED", e),
    }
}

pub async fn handle_submit_answer(
    state: &Arc<AppState>,
    conn: &mut Conn,
    answer: String,
    response_time_ms: Option<u64>,
) -> Vec<ServerMessage> {
    let (session_id, player_id) = match (conn.session_id(), conn.player_id.as_ref()) {
        (Some(s), Some(p)) => (s.clone(), p.clone()),
        _ => {
            return vec![ServerMessage::Error {
                code: "NOT_JOINED".to_string(),
                msg: "Join a session before answering".to_string(),
            }];
        }
    };

    tracing::debug!("Answer from player {} in session {}", player_id, session_id);
    match state
        .submit_answer(&session_id, &player_id, answer, response_time_ms.unwrap_or(0))
        .await
    {
        // The accepted answer comes back to this client through the
        // broadcast feed as an AnswerUpserted.
        Ok(_) => Vec::new(),
        Err(e) => command_failed(conn, "SUBMIT_FAILED", e),
    }
}

//! Host-only command handlers
//!
//! All handlers in this module require the Host role; authorization is
//! checked in the dispatch layer before these run. Handlers never write to
//! the connection's mirror themselves. The state layer broadcasts the
//! resulting change events and the mirror absorbs them like every other
//! consumer, so the host console shows exactly what reached the room.

use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::sync::SessionMirror;
use crate::types::{PlayerId, QuestionId, SettingsPatch};
use std::sync::Arc;

use super::{command_failed, Conn};

/// Macro to resolve the attached session id and return early when the
/// connection is not attached to one
macro_rules! attached {
    ($conn:expr) => {
        match $conn.session_id() {
            Some(id) => id.clone(),
            None => {
                return vec![ServerMessage::Error {
                    code: "NOT_ATTACHED".to_string(),
                    msg: "Create or watch a session first".to_string(),
                }];
            }
        }
    };
}

pub async fn handle_create_session(
    state: &Arc<AppState>,
    conn: &mut Conn,
    name: String,
    question_ids: Vec<QuestionId>,
    settings: Option<SettingsPatch>,
) -> Vec<ServerMessage> {
    tracing::info!(
        "Host creating session '{}' with {} question(s)",
        name,
        question_ids.len()
    );
    let session = match state.create_session(name, question_ids, settings).await {
        Ok(s) => s,
        Err(e) => return command_failed(conn, "CREATE_FAILED", e),
    };

    // Attach the console to the session it just created.
    match SessionMirror::load(state, &session.id, true).await {
        Ok(mirror) => {
            let snapshot = mirror.snapshot();
            conn.mirror = Some(mirror);
            vec![ServerMessage::SessionCreated { session }, snapshot]
        }
        Err(e) => command_failed(conn, "CREATE_FAILED", e),
    }
}

pub async fn handle_start_game(state: &Arc<AppState>, conn: &mut Conn) -> Vec<ServerMessage> {
    let session_id = attached!(conn);
    tracing::info!("Host starting session {}", session_id);
    match state.start_game(&session_id).await {
        Ok(_) => Vec::new(),
        Err(e) => command_failed(conn, "START_FAILED", e),
    }
}

pub async fn handle_next_question(state: &Arc<AppState>, conn: &mut Conn) -> Vec<ServerMessage> {
    let session_id = attached!(conn);
    tracing::info!("Host advancing session {}", session_id);
    match state.next_question(&session_id).await {
        Ok(_) => Vec::new(),
        Err(e) => command_failed(conn, "NEXT_FAILED", e),
    }
}

pub async fn handle_show_results(state: &Arc<AppState>, conn: &mut Conn) -> Vec<ServerMessage> {
    let session_id = attached!(conn);
    tracing::info!("Host showing results for session {}", session_id);
    match state.show_results(&session_id).await {
        Ok(_) => Vec::new(),
        Err(e) => command_failed(conn, "RESULTS_FAILED", e),
    }
}

pub async fn handle_end_game(state: &Arc<AppState>, conn: &mut Conn) -> Vec<ServerMessage> {
    let session_id = attached!(conn);
    tracing::info!("Host ending session {}", session_id);
    match state.end_game(&session_id).await {
        Ok(_) => Vec::new(),
        Err(e) => command_failed(conn, "END_FAILED", e),
    }
}

pub async fn handle_mark_player_wrong(
    state: &Arc<AppState>,
    conn: &mut Conn,
    player_id: PlayerId,
) -> Vec<ServerMessage> {
    let session_id = attached!(conn);
    tracing::info!(
        "Host marking player {} wrong in session {}",
        player_id,
        session_id
    );
    match state.mark_player_wrong(&session_id, &player_id).await {
        Ok(_) => Vec::new(),
        Err(e) => command_failed(conn, "MARK_WRONG_FAILED", e),
    }
}

//! WebSocket message dispatch
//!
//! This module provides the main entry point for handling client messages.
//! Authorization is checked here, then dispatched to role-specific handler
//! modules.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::Role;
use std::sync::Arc;

use super::{beamer, host, player, practice, Conn};

/// Macro to check host authorization and return early if unauthorized
macro_rules! check_host {
    ($conn:expr, $action:expr) => {
        if $conn.role != Role::Host {
            return vec![ServerMessage::Error {
                code: "UNAUTHORIZED".to_string(),
                msg: format!("Only the host can {}", $action),
            }];
        }
    };
}

/// Handle a client message and return the direct replies, in send order.
/// Session mutations additionally fan out through the broadcast channels;
/// the caller's own mirror picks those up like any other consumer.
pub async fn handle_message(
    msg: ClientMessage,
    conn: &mut Conn,
    state: &Arc<AppState>,
) -> Vec<ServerMessage> {
    // Any message counts as a sign of life for the joined player.
    if let Some(player_id) = conn.player_id.clone() {
        state.touch_player(&player_id).await;
    }

    match msg {
        // Attach and snapshot messages (any role)
        ClientMessage::WatchSession { session_id } => {
            beamer::handle_watch_session(state, conn, session_id).await
        }

        ClientMessage::RequestSnapshot => beamer::handle_request_snapshot(state, conn).await,

        // Player messages
        ClientMessage::JoinSession { session_id, name } => {
            player::handle_join_session(state, conn, session_id, name).await
        }

        ClientMessage::RejoinSession {
            session_id,
            player_id,
        } => player::handle_rejoin_session(state, conn, session_id, player_id).await,

        ClientMessage::SubmitAnswer {
            answer,
            response_time_ms,
        } => player::handle_submit_answer(state, conn, answer, response_time_ms).await,

        // Host-only commands (authorization checked before dispatch)
        ClientMessage::HostCreateSession {
            name,
            question_ids,
            settings,
        } => {
            check_host!(conn, "create sessions");
            host::handle_create_session(state, conn, name, question_ids, settings).await
        }

        ClientMessage::HostStartGame => {
            check_host!(conn, "start the game");
            host::handle_start_game(state, conn).await
        }

        ClientMessage::HostNextQuestion => {
            check_host!(conn, "advance questions");
            host::handle_next_question(state, conn).await
        }

        ClientMessage::HostShowResults => {
            check_host!(conn, "show results");
            host::handle_show_results(state, conn).await
        }

        ClientMessage::HostEndGame => {
            check_host!(conn, "end the game");
            host::handle_end_game(state, conn).await
        }

        ClientMessage::HostMarkPlayerWrong { player_id } => {
            check_host!(conn, "mark players wrong");
            host::handle_mark_player_wrong(state, conn, player_id).await
        }

        // Practice mode (runs entirely on this connection)
        ClientMessage::StartPractice {
            kind,
            count,
            time_limit_seconds,
        } => practice::handle_start(state, conn, kind, count, time_limit_seconds).await,

        ClientMessage::PracticeSubmit { answer } => practice::handle_submit(conn, answer),

        ClientMessage::PracticeShowAnswer => practice::handle_show_answer(conn),

        ClientMessage::PracticeNext => practice::handle_next(conn),

        ClientMessage::PracticeReset => practice::handle_reset(conn),
    }
}

//! Solo practice runs
//!
//! A practice run lives entirely on the connection: the engine is owned by
//! the socket task and ticked from its select loop, so no other client ever
//! observes it and nothing is broadcast.

use crate::engine::{Advance, QuizEngine, RunState};
use crate::protocol::{QuestionInfo, ServerMessage};
use crate::state::AppState;
use crate::types::QuestionKind;
use std::sync::Arc;

use super::Conn;

// Fallback per-question time limits. Text trivia reads faster than the
// image rounds.
const TRIVIA_SECONDS: u32 = 15;
const IMAGE_SECONDS: u32 = 20;

fn default_seconds(kind: Option<&str>) -> u32 {
    match kind {
        Some("trivia") => TRIVIA_SECONDS,
        _ => IMAGE_SECONDS,
    }
}

/// Current run state as a message, with the question redacted until the
/// answer phase.
pub fn run_state(engine: &QuizEngine) -> ServerMessage {
    let question = engine.current_question().map(|q| match engine.state() {
        RunState::Answered => QuestionInfo::revealed(q),
        _ => QuestionInfo::from(q),
    });
    ServerMessage::PracticeState {
        state: engine.state(),
        current_index: engine.current_index(),
        total: engine.total(),
        score: engine.score(),
        time_remaining: engine.time_remaining(),
        verdict: engine.verdict().cloned(),
        question,
    }
}

pub async fn handle_start(
    state: &Arc<AppState>,
    conn: &mut Conn,
    kind: Option<String>,
    count: Option<usize>,
    time_limit_seconds: Option<u32>,
) -> Vec<ServerMessage> {
    if let Some(kind) = &kind {
        if !QuestionKind::TAGS.contains(&kind.as_str()) {
            return vec![ServerMessage::Error {
                code: "UNKNOWN_KIND".to_string(),
                msg: format!("Unknown question kind: {}", kind),
            }];
        }
    }

    let questions = state.draw_questions(kind.as_deref(), count).await;
    if questions.is_empty() {
        return vec![ServerMessage::Error {
            code: "NO_QUESTIONS".to_string(),
            msg: "No questions available for this practice run".to_string(),
        }];
    }

    tracing::info!(
        "Starting practice run: {} question(s), kind={:?}",
        questions.len(),
        kind
    );

    // 0 disables the countdown entirely.
    let seconds = match time_limit_seconds {
        Some(0) => None,
        Some(s) => Some(s),
        None => Some(default_seconds(kind.as_deref())),
    };
    let mut engine = QuizEngine::new(questions);
    if let Some(seconds) = seconds {
        engine = engine.with_time_limit(seconds);
    }
    engine.start();

    let reply = run_state(&engine);
    conn.practice = Some(engine);
    vec![reply]
}

pub fn handle_submit(conn: &mut Conn, answer: String) -> Vec<ServerMessage> {
    let Some(engine) = conn.practice.as_mut() else {
        return no_run();
    };
    match engine.submit(&answer) {
        Some(_) => vec![run_state(engine)],
        None => not_in_question(),
    }
}

pub fn handle_show_answer(conn: &mut Conn) -> Vec<ServerMessage> {
    let Some(engine) = conn.practice.as_mut() else {
        return no_run();
    };
    if engine.show_answer() {
        vec![run_state(engine)]
    } else {
        not_in_question()
    }
}

pub fn handle_next(conn: &mut Conn) -> Vec<ServerMessage> {
    let Some(engine) = conn.practice.as_mut() else {
        return no_run();
    };
    match engine.next() {
        Some(Advance::Question) => vec![run_state(engine)],
        Some(Advance::Finished { score, total }) => vec![
            run_state(engine),
            ServerMessage::PracticeFinished { score, total },
        ],
        None => vec![ServerMessage::Error {
            code: "PRACTICE_STATE".to_string(),
            msg: "Nothing to advance; reveal the answer first".to_string(),
        }],
    }
}

/// Restart the same question set from the top.
pub fn handle_reset(conn: &mut Conn) -> Vec<ServerMessage> {
    let Some(engine) = conn.practice.as_mut() else {
        return no_run();
    };
    engine.reset();
    engine.start();
    vec![run_state(engine)]
}

fn no_run() -> Vec<ServerMessage> {
    vec![ServerMessage::Error {
        code: "NO_PRACTICE_RUN".to_string(),
        msg: "Start a practice run first".to_string(),
    }]
}

fn not_in_question() -> Vec<ServerMessage> {
    vec![ServerMessage::Error {
        code: "PRACTICE_STATE".to_string(),
        msg: "No question is open".to_string(),
    }]
}

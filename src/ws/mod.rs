//! WebSocket transport.
//!
//! Each connection carries a role, an optional player identity, an optional
//! attached session, and an optional solo practice run. Session data flows
//! one way: commands mutate `AppState`, the state layer broadcasts change
//! events, and every connection (the command issuer included) absorbs those
//! events into its `SessionMirror` before forwarding them to the client.

pub mod beamer;
pub mod handlers;
pub mod host;
pub mod player;
pub mod practice;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::SplitSink, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{QuizEngine, TickOutcome};
use crate::protocol::{ClientMessage, QuestionInfo, ServerMessage};
use crate::state::AppState;
use crate::sync::{Applied, SessionMirror};
use crate::types::{GameSession, PlayerId, QuestionId, Role, SessionId, SessionState};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub role: Option<String>,
}

/// Per-connection state. Owned by the socket task, never shared.
pub struct Conn {
    pub role: Role,
    pub player_id: Option<PlayerId>,
    pub mirror: Option<SessionMirror>,
    pub practice: Option<QuizEngine>,
}

impl Conn {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            player_id: None,
            mirror: None,
            practice: None,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.mirror.as_ref().map(|m| m.session_id())
    }
}

/// Whether this connection may see correct answers and verdicts right now.
pub(crate) fn reveal_for(role: &Role, state: &SessionState) -> bool {
    *role == Role::Host || matches!(state, SessionState::Result | SessionState::Ended)
}

/// Point the connection's mirror at a session. Returns the session and the
/// attach snapshot to send.
pub(crate) async fn attach_session(
    state: &Arc<AppState>,
    conn: &mut Conn,
    session_id: &SessionId,
) -> Result<(GameSession, ServerMessage), String> {
    let session = state
        .get_session(session_id)
        .await
        .ok_or_else(|| format!("Session not found: {}", session_id))?;
    let reveal = reveal_for(&conn.role, &session.state);
    let mirror = SessionMirror::load(state, session_id, reveal).await?;
    let session = mirror.session().clone();
    let snapshot = mirror.snapshot();
    conn.mirror = Some(mirror);
    Ok((session, snapshot))
}

/// Record a failed command on the mirror (when attached) and build the error
/// reply.
pub(crate) fn command_failed(conn: &mut Conn, code: &str, msg: String) -> Vec<ServerMessage> {
    tracing::warn!("Command failed ({}): {}", code, msg);
    if let Some(mirror) = conn.mirror.as_mut() {
        mirror.note_error(msg.clone());
    }
    vec![ServerMessage::Error {
        code: code.to_string(),
        msg,
    }]
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request: role={:?}", params.role);
    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let role = match params.role.as_deref() {
        Some("host") => Role::Host,
        Some("beamer") => Role::Beamer,
        _ => Role::Player,
    };
    let mut conn = Conn::new(role);

    tracing::info!("WebSocket connected with role: {:?}", conn.role);

    let welcome = ServerMessage::Welcome {
        protocol: "1.0".to_string(),
        role: conn.role.clone(),
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if !send_all(&mut sender, &[welcome]).await {
        tracing::error!("Failed to send welcome message");
        return;
    }

    // Everyone gets the shared change feed; only hosts get the host feed.
    let mut change_rx = state.subscribe_changes();
    let mut host_rx = if conn.role == Role::Host {
        Some(state.subscribe_host())
    } else {
        None
    };

    // Drives practice-run countdowns. Sessions have no server timer; the
    // host paces them.
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            change = change_rx.recv() => {
                if let Ok(msg) = change {
                    let out = absorb_change(&state, &mut conn, &msg).await;
                    if !send_all(&mut sender, &out).await {
                        break;
                    }
                }
            }

            host_msg = async {
                match &mut host_rx {
                    Some(rx) => rx.recv().await.ok(),
                    None => {
                        // Non-Host: wait forever
                        std::future::pending::<Option<ServerMessage>>().await
                    }
                }
            } => {
                if let Some(msg) = host_msg {
                    let forward = match msg.session_scope() {
                        Some(scope) => conn.session_id() == Some(scope),
                        None => true,
                    };
                    if forward && !send_all(&mut sender, &[msg]).await {
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                if let Some(engine) = conn.practice.as_mut() {
                    match engine.tick() {
                        TickOutcome::Inert => {}
                        TickOutcome::Tick { .. } | TickOutcome::TimedOut => {
                            let update = practice::run_state(engine);
                            if !send_all(&mut sender, &[update]).await {
                                break;
                            }
                        }
                    }
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let replies =
                                    handlers::handle_message(client_msg, &mut conn, &state).await;
                                if !send_all(&mut sender, &replies).await {
                                    tracing::error!("Failed to send response");
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if !send_all(&mut sender, &[error]).await {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!("WebSocket connection closed for role: {:?}", conn.role);
}

/// Send a batch of messages in order. Returns false once the socket is gone.
async fn send_all(sender: &mut SplitSink<WebSocket, Message>, messages: &[ServerMessage]) -> bool {
    for msg in messages {
        if let Ok(json) = serde_json::to_string(msg) {
            if sender.send(Message::Text(json.into())).await.is_err() {
                return false;
            }
        }
    }
    true
}

/// Absorb a shared change event into the connection's mirror and decide what
/// to forward. Returns the messages to send, in order: events for other
/// sessions (or received while unattached) are dropped, and pointer moves
/// grow a `CurrentQuestion` follow-up carrying the newly fetched question.
async fn absorb_change(
    state: &Arc<AppState>,
    conn: &mut Conn,
    msg: &ServerMessage,
) -> Vec<ServerMessage> {
    let Some(scope) = msg.session_scope() else {
        return vec![msg.clone()];
    };
    let Some(mirror) = conn.mirror.as_mut() else {
        return Vec::new();
    };
    if mirror.session_id() != scope {
        return Vec::new();
    }

    let pointer_before = mirror.session().current_question_id.clone();
    let mut out = vec![msg.clone()];

    match mirror.apply(msg) {
        Applied::NeedsQuestion(question_id) => {
            let question = state.get_question(&question_id).await;
            let info = question.as_ref().map(|q| {
                if reveal_for(&conn.role, &mirror.session().state) {
                    QuestionInfo::revealed(q)
                } else {
                    QuestionInfo::from(q)
                }
            });
            mirror.set_current_question(info.clone());
            out.push(ServerMessage::CurrentQuestion { question: info });
            if conn.role == Role::Host {
                out.push(ServerMessage::HostCurrentQuestion {
                    session_id: scope.clone(),
                    question,
                });
            }
        }
        Applied::Changed => {
            if pointer_before.is_some() && mirror.session().current_question_id.is_none() {
                // Pointer cleared: blank the question display.
                out.push(ServerMessage::CurrentQuestion { question: None });
                if conn.role == Role::Host {
                    out.push(ServerMessage::HostCurrentQuestion {
                        session_id: scope.clone(),
                        question: None,
                    });
                }
            } else if let Some(question_id) = reveal_candidate(&conn.role, mirror) {
                // Results went live: swap the redacted question for the
                // revealed one.
                if let Some(q) = state.get_question(&question_id).await {
                    let info = QuestionInfo::revealed(&q);
                    mirror.set_current_question(Some(info.clone()));
                    out.push(ServerMessage::CurrentQuestion {
                        question: Some(info),
                    });
                }
            }
        }
        Applied::Unchanged => {}
    }
    out
}

/// Id of the mirrored question if its answer should be visible now but was
/// fetched redacted.
fn reveal_candidate(role: &Role, mirror: &SessionMirror) -> Option<QuestionId> {
    let current = mirror.current_question()?;
    (current.answer.is_none() && reveal_for(role, &mirror.session().state))
        .then(|| current.id.clone())
}

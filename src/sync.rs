//! Attached-session mirror
//!
//! Every connection watching a session keeps a [`SessionMirror`]: a local
//! copy of the session row, the current question, the players, and the
//! answers to the current question. The mirror converges on server truth
//! purely by absorbing feed events; issuing a command never touches it, and
//! command failures land in an error slot instead of unwinding the
//! connection.
//!
//! Events may arrive more than once and out of order across entities, so
//! every application is an upsert keyed by entity id. When a session event
//! moves the question pointer the mirror drops the answers it held (they
//! belong to the previous question) and asks the caller to fetch the new
//! question.

use crate::protocol::{AnswerInfo, QuestionInfo, ServerMessage};
use crate::state::AppState;
use crate::types::{GameSession, Player, QuestionId, SessionId};

/// What absorbing one feed event did to the mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// The event was for another session or of a kind the mirror ignores.
    Unchanged,
    /// The mirror absorbed the event.
    Changed,
    /// The question pointer moved. The mirror cleared its answers and
    /// expects the caller to fetch the question and call
    /// [`SessionMirror::set_current_question`].
    NeedsQuestion(QuestionId),
}

#[derive(Debug, Clone)]
pub struct SessionMirror {
    session: GameSession,
    current_question: Option<QuestionInfo>,
    players: Vec<Player>,
    answers: Vec<AnswerInfo>,
    last_error: Option<String>,
}

impl SessionMirror {
    /// Bulk-fetch a coherent starting point: the session itself, the current
    /// question if the pointer is set, the players, and the answers to the
    /// current question. `reveal` controls whether question solutions and
    /// answer verdicts are filled in or withheld.
    pub async fn load(
        state: &AppState,
        session_id: &SessionId,
        reveal: bool,
    ) -> Result<Self, String> {
        let session = state
            .get_session(session_id)
            .await
            .ok_or_else(|| format!("Session not found: {}", session_id))?;

        let current_question = match &session.current_question_id {
            Some(id) => {
                let question = state
                    .get_question(id)
                    .await
                    .ok_or_else(|| format!("Question not found: {}", id))?;
                Some(if reveal {
                    QuestionInfo::revealed(&question)
                } else {
                    QuestionInfo::from(&question)
                })
            }
            None => None,
        };

        let players = state.players_in_session(session_id).await;

        let answers = match &session.current_question_id {
            Some(id) => state
                .answers_for_question(session_id, id)
                .await
                .iter()
                .map(|a| {
                    if reveal {
                        AnswerInfo::revealed(a)
                    } else {
                        AnswerInfo::from(a)
                    }
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            session,
            current_question,
            players,
            answers,
            last_error: None,
        })
    }

    /// Absorb one feed event. Safe to call with every broadcast message;
    /// events that do not concern this session fall through unchanged.
    pub fn apply(&mut self, msg: &ServerMessage) -> Applied {
        match msg {
            ServerMessage::SessionUpdated { session } => {
                if session.id != self.session.id {
                    return Applied::Unchanged;
                }
                let pointer_moved =
                    session.current_question_id != self.session.current_question_id;
                self.session = session.clone();
                if !pointer_moved {
                    return Applied::Changed;
                }
                self.answers.clear();
                self.current_question = None;
                match &self.session.current_question_id {
                    Some(id) => Applied::NeedsQuestion(id.clone()),
                    None => Applied::Changed,
                }
            }
            ServerMessage::PlayerUpserted { player } => {
                if player.session_id != self.session.id {
                    return Applied::Unchanged;
                }
                match self.players.iter_mut().find(|p| p.id == player.id) {
                    Some(slot) => *slot = player.clone(),
                    None => self.players.push(player.clone()),
                }
                Applied::Changed
            }
            ServerMessage::AnswerUpserted { answer } => {
                if answer.session_id != self.session.id {
                    return Applied::Unchanged;
                }
                match self.answers.iter_mut().find(|a| a.id == answer.id) {
                    Some(slot) => *slot = answer.clone(),
                    None => self.answers.push(answer.clone()),
                }
                Applied::Changed
            }
            _ => Applied::Unchanged,
        }
    }

    /// Fill in the question a [`Applied::NeedsQuestion`] asked for.
    pub fn set_current_question(&mut self, question: Option<QuestionInfo>) {
        self.current_question = question;
    }

    /// Record a failed command. The mirror itself stays as the feed last
    /// left it.
    pub fn note_error(&mut self, err: impl Into<String>) {
        self.last_error = Some(err.into());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session.id
    }

    pub fn current_question(&self) -> Option<&QuestionInfo> {
        self.current_question.as_ref()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn answers(&self) -> &[AnswerInfo] {
        &self.answers
    }

    /// The mirror's contents as one coherent snapshot message.
    pub fn snapshot(&self) -> ServerMessage {
        ServerMessage::SessionSnapshot {
            session: self.session.clone(),
            current_question: self.current_question.clone(),
            players: self.players.clone(),
            answers: self.answers.clone(),
        }
    }
}

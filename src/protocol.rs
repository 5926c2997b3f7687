use crate::engine::{RunState, Verdict};
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Attach this connection to a session without creating a player
    /// (host consoles and beamer screens).
    WatchSession {
        session_id: SessionId,
    },
    /// Join a session as a player. Without a name the server draws a random
    /// nickname.
    JoinSession {
        session_id: SessionId,
        name: Option<String>,
    },
    /// Re-attach as an existing player after a reconnect.
    RejoinSession {
        session_id: SessionId,
        player_id: PlayerId,
    },
    /// Answer the current question of the joined session.
    SubmitAnswer {
        answer: String,
        /// Time from question display to submission, measured client-side.
        response_time_ms: Option<u64>,
    },
    /// Ask for a fresh snapshot of the attached session.
    RequestSnapshot,

    // Host-only messages
    HostCreateSession {
        name: String,
        question_ids: Vec<QuestionId>,
        settings: Option<SettingsPatch>,
    },
    HostStartGame,
    HostNextQuestion,
    HostShowResults,
    HostEndGame,
    /// Force a wrong answer for a player on the current question ("buzzer
    /// wrong"), regardless of what they submitted.
    HostMarkPlayerWrong {
        player_id: PlayerId,
    },

    // Practice mode (solo run against the question bank)
    StartPractice {
        kind: Option<String>,
        count: Option<usize>,
        time_limit_seconds: Option<u32>,
    },
    PracticeSubmit {
        answer: String,
    },
    PracticeShowAnswer,
    PracticeNext,
    PracticeReset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        role: Role,
        server_now: String,
    },
    /// Coherent view of the attached session, sent on attach and on request.
    SessionSnapshot {
        session: GameSession,
        current_question: Option<QuestionInfo>,
        players: Vec<Player>,
        answers: Vec<AnswerInfo>,
    },
    /// Change events, one per mutated entity. Consumers upsert by id; the
    /// same event may be observed more than once.
    SessionUpdated {
        session: GameSession,
    },
    PlayerUpserted {
        player: Player,
    },
    AnswerUpserted {
        answer: AnswerInfo,
    },
    /// The question the session's pointer now refers to, pushed whenever the
    /// pointer changes and again with the answer filled in once results are
    /// shown. None when the pointer was cleared.
    CurrentQuestion {
        question: Option<QuestionInfo>,
    },
    SessionCreated {
        session: GameSession,
    },
    Joined {
        player: Player,
        session: GameSession,
    },
    /// Host feed: full answer record including text and verdict, available
    /// before results are revealed.
    HostAnswerUpserted {
        session_id: SessionId,
        answer: PlayerAnswer,
    },
    /// Host feed: the current question with its correct answer.
    HostCurrentQuestion {
        session_id: SessionId,
        question: Option<Question>,
    },
    /// Practice run state after every transition and timer tick.
    PracticeState {
        state: RunState,
        current_index: usize,
        total: usize,
        score: u32,
        time_remaining: Option<u32>,
        verdict: Option<Verdict>,
        question: Option<QuestionInfo>,
    },
    /// Sent exactly once when a practice run completes.
    PracticeFinished {
        score: u32,
        total: usize,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    /// Session id a broadcast message is scoped to, so connections can skip
    /// events for sessions they are not attached to.
    pub fn session_scope(&self) -> Option<&SessionId> {
        match self {
            ServerMessage::SessionUpdated { session } => Some(&session.id),
            ServerMessage::PlayerUpserted { player } => Some(&player.session_id),
            ServerMessage::AnswerUpserted { answer } => Some(&answer.session_id),
            ServerMessage::HostAnswerUpserted { session_id, .. }
            | ServerMessage::HostCurrentQuestion { session_id, .. } => Some(session_id),
            _ => None,
        }
    }
}

/// Question as shown to players and screens. The correct answer is absent
/// while the question is open and filled in for the reveal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionInfo {
    pub id: QuestionId,
    pub prompt: String,
    pub kind: String,
    pub hints: Vec<String>,
    pub image_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl From<&Question> for QuestionInfo {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            prompt: q.prompt.clone(),
            kind: q.kind.tag().to_string(),
            hints: q.hints.clone(),
            image_urls: q.image_urls().to_vec(),
            answer: None,
        }
    }
}

impl QuestionInfo {
    pub fn revealed(q: &Question) -> Self {
        let mut info = Self::from(q);
        info.answer = Some(q.answer.clone());
        info
    }
}

/// Answer record as shown to players and screens. Text and verdict stay
/// hidden until results are shown so the feed cannot spoil the round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerInfo {
    pub id: AnswerId,
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub question_id: QuestionId,
    pub response_time_ms: u64,
    pub submitted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

impl From<&PlayerAnswer> for AnswerInfo {
    fn from(a: &PlayerAnswer) -> Self {
        Self {
            id: a.id.clone(),
            session_id: a.session_id.clone(),
            player_id: a.player_id.clone(),
            question_id: a.question_id.clone(),
            response_time_ms: a.response_time_ms,
            submitted_at: a.submitted_at.clone(),
            answer: None,
            is_correct: None,
        }
    }
}

impl AnswerInfo {
    pub fn revealed(a: &PlayerAnswer) -> Self {
        let mut info = Self::from(a);
        info.answer = Some(a.answer.clone());
        info.is_correct = Some(a.is_correct);
        info
    }
}

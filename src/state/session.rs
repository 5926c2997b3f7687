//! Game session lifecycle
//!
//! Host-driven multiplayer sessions walk waiting -> question -> result ->
//! ... -> ended. All mutation happens here; every change is followed by a
//! `SessionUpdated` event on the feed so attached mirrors converge. Mirrors
//! never mutate locally when a command is issued.

use crate::protocol::{AnswerInfo, ServerMessage};
use crate::types::{GameSession, QuestionId, SessionId, SessionSettings, SessionState, SettingsPatch};
use rand::seq::SliceRandom;

use super::AppState;

impl AppState {
    /// Create a session over an ordered set of question ids. The order is
    /// shuffled once at creation when the randomize setting is on.
    pub async fn create_session(
        &self,
        name: String,
        question_ids: Vec<QuestionId>,
        patch: Option<SettingsPatch>,
    ) -> Result<GameSession, String> {
        if name.trim().is_empty() {
            return Err("Session name must not be empty".to_string());
        }
        if question_ids.is_empty() {
            return Err("A session needs at least one question".to_string());
        }

        let questions = self.questions.read().await;
        for id in &question_ids {
            if !questions.contains_key(id) {
                return Err(format!("Unknown question id: {}", id));
            }
        }
        drop(questions);

        let settings = match &patch {
            Some(p) => SessionSettings::with_patch(p),
            None => SessionSettings::default(),
        };

        let mut ordered = question_ids;
        if settings.randomize_questions {
            ordered.shuffle(&mut rand::rng());
        }

        let now = chrono::Utc::now().to_rfc3339();
        let session = GameSession {
            id: ulid::Ulid::new().to_string(),
            name: name.trim().to_string(),
            state: SessionState::Waiting,
            question_ids: ordered,
            current_question_index: None,
            current_question_id: None,
            settings,
            started_at: None,
            ended_at: None,
            created_at: now.clone(),
            updated_at: now,
        };

        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());

        tracing::info!(
            "Created session {} with {} questions",
            session.id,
            session.question_ids.len()
        );
        self.broadcast_change(ServerMessage::SessionUpdated {
            session: session.clone(),
        });
        Ok(session)
    }

    pub async fn get_session(&self, id: &SessionId) -> Option<GameSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Move a waiting session onto its first question.
    pub async fn start_game(&self, session_id: &SessionId) -> Result<GameSession, String> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| format!("Session not found: {}", session_id))?;

        if session.state != SessionState::Waiting {
            return Err(format!(
                "Can only start a waiting session (currently {})",
                session.state.as_str()
            ));
        }

        let now = chrono::Utc::now().to_rfc3339();
        session.state = SessionState::Question;
        session.current_question_index = Some(0);
        session.current_question_id = session.question_ids.first().cloned();
        session.started_at = Some(now.clone());
        session.updated_at = now;

        let updated = session.clone();
        drop(sessions);

        tracing::info!("Session {} started", session_id);
        self.broadcast_change(ServerMessage::SessionUpdated {
            session: updated.clone(),
        });
        Ok(updated)
    }

    /// Advance the question pointer. Past the last question the session ends
    /// and the pointer is cleared; there is no wrap-around.
    pub async fn next_question(&self, session_id: &SessionId) -> Result<GameSession, String> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| format!("Session not found: {}", session_id))?;

        match session.state {
            SessionState::Waiting => {
                return Err("Session has not started yet".to_string());
            }
            SessionState::Ended => {
                return Err("Session has already ended".to_string());
            }
            SessionState::Question | SessionState::Result => {}
        }

        let current = session
            .current_question_index
            .ok_or_else(|| "Session has no current question".to_string())?;
        let next = current + 1;
        let now = chrono::Utc::now().to_rfc3339();

        if next >= session.question_ids.len() {
            session.state = SessionState::Ended;
            session.current_question_index = None;
            session.current_question_id = None;
            session.ended_at = Some(now.clone());
            session.updated_at = now;
            tracing::info!("Session {} ran out of questions, ended", session_id);
        } else {
            session.state = SessionState::Question;
            session.current_question_index = Some(next);
            session.current_question_id = session.question_ids.get(next).cloned();
            session.updated_at = now;
            tracing::info!("Session {} advanced to question {}", session_id, next);
        }

        let updated = session.clone();
        drop(sessions);

        self.broadcast_change(ServerMessage::SessionUpdated {
            session: updated.clone(),
        });
        Ok(updated)
    }

    /// Switch to the result view for the current question without moving the
    /// pointer, and reveal the answers collected for it.
    pub async fn show_results(&self, session_id: &SessionId) -> Result<GameSession, String> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| format!("Session not found: {}", session_id))?;

        match session.state {
            SessionState::Question | SessionState::Result => {}
            SessionState::Waiting => {
                return Err("Session has not started yet".to_string());
            }
            SessionState::Ended => {
                return Err("Session has already ended".to_string());
            }
        }

        session.state = SessionState::Result;
        session.updated_at = chrono::Utc::now().to_rfc3339();

        let updated = session.clone();
        drop(sessions);

        tracing::info!("Session {} showing results", session_id);
        self.broadcast_change(ServerMessage::SessionUpdated {
            session: updated.clone(),
        });

        // Re-broadcast the current question's answers with text and verdict
        // filled in. Mirrors absorb this as an ordinary upsert.
        if let Some(question_id) = updated.current_question_id.clone() {
            for answer in self.answers_for_question(session_id, &question_id).await {
                self.broadcast_change(ServerMessage::AnswerUpserted {
                    answer: AnswerInfo::revealed(&answer),
                });
            }
        }
        Ok(updated)
    }

    /// End the session from whatever state it is in. Ending an already ended
    /// session changes nothing.
    pub async fn end_game(&self, session_id: &SessionId) -> Result<GameSession, String> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| format!("Session not found: {}", session_id))?;

        if session.state == SessionState::Ended {
            return Ok(session.clone());
        }

        let now = chrono::Utc::now().to_rfc3339();
        session.state = SessionState::Ended;
        session.current_question_index = None;
        session.current_question_id = None;
        session.ended_at = Some(now.clone());
        session.updated_at = now;

        let updated = session.clone();
        drop(sessions);

        tracing::info!("Session {} ended", session_id);
        self.broadcast_change(ServerMessage::SessionUpdated {
            session: updated.clone(),
        });
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QuestionDraft, QuestionKind};

    async fn seed_questions(state: &AppState, n: usize) -> Vec<QuestionId> {
        let mut ids = Vec::new();
        for i in 0..n {
            let q = state
                .create_question(QuestionDraft {
                    prompt: format!("Question {}?", i),
                    answer: format!("{}", i),
                    hints: vec![],
                    kind: QuestionKind::Trivia,
                })
                .await
                .unwrap();
            ids.push(q.id);
        }
        ids
    }

    async fn session_with_questions(state: &AppState, n: usize) -> GameSession {
        let ids = seed_questions(state, n).await;
        state
            .create_session("Friday night".to_string(), ids, None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_session_defaults() {
        let state = AppState::new();
        let session = session_with_questions(&state, 3).await;

        assert_eq!(session.state, SessionState::Waiting);
        assert_eq!(session.current_question_index, None);
        assert_eq!(session.current_question_id, None);
        assert!(session.settings.allow_late_join);
        assert_eq!(session.settings.question_seconds, 30);
        assert_eq!(session.question_ids.len(), 3);
        assert!(session.started_at.is_none());
    }

    #[tokio::test]
    async fn test_create_session_validation() {
        let state = AppState::new();
        let ids = seed_questions(&state, 1).await;

        let result = state.create_session("  ".to_string(), ids.clone(), None).await;
        assert!(result.is_err());

        let result = state.create_session("Empty".to_string(), vec![], None).await;
        assert!(result.is_err());

        let result = state
            .create_session("Bad ref".to_string(), vec!["nope".to_string()], None)
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Unknown question id"));
    }

    #[tokio::test]
    async fn test_randomize_keeps_the_same_set() {
        let state = AppState::new();
        let ids = seed_questions(&state, 20).await;
        let session = state
            .create_session(
                "Shuffled".to_string(),
                ids.clone(),
                Some(SettingsPatch {
                    randomize_questions: Some(true),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();

        let mut got = session.question_ids.clone();
        let mut want = ids.clone();
        got.sort();
        want.sort();
        assert_eq!(got, want);
    }

    #[tokio::test]
    async fn test_start_game_only_from_waiting() {
        let state = AppState::new();
        let session = session_with_questions(&state, 2).await;

        let started = state.start_game(&session.id).await.unwrap();
        assert_eq!(started.state, SessionState::Question);
        assert_eq!(started.current_question_index, Some(0));
        assert_eq!(
            started.current_question_id.as_ref(),
            started.question_ids.first()
        );
        assert!(started.started_at.is_some());

        let again = state.start_game(&session.id).await;
        assert!(again.is_err());

        let missing = state.start_game(&"missing".to_string()).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_next_question_advances_in_order() {
        let state = AppState::new();
        let session = session_with_questions(&state, 3).await;
        state.start_game(&session.id).await.unwrap();

        let s = state.next_question(&session.id).await.unwrap();
        assert_eq!(s.current_question_index, Some(1));
        assert_eq!(s.current_question_id.as_deref(), Some(s.question_ids[1].as_str()));
        assert_eq!(s.state, SessionState::Question);

        let s = state.next_question(&session.id).await.unwrap();
        assert_eq!(s.current_question_index, Some(2));
    }

    #[tokio::test]
    async fn test_next_question_at_last_index_ends_without_wrapping() {
        let state = AppState::new();
        let session = session_with_questions(&state, 2).await;
        state.start_game(&session.id).await.unwrap();
        state.next_question(&session.id).await.unwrap();

        // Pointer sits on the last question now; one more ends the session.
        let s = state.next_question(&session.id).await.unwrap();
        assert_eq!(s.state, SessionState::Ended);
        assert_eq!(s.current_question_index, None);
        assert_eq!(s.current_question_id, None);
        assert!(s.ended_at.is_some());

        // And once ended, advancing is an error, never a wrap to 0.
        let result = state.next_question(&session.id).await;
        assert!(result.is_err());
        let s = state.get_session(&session.id).await.unwrap();
        assert_eq!(s.current_question_index, None);
    }

    #[tokio::test]
    async fn test_next_question_requires_a_started_session() {
        let state = AppState::new();
        let session = session_with_questions(&state, 2).await;

        let result = state.next_question(&session.id).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("not started"));
    }

    #[tokio::test]
    async fn test_show_results_keeps_the_pointer() {
        let state = AppState::new();
        let session = session_with_questions(&state, 2).await;
        state.start_game(&session.id).await.unwrap();

        let s = state.show_results(&session.id).await.unwrap();
        assert_eq!(s.state, SessionState::Result);
        assert_eq!(s.current_question_index, Some(0));
        assert!(s.current_question_id.is_some());

        // Advancing from the result view works.
        let s = state.next_question(&session.id).await.unwrap();
        assert_eq!(s.state, SessionState::Question);
        assert_eq!(s.current_question_index, Some(1));
    }

    #[tokio::test]
    async fn test_show_results_guards_waiting_and_ended() {
        let state = AppState::new();
        let session = session_with_questions(&state, 1).await;
        assert!(state.show_results(&session.id).await.is_err());

        state.start_game(&session.id).await.unwrap();
        state.end_game(&session.id).await.unwrap();
        assert!(state.show_results(&session.id).await.is_err());
    }

    #[tokio::test]
    async fn test_end_game_from_any_state_clears_the_pointer() {
        let state = AppState::new();

        let waiting = session_with_questions(&state, 2).await;
        let s = state.end_game(&waiting.id).await.unwrap();
        assert_eq!(s.state, SessionState::Ended);
        assert!(s.ended_at.is_some());

        let mid = session_with_questions(&state, 2).await;
        state.start_game(&mid.id).await.unwrap();
        let s = state.end_game(&mid.id).await.unwrap();
        assert_eq!(s.state, SessionState::Ended);
        assert_eq!(s.current_question_index, None);
        assert_eq!(s.current_question_id, None);
    }

    #[tokio::test]
    async fn test_end_game_is_idempotent() {
        let state = AppState::new();
        let session = session_with_questions(&state, 1).await;
        let first = state.end_game(&session.id).await.unwrap();
        let second = state.end_game(&session.id).await.unwrap();
        assert_eq!(first.ended_at, second.ended_at);
    }

    #[tokio::test]
    async fn test_commands_broadcast_session_updates() {
        let state = AppState::new();
        let session = session_with_questions(&state, 2).await;
        let mut rx = state.subscribe_changes();

        state.start_game(&session.id).await.unwrap();
        match rx.recv().await {
            Ok(ServerMessage::SessionUpdated { session: s }) => {
                assert_eq!(s.id, session.id);
                assert_eq!(s.state, SessionState::Question);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}

//! Answer intake and scoring
//!
//! The server judges every submission against the stored solution and keeps
//! at most one answer per player and question. Scores are never incremented
//! in place; they are recomputed from the answer records after every change,
//! so reapplying an event can not drift a score.

use super::AppState;
use crate::engine::answers_match;
use crate::protocol::{AnswerInfo, ServerMessage};
use crate::types::{PlayerAnswer, PlayerId, QuestionId, SessionId, SessionState};

impl AppState {
    /// Record a player's answer to the current question. Resubmitting
    /// replaces the earlier record instead of adding a second one.
    pub async fn submit_answer(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
        answer: String,
        response_time_ms: u64,
    ) -> Result<PlayerAnswer, String> {
        let session = self
            .get_session(session_id)
            .await
            .ok_or_else(|| format!("Session not found: {}", session_id))?;
        if session.state != SessionState::Question {
            return Err("Answers are only accepted while a question is live".to_string());
        }
        let question_id = session
            .current_question_id
            .clone()
            .ok_or_else(|| "Session has no current question".to_string())?;

        let player = self
            .get_player(player_id)
            .await
            .ok_or_else(|| format!("Player not found: {}", player_id))?;
        if &player.session_id != session_id {
            return Err(format!(
                "Player {} is not part of session {}",
                player_id, session_id
            ));
        }

        let question = self
            .get_question(&question_id)
            .await
            .ok_or_else(|| format!("Question not found: {}", question_id))?;
        let is_correct = answers_match(&answer, &question.answer);

        let now = chrono::Utc::now().to_rfc3339();
        let mut answers = self.answers.write().await;
        let record = match answers.values_mut().find(|a| {
            &a.session_id == session_id
                && &a.player_id == player_id
                && a.question_id == question_id
        }) {
            Some(existing) => {
                existing.answer = answer;
                existing.is_correct = is_correct;
                existing.response_time_ms = response_time_ms;
                existing.submitted_at = now;
                existing.clone()
            }
            None => {
                let record = PlayerAnswer {
                    id: ulid::Ulid::new().to_string(),
                    session_id: session_id.clone(),
                    player_id: player_id.clone(),
                    question_id: question_id.clone(),
                    answer,
                    is_correct,
                    response_time_ms,
                    submitted_at: now,
                };
                answers.insert(record.id.clone(), record.clone());
                record
            }
        };
        drop(answers);

        tracing::info!(
            "Player {} answered question {} ({})",
            player_id,
            question_id,
            if is_correct { "correct" } else { "incorrect" }
        );
        // Everyone learns that an answer exists; only the host feed carries
        // its text and verdict before results are shown.
        self.broadcast_change(ServerMessage::AnswerUpserted {
            answer: AnswerInfo::from(&record),
        });
        self.broadcast_to_host(ServerMessage::HostAnswerUpserted {
            session_id: session_id.clone(),
            answer: record.clone(),
        });

        self.recompute_player_score(player_id).await;
        self.touch_player(player_id).await;
        Ok(record)
    }

    /// Host override for the buzzer game: force the player's answer to the
    /// current question to count as wrong. Creates a blank zero-time record
    /// when the player has not submitted anything.
    pub async fn mark_player_wrong(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
    ) -> Result<PlayerAnswer, String> {
        let session = self
            .get_session(session_id)
            .await
            .ok_or_else(|| format!("Session not found: {}", session_id))?;
        let question_id = session
            .current_question_id
            .clone()
            .ok_or_else(|| "Session has no current question".to_string())?;

        let player = self
            .get_player(player_id)
            .await
            .ok_or_else(|| format!("Player not found: {}", player_id))?;
        if &player.session_id != session_id {
            return Err(format!(
                "Player {} is not part of session {}",
                player_id, session_id
            ));
        }

        let mut answers = self.answers.write().await;
        let record = match answers.values_mut().find(|a| {
            &a.session_id == session_id
                && &a.player_id == player_id
                && a.question_id == question_id
        }) {
            Some(existing) => {
                existing.is_correct = false;
                existing.clone()
            }
            None => {
                let record = PlayerAnswer {
                    id: ulid::Ulid::new().to_string(),
                    session_id: session_id.clone(),
                    player_id: player_id.clone(),
                    question_id: question_id.clone(),
                    answer: String::new(),
                    is_correct: false,
                    response_time_ms: 0,
                    submitted_at: chrono::Utc::now().to_rfc3339(),
                };
                answers.insert(record.id.clone(), record.clone());
                record
            }
        };
        drop(answers);

        tracing::info!(
            "Player {} marked wrong on question {}",
            player_id,
            question_id
        );
        let info = if session.state == SessionState::Result {
            AnswerInfo::revealed(&record)
        } else {
            AnswerInfo::from(&record)
        };
        self.broadcast_change(ServerMessage::AnswerUpserted { answer: info });
        self.broadcast_to_host(ServerMessage::HostAnswerUpserted {
            session_id: session_id.clone(),
            answer: record.clone(),
        });

        self.recompute_player_score(player_id).await;
        Ok(record)
    }

    /// All answers collected for one question, oldest first.
    pub async fn answers_for_question(
        &self,
        session_id: &SessionId,
        question_id: &QuestionId,
    ) -> Vec<PlayerAnswer> {
        let answers = self.answers.read().await;
        let mut list: Vec<PlayerAnswer> = answers
            .values()
            .filter(|a| &a.session_id == session_id && &a.question_id == question_id)
            .cloned()
            .collect();
        drop(answers);
        list.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        list
    }

    /// Set the player's score to the number of their correct answers and
    /// broadcast the player when it changed.
    async fn recompute_player_score(&self, player_id: &PlayerId) {
        let answers = self.answers.read().await;
        let correct = answers
            .values()
            .filter(|a| &a.player_id == player_id && a.is_correct)
            .count() as u32;
        drop(answers);

        let mut players = self.players.write().await;
        let Some(player) = players.get_mut(player_id) else {
            return;
        };
        if player.score == correct {
            return;
        }
        player.score = correct;
        let updated = player.clone();
        drop(players);

        tracing::debug!("Player {} score is now {}", updated.id, updated.score);
        self.broadcast_change(ServerMessage::PlayerUpserted { player: updated });
    }
}

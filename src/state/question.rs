//! Question bank management
//!
//! CRUD over the authored questions that quiz runs and game sessions draw
//! from. Listing matches the admin panel: newest first, optional kind
//! filter, page/limit pagination.

use crate::types::{Question, QuestionDraft, QuestionId};
use rand::seq::SliceRandom;
use serde::Serialize;

use super::AppState;

pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// One page of the question list plus the total count of matches.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionPage {
    pub items: Vec<Question>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl AppState {
    pub async fn create_question(&self, draft: QuestionDraft) -> Result<Question, String> {
        draft.validate()?;

        let now = chrono::Utc::now().to_rfc3339();
        let question = Question {
            id: ulid::Ulid::new().to_string(),
            prompt: draft.prompt,
            answer: draft.answer,
            hints: draft.hints,
            kind: draft.kind,
            created_at: now.clone(),
            updated_at: now,
        };

        self.questions
            .write()
            .await
            .insert(question.id.clone(), question.clone());

        tracing::info!("Created {} question: {}", question.kind.tag(), question.id);
        Ok(question)
    }

    pub async fn get_question(&self, id: &QuestionId) -> Option<Question> {
        self.questions.read().await.get(id).cloned()
    }

    pub async fn update_question(
        &self,
        id: &QuestionId,
        draft: QuestionDraft,
    ) -> Result<Question, String> {
        draft.validate()?;

        let mut questions = self.questions.write().await;
        let question = questions
            .get_mut(id)
            .ok_or_else(|| format!("Question not found: {}", id))?;

        question.prompt = draft.prompt;
        question.answer = draft.answer;
        question.hints = draft.hints;
        question.kind = draft.kind;
        question.updated_at = chrono::Utc::now().to_rfc3339();

        let updated = question.clone();
        drop(questions);

        tracing::info!("Updated question: {}", id);
        Ok(updated)
    }

    /// Remove a question and return it, so the caller can clean up any
    /// stored images afterwards.
    pub async fn delete_question(&self, id: &QuestionId) -> Option<Question> {
        let removed = self.questions.write().await.remove(id);
        if removed.is_some() {
            tracing::info!("Deleted question: {}", id);
        }
        removed
    }

    /// Newest-first listing with an optional kind filter. `page` is 1-based.
    pub async fn list_questions(
        &self,
        kind: Option<&str>,
        page: usize,
        limit: usize,
    ) -> QuestionPage {
        let page = page.max(1);
        let limit = limit.max(1);

        let questions = self.questions.read().await;
        let mut matches: Vec<Question> = questions
            .values()
            .filter(|q| kind.map_or(true, |k| q.kind.tag() == k))
            .cloned()
            .collect();
        drop(questions);

        // created_at is RFC 3339, so string order is chronological.
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matches.len();
        let start = (page - 1) * limit;
        let items: Vec<Question> = matches.into_iter().skip(start).take(limit).collect();

        QuestionPage {
            items,
            total,
            page,
            limit,
        }
    }

    /// Random draw from the question bank for a practice run: optional kind
    /// filter, shuffled, optionally capped.
    pub async fn draw_questions(&self, kind: Option<&str>, count: Option<usize>) -> Vec<Question> {
        let questions = self.questions.read().await;
        let mut pool: Vec<Question> = questions
            .values()
            .filter(|q| kind.map_or(true, |k| q.kind.tag() == k))
            .cloned()
            .collect();
        drop(questions);

        pool.shuffle(&mut rand::rng());
        if let Some(count) = count {
            pool.truncate(count);
        }
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuestionKind;

    fn draft(prompt: &str, kind: QuestionKind) -> QuestionDraft {
        QuestionDraft {
            prompt: prompt.to_string(),
            answer: "42".to_string(),
            hints: vec![],
            kind,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_question() {
        let state = AppState::new();
        let created = state
            .create_question(draft("What is the answer?", QuestionKind::Trivia))
            .await
            .unwrap();

        let fetched = state.get_question(&created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_draft() {
        let state = AppState::new();

        let result = state.create_question(draft("  ", QuestionKind::Trivia)).await;
        assert!(result.is_err());

        let result = state
            .create_question(draft("Who is this?", QuestionKind::GuessWho { image_urls: vec![] }))
            .await;
        assert!(result.is_err());
        assert!(state.questions.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_question() {
        let state = AppState::new();
        let created = state
            .create_question(draft("Old prompt", QuestionKind::Trivia))
            .await
            .unwrap();

        let updated = state
            .update_question(&created.id, draft("New prompt", QuestionKind::Trivia))
            .await
            .unwrap();
        assert_eq!(updated.prompt, "New prompt");
        assert_eq!(updated.created_at, created.created_at);

        let result = state
            .update_question(&"missing".to_string(), draft("X", QuestionKind::Trivia))
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("not found"));
    }

    #[tokio::test]
    async fn test_delete_returns_the_removed_question() {
        let state = AppState::new();
        let created = state
            .create_question(draft(
                "Name the movie",
                QuestionKind::Movie {
                    image_urls: vec!["http://assets/movie/1.jpg".to_string()],
                },
            ))
            .await
            .unwrap();

        let removed = state.delete_question(&created.id).await.unwrap();
        assert_eq!(removed.image_urls().len(), 1);
        assert!(state.get_question(&created.id).await.is_none());
        assert!(state.delete_question(&created.id).await.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_kind_and_paginates() {
        let state = AppState::new();
        for i in 0..5 {
            state
                .create_question(draft(&format!("Trivia {}", i), QuestionKind::Trivia))
                .await
                .unwrap();
        }
        for i in 0..3 {
            state
                .create_question(draft(
                    &format!("Movie {}", i),
                    QuestionKind::Movie {
                        image_urls: vec!["http://assets/movie/1.jpg".to_string()],
                    },
                ))
                .await
                .unwrap();
        }

        let all = state.list_questions(None, 1, DEFAULT_PAGE_LIMIT).await;
        assert_eq!(all.total, 8);
        assert_eq!(all.items.len(), 8);

        let movies = state.list_questions(Some("movie"), 1, DEFAULT_PAGE_LIMIT).await;
        assert_eq!(movies.total, 3);
        assert!(movies.items.iter().all(|q| q.kind.tag() == "movie"));

        let page1 = state.list_questions(Some("trivia"), 1, 2).await;
        let page2 = state.list_questions(Some("trivia"), 2, 2).await;
        let page3 = state.list_questions(Some("trivia"), 3, 2).await;
        assert_eq!(page1.items.len(), 2);
        assert_eq!(page2.items.len(), 2);
        assert_eq!(page3.items.len(), 1);
        assert_eq!(page1.total, 5);

        // No overlap between pages.
        let mut seen: Vec<String> = page1
            .items
            .iter()
            .chain(page2.items.iter())
            .chain(page3.items.iter())
            .map(|q| q.id.clone())
            .collect();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let state = AppState::new();
        let first = state
            .create_question(draft("first", QuestionKind::Trivia))
            .await
            .unwrap();
        // Force distinct timestamps.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = state
            .create_question(draft("second", QuestionKind::Trivia))
            .await
            .unwrap();

        let page = state.list_questions(None, 1, DEFAULT_PAGE_LIMIT).await;
        assert_eq!(page.items[0].id, second.id);
        assert_eq!(page.items[1].id, first.id);
    }

    #[tokio::test]
    async fn test_draw_questions_caps_count() {
        let state = AppState::new();
        for i in 0..4 {
            state
                .create_question(draft(&format!("Q{}", i), QuestionKind::Trivia))
                .await
                .unwrap();
        }
        assert_eq!(state.draw_questions(None, Some(2)).await.len(), 2);
        assert_eq!(state.draw_questions(None, None).await.len(), 4);
        assert_eq!(state.draw_questions(Some("movie"), None).await.len(), 0);
    }
}

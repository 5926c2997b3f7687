use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type QuestionId = String;
pub type SessionId = String;
pub type PlayerId = String;
pub type AnswerId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Waiting,
    Question,
    Result,
    Ended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Waiting => "waiting",
            SessionState::Question => "question",
            SessionState::Result => "result",
            SessionState::Ended => "ended",
        }
    }
}

/// Kind-specific part of a question. Trivia is text-only; the other kinds
/// carry one or more image URLs (guess-who browses them in sequence).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum QuestionKind {
    Trivia,
    Movie { image_urls: Vec<String> },
    PhotoYear { image_urls: Vec<String> },
    GuessWho { image_urls: Vec<String> },
}

impl QuestionKind {
    pub const TAGS: [&'static str; 4] = ["trivia", "movie", "photo-year", "guess-who"];

    pub fn tag(&self) -> &'static str {
        match self {
            QuestionKind::Trivia => "trivia",
            QuestionKind::Movie { .. } => "movie",
            QuestionKind::PhotoYear { .. } => "photo-year",
            QuestionKind::GuessWho { .. } => "guess-who",
        }
    }

    pub fn image_urls(&self) -> &[String] {
        match self {
            QuestionKind::Trivia => &[],
            QuestionKind::Movie { image_urls }
            | QuestionKind::PhotoYear { image_urls }
            | QuestionKind::GuessWho { image_urls } => image_urls,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    pub answer: String,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub created_at: String,
    pub updated_at: String,
}

impl Question {
    pub fn image_urls(&self) -> &[String] {
        self.kind.image_urls()
    }
}

/// Payload for creating or updating a question. Carries everything except
/// the id and timestamps, which the store owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub prompt: String,
    pub answer: String,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl QuestionDraft {
    /// Form-level validation: trimmed prompt and answer must be non-empty,
    /// and every kind except trivia needs at least one image.
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("Question text must not be empty".to_string());
        }
        if self.answer.trim().is_empty() {
            return Err("Answer must not be empty".to_string());
        }
        if !matches!(self.kind, QuestionKind::Trivia) && self.kind.image_urls().is_empty() {
            return Err(format!(
                "Question kind '{}' requires at least one image",
                self.kind.tag()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSettings {
    pub allow_late_join: bool,
    pub question_seconds: u32,
    pub randomize_questions: bool,
    pub show_results_after_each: bool,
    pub countdown_seconds: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            allow_late_join: true,
            question_seconds: 30,
            randomize_questions: false,
            show_results_after_each: true,
            countdown_seconds: 3,
        }
    }
}

/// Overrides merged onto `SessionSettings::default()` at session creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub allow_late_join: Option<bool>,
    pub question_seconds: Option<u32>,
    pub randomize_questions: Option<bool>,
    pub show_results_after_each: Option<bool>,
    pub countdown_seconds: Option<u32>,
}

impl SessionSettings {
    pub fn with_patch(patch: &SettingsPatch) -> Self {
        let mut settings = Self::default();
        if let Some(v) = patch.allow_late_join {
            settings.allow_late_join = v;
        }
        if let Some(v) = patch.question_seconds {
            settings.question_seconds = v;
        }
        if let Some(v) = patch.randomize_questions {
            settings.randomize_questions = v;
        }
        if let Some(v) = patch.show_results_after_each {
            settings.show_results_after_each = v;
        }
        if let Some(v) = patch.countdown_seconds {
            settings.countdown_seconds = v;
        }
        settings
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSession {
    pub id: SessionId,
    pub name: String,
    pub state: SessionState,
    pub question_ids: Vec<QuestionId>,
    /// Both pointer fields are unset while waiting and after the session ends.
    pub current_question_index: Option<usize>,
    pub current_question_id: Option<QuestionId>,
    pub settings: SessionSettings,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub session_id: SessionId,
    pub name: String,
    pub score: u32,
    pub is_active: bool,
    pub joined_at: String,
    pub last_active_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerAnswer {
    pub id: AnswerId,
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub question_id: QuestionId,
    pub answer: String,
    pub is_correct: bool,
    pub response_time_ms: u64,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Player,
    Beamer,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(kind: QuestionKind) -> QuestionDraft {
        QuestionDraft {
            prompt: "Which year?".to_string(),
            answer: "1999".to_string(),
            hints: vec![],
            kind,
        }
    }

    #[test]
    fn question_kind_serializes_with_kebab_case_tag() {
        let q = Question {
            id: "q1".to_string(),
            prompt: "Guess the year".to_string(),
            answer: "1988".to_string(),
            hints: vec!["late 80s".to_string()],
            kind: QuestionKind::PhotoYear {
                image_urls: vec!["http://assets/photo-year/1.jpg".to_string()],
            },
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["kind"], "photo-year");
        assert_eq!(json["image_urls"][0], "http://assets/photo-year/1.jpg");

        let back: Question = serde_json::from_value(json).unwrap();
        assert_eq!(back, q);
    }

    #[test]
    fn trivia_round_trips_without_image_field() {
        let json = serde_json::json!({
            "id": "q2",
            "prompt": "Capital of France?",
            "answer": "Paris",
            "kind": "trivia",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
        });
        let q: Question = serde_json::from_value(json).unwrap();
        assert_eq!(q.kind, QuestionKind::Trivia);
        assert!(q.hints.is_empty());
        assert!(q.image_urls().is_empty());
    }

    #[test]
    fn draft_validation_rejects_blank_prompt_and_answer() {
        let mut d = draft(QuestionKind::Trivia);
        d.prompt = "   ".to_string();
        assert!(d.validate().is_err());

        let mut d = draft(QuestionKind::Trivia);
        d.answer = "\t".to_string();
        assert!(d.validate().is_err());

        assert!(draft(QuestionKind::Trivia).validate().is_ok());
    }

    #[test]
    fn draft_validation_requires_image_for_picture_kinds() {
        let d = draft(QuestionKind::GuessWho { image_urls: vec![] });
        assert!(d.validate().is_err());

        let d = draft(QuestionKind::GuessWho {
            image_urls: vec!["http://assets/guess-who/1.jpg".to_string()],
        });
        assert!(d.validate().is_ok());

        let d = draft(QuestionKind::Movie { image_urls: vec![] });
        assert!(d.validate().is_err());
    }

    #[test]
    fn settings_patch_merges_onto_defaults() {
        let patch = SettingsPatch {
            question_seconds: Some(15),
            randomize_questions: Some(true),
            ..Default::default()
        };
        let settings = SessionSettings::with_patch(&patch);
        assert_eq!(settings.question_seconds, 15);
        assert!(settings.randomize_questions);
        // Untouched fields keep their defaults.
        assert!(settings.allow_late_join);
        assert_eq!(settings.countdown_seconds, 3);
        assert!(settings.show_results_after_each);
    }
}

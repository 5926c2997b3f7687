//! Quiz run state machine.
//!
//! Drives a single run through a fixed question sequence: present, answer (or
//! time out, or manually reveal), advance, finish. The machine is plain
//! synchronous state; the one-second tick is driven from outside by whoever
//! owns the run, so transitions never race each other.

use crate::types::Question;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Ready,
    Question,
    Answered,
    Finished,
}

/// Outcome of the current question, set when it was answered or timed out.
/// Absent after a manual `show_answer` reveal, which judges nothing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    /// What the player typed. None when the timer ran out before a submission.
    pub answer: Option<String>,
    pub correct: bool,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Untimed run, or not currently inside a question.
    Inert,
    Tick { remaining: u32 },
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Question,
    Finished { score: u32, total: usize },
}

/// Normalize an answer for comparison: trimmed and lowercased.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// The one comparison rule used everywhere an answer is judged, regardless of
/// question kind: case-insensitive on trimmed text.
pub fn answers_match(submitted: &str, correct: &str) -> bool {
    normalize(submitted) == normalize(correct)
}

pub struct QuizEngine {
    questions: Vec<Question>,
    time_limit: Option<u32>,
    on_finish: Option<Box<dyn FnMut(u32, usize) + Send>>,
    state: RunState,
    current_index: usize,
    score: u32,
    time_remaining: Option<u32>,
    verdict: Option<Verdict>,
}

impl QuizEngine {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            time_limit: None,
            on_finish: None,
            state: RunState::Ready,
            current_index: 0,
            score: 0,
            time_remaining: None,
            verdict: None,
        }
    }

    /// Enable the per-question countdown. Without it the run never
    /// auto-advances and `tick` is inert.
    pub fn with_time_limit(mut self, seconds: u32) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    /// Hook invoked exactly once per completed run with (score, total).
    pub fn with_on_finish(mut self, hook: impl FnMut(u32, usize) + Send + 'static) -> Self {
        self.on_finish = Some(Box::new(hook));
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn time_remaining(&self) -> Option<u32> {
        self.time_remaining
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    /// The question currently presented or just answered. None while the run
    /// has not started or has finished.
    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            RunState::Question | RunState::Answered => self.questions.get(self.current_index),
            RunState::Ready | RunState::Finished => None,
        }
    }

    /// Begin a run. Only valid from `Ready` with a non-empty question list;
    /// anything else is ignored.
    pub fn start(&mut self) -> bool {
        if self.state != RunState::Ready || self.questions.is_empty() {
            return false;
        }
        self.current_index = 0;
        self.score = 0;
        self.verdict = None;
        self.time_remaining = self.time_limit;
        self.state = RunState::Question;
        true
    }

    /// Judge a submitted answer against the current question. Returns the
    /// correctness, or None when no question is open (late submissions and
    /// double submissions land here and change nothing).
    pub fn submit(&mut self, answer: &str) -> Option<bool> {
        if self.state != RunState::Question {
            return None;
        }
        let correct = self
            .questions
            .get(self.current_index)
            .map(|q| answers_match(answer, &q.answer))
            .unwrap_or(false);
        if correct {
            self.score += 1;
        }
        self.verdict = Some(Verdict {
            answer: Some(answer.to_string()),
            correct,
            timed_out: false,
        });
        self.time_remaining = None;
        self.state = RunState::Answered;
        Some(correct)
    }

    /// Reveal the answer without judging anything. The unscored counterpart
    /// of `submit` for call sites that never collect an answer value.
    pub fn show_answer(&mut self) -> bool {
        if self.state != RunState::Question {
            return false;
        }
        self.verdict = None;
        self.time_remaining = None;
        self.state = RunState::Answered;
        true
    }

    /// Advance the countdown by one second. At zero the open question is
    /// closed as not correct, with no recorded answer text.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != RunState::Question {
            return TickOutcome::Inert;
        }
        let Some(remaining) = self.time_remaining else {
            return TickOutcome::Inert;
        };
        if remaining > 1 {
            self.time_remaining = Some(remaining - 1);
            return TickOutcome::Tick {
                remaining: remaining - 1,
            };
        }
        self.verdict = Some(Verdict {
            answer: None,
            correct: false,
            timed_out: true,
        });
        self.time_remaining = None;
        self.state = RunState::Answered;
        TickOutcome::TimedOut
    }

    /// Move on from an answered question: either the next question with a
    /// fresh timer, or the end of the run. The finish hook fires on the
    /// transition into `Finished` and only there.
    pub fn next(&mut self) -> Option<Advance> {
        if self.state != RunState::Answered {
            return None;
        }
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
            self.verdict = None;
            self.time_remaining = self.time_limit;
            self.state = RunState::Question;
            return Some(Advance::Question);
        }
        self.state = RunState::Finished;
        let score = self.score;
        let total = self.questions.len();
        if let Some(hook) = self.on_finish.as_mut() {
            hook(score, total);
        }
        Some(Advance::Finished { score, total })
    }

    /// Back to `Ready` with all counters cleared. A later `start` behaves
    /// exactly like a fresh run; the finish hook is not re-fired for the run
    /// that just ended.
    pub fn reset(&mut self) {
        self.current_index = 0;
        self.score = 0;
        self.verdict = None;
        self.time_remaining = None;
        self.state = RunState::Ready;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuestionKind;
    use std::sync::{Arc, Mutex};

    fn question(prompt: &str, answer: &str) -> Question {
        Question {
            id: ulid::Ulid::new().to_string(),
            prompt: prompt.to_string(),
            answer: answer.to_string(),
            hints: vec![],
            kind: QuestionKind::Trivia,
            created_at: chrono::Utc::now().to_rfc3339(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn three_questions() -> Vec<Question> {
        vec![
            question("First?", "A"),
            question("Second?", "B"),
            question("Third?", "C"),
        ]
    }

    #[test]
    fn full_run_reaches_finished_exactly_once() {
        let finishes = Arc::new(Mutex::new(Vec::new()));
        let sink = finishes.clone();
        let mut engine = QuizEngine::new(three_questions())
            .with_on_finish(move |score, total| sink.lock().unwrap().push((score, total)));

        assert!(engine.start());
        for _ in 0..3 {
            engine.submit("whatever");
            engine.next();
        }
        assert_eq!(engine.state(), RunState::Finished);
        // Further next() calls change nothing and never re-finish.
        assert_eq!(engine.next(), None);
        assert_eq!(engine.next(), None);
        assert_eq!(finishes.lock().unwrap().len(), 1);
    }

    #[test]
    fn score_counts_case_insensitive_matches() {
        let mut engine =
            QuizEngine::new(vec![question("Capital?", "Paris"), question("2+2?", "5")]);
        engine.start();
        assert_eq!(engine.submit("paris"), Some(true));
        engine.next();
        assert_eq!(engine.submit("4"), Some(false));
        engine.next();
        assert_eq!(engine.state(), RunState::Finished);
        assert_eq!(engine.score(), 1);
    }

    #[test]
    fn comparison_trims_whitespace() {
        assert!(answers_match("  Paris ", "paris"));
        assert!(answers_match("1999", " 1999 "));
        assert!(!answers_match("pariss", "paris"));
    }

    #[test]
    fn timeout_counts_as_incorrect_without_answer_text() {
        let mut engine = QuizEngine::new(three_questions()).with_time_limit(2);
        engine.start();
        assert_eq!(engine.time_remaining(), Some(2));
        assert_eq!(engine.tick(), TickOutcome::Tick { remaining: 1 });
        assert_eq!(engine.tick(), TickOutcome::TimedOut);
        assert_eq!(engine.state(), RunState::Answered);
        assert_eq!(engine.score(), 0);

        let verdict = engine.verdict().unwrap();
        assert!(verdict.timed_out);
        assert!(!verdict.correct);
        assert_eq!(verdict.answer, None);

        // A timed-out question is closed; a late submission is ignored.
        assert_eq!(engine.submit("A"), None);
        assert_eq!(engine.score(), 0);
    }

    #[test]
    fn timer_restarts_from_full_limit_on_every_question() {
        let mut engine = QuizEngine::new(three_questions()).with_time_limit(10);
        engine.start();
        engine.tick();
        engine.tick();
        assert_eq!(engine.time_remaining(), Some(8));
        engine.submit("A");
        // Stopped, not paused.
        assert_eq!(engine.time_remaining(), None);
        assert_eq!(engine.tick(), TickOutcome::Inert);
        engine.next();
        assert_eq!(engine.time_remaining(), Some(10));
    }

    #[test]
    fn untimed_run_never_auto_advances() {
        let mut engine = QuizEngine::new(three_questions());
        engine.start();
        for _ in 0..1000 {
            assert_eq!(engine.tick(), TickOutcome::Inert);
        }
        assert_eq!(engine.state(), RunState::Question);
    }

    #[test]
    fn double_submit_is_ignored() {
        let mut engine = QuizEngine::new(three_questions());
        engine.start();
        assert_eq!(engine.submit("A"), Some(true));
        assert_eq!(engine.submit("A"), None);
        assert_eq!(engine.submit("B"), None);
        assert_eq!(engine.score(), 1);
    }

    #[test]
    fn start_is_guarded_outside_ready() {
        let mut engine = QuizEngine::new(three_questions());
        assert!(engine.start());
        assert!(!engine.start());
        engine.submit("A");
        assert!(!engine.start());

        // An empty run is not startable at all.
        let mut empty = QuizEngine::new(vec![]);
        assert!(!empty.start());
        assert_eq!(empty.state(), RunState::Ready);
    }

    #[test]
    fn single_question_run_finishes_on_first_next() {
        let mut engine = QuizEngine::new(vec![question("Only?", "X")]);
        engine.start();
        engine.submit("x");
        assert_eq!(
            engine.next(),
            Some(Advance::Finished { score: 1, total: 1 })
        );
        assert_eq!(engine.state(), RunState::Finished);
    }

    #[test]
    fn reset_returns_to_a_fresh_ready_state() {
        let finishes = Arc::new(Mutex::new(0u32));
        let sink = finishes.clone();
        let mut engine = QuizEngine::new(vec![question("Only?", "X")])
            .with_time_limit(5)
            .with_on_finish(move |_, _| *sink.lock().unwrap() += 1);

        engine.start();
        engine.submit("x");
        engine.next();
        assert_eq!(engine.state(), RunState::Finished);

        engine.reset();
        assert_eq!(engine.state(), RunState::Ready);
        assert_eq!(engine.current_index(), 0);
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.verdict(), None);
        assert_eq!(*finishes.lock().unwrap(), 1);

        // The next run behaves like the first, hook fires again for it.
        engine.start();
        assert_eq!(engine.time_remaining(), Some(5));
        engine.submit("wrong");
        engine.next();
        assert_eq!(*finishes.lock().unwrap(), 2);
    }

    #[test]
    fn show_answer_judges_nothing() {
        let mut engine = QuizEngine::new(three_questions());
        engine.start();
        assert!(engine.show_answer());
        assert_eq!(engine.state(), RunState::Answered);
        assert_eq!(engine.verdict(), None);
        assert_eq!(engine.score(), 0);
        // Already answered, a second reveal is a no-op.
        assert!(!engine.show_answer());
    }

    #[test]
    fn scenario_three_questions_score_two() {
        let finishes = Arc::new(Mutex::new(Vec::new()));
        let sink = finishes.clone();
        let mut engine = QuizEngine::new(vec![
            question("1?", "A"),
            question("2?", "B"),
            question("3?", "C"),
        ])
        .with_on_finish(move |score, total| sink.lock().unwrap().push((score, total)));

        engine.start();
        engine.submit("A");
        engine.next();
        engine.submit("wrong");
        engine.next();
        engine.submit("C");
        engine.next();

        assert_eq!(engine.score(), 2);
        assert_eq!(*finishes.lock().unwrap(), vec![(2, 3)]);
    }

    #[test]
    fn current_question_visible_only_during_a_run() {
        let mut engine = QuizEngine::new(three_questions());
        assert!(engine.current_question().is_none());
        engine.start();
        assert_eq!(engine.current_question().unwrap().prompt, "First?");
        engine.submit("A");
        assert_eq!(engine.current_question().unwrap().prompt, "First?");
        engine.next();
        assert_eq!(engine.current_question().unwrap().prompt, "Second?");
    }
}

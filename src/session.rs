//! Session State Types
//!
//! The progress record of one conversation. Values are replaced, never
//! mutated in place: engine operations take `&SessionState` and return a new
//! one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Answer payload recorded against a question id
pub type AnswerValue = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Unique session ID
    pub session_id: Uuid,
    /// Absent until the first answer is accepted
    #[serde(default)]
    pub current_phase: Option<String>,
    /// Id of the most recently answered question
    #[serde(default)]
    pub current_question_id: Option<String>,
    /// Recorded answers, last write wins
    #[serde(default)]
    pub answers: BTreeMap<String, AnswerValue>,
    /// Questions asked in the current phase; reset on phase advance
    #[serde(default)]
    pub total_questions_asked: u32,
    /// Questions asked across the whole session; never reset
    #[serde(default)]
    pub questions_asked_total: u32,
    /// Session-wide follow-up count
    #[serde(default)]
    pub followup_count: u32,
    /// Session-wide drift count
    #[serde(default)]
    pub drift_count: u32,
}

impl SessionState {
    /// Create a new session with a random id
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    /// Create a new session with a caller-chosen id
    pub fn with_id(session_id: Uuid) -> Self {
        Self {
            session_id,
            current_phase: None,
            current_question_id: None,
            answers: BTreeMap::new(),
            total_questions_asked: 0,
            questions_asked_total: 0,
            followup_count: 0,
            drift_count: 0,
        }
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.answers.contains_key(question_id)
    }

    pub fn answer(&self, question_id: &str) -> Option<&AnswerValue> {
        self.answers.get(question_id)
    }

    pub fn has_started(&self) -> bool {
        self.current_phase.is_some()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

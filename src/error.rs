//! Error types for the interview core
//!
//! Every failure is a returned value. A caller can always tell an accepted
//! transition (new state) apart from a rejected one (error, input untouched).

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while compiling a template document
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Missing front-matter header: document must start with a '---' block")]
    MissingHeader,

    #[error("Unterminated front-matter header: no closing '---'")]
    UnterminatedHeader,

    #[error("Header is missing required field '{0}'")]
    MissingHeaderField(&'static str),

    #[error("Invalid YAML in {section} section: {message}")]
    Yaml { section: String, message: String },

    #[error("Section '{section}' appears more than once (line {line})")]
    DuplicateSection { section: String, line: usize },

    #[error("Required section '{0}' is missing")]
    MissingSection(&'static str),

    #[error("Phase block is present but declares no phases")]
    EmptyPhaseBlock,

    #[error("Duplicate phase '{phase}' (line {line})")]
    DuplicatePhase { phase: String, line: usize },

    #[error("Question #{index} is malformed: {reason}")]
    MalformedQuestion { index: usize, reason: String },

    #[error("Question #{index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("Question '{question_id}' has unknown type '{value}'")]
    UnknownQuestionType { question_id: String, value: String },

    #[error("Choice question '{0}' declares no options")]
    MissingOptions(String),

    #[error("Duplicate question id '{0}'")]
    DuplicateQuestionId(String),

    #[error("Question '{question_id}' references undeclared phase '{phase}'")]
    UndeclaredPhase { question_id: String, phase: String },

    #[error("Malformed rule at line {line}: '{content}'")]
    MalformedRule { line: usize, content: String },

    #[error("Duplicate rule '{key}' (line {line})")]
    DuplicateRule { key: String, line: usize },
}

/// A single structural finding against a compiled template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub rule: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

/// All findings for one template, reported together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub template_id: String,
    pub errors: Vec<ValidationError>,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "template '{}' failed validation ({} finding(s))",
            self.template_id,
            self.errors.len()
        )?;
        for error in &self.errors {
            write!(f, "; {}", error)?;
        }
        Ok(())
    }
}

/// Template registry errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Validation error: {0}")]
    Validation(ValidationReport),

    #[error("No active template for '{0}'")]
    NotFound(String),

    #[error("Registry lock poisoned")]
    LockPoisoned,
}

/// The session limit that rejected an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    MaxQuestions,
    MaxFollowups,
    DriftHardLimit,
}

impl LimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::MaxQuestions => "maxQuestions",
            LimitKind::MaxFollowups => "maxFollowups",
            LimitKind::DriftHardLimit => "driftHardLimit",
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facilitation engine errors. Terminal for the call; the input state is
/// never modified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Question '{0}' is not declared in the template")]
    InvalidQuestion(String),

    #[error("Question '{question_id}' belongs to phase '{phase}', not permitted while in {}", .current.as_deref().unwrap_or("<not started>"))]
    PhaseViolation {
        question_id: String,
        phase: String,
        current: Option<String>,
    },

    #[error("Limit exceeded: {0}")]
    LimitExceeded(LimitKind),

    #[error("Question skipping is disabled by the protocol")]
    SkippingDisabled,
}

/// Protocol configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid protocol: {0}")]
    Invalid(String),

    #[error("Rule override '{key}' expects {expected}")]
    OverrideType { key: String, expected: &'static str },
}

/// Session store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Session {session_id} revision conflict: expected {expected}, found {actual}")]
    Conflict {
        session_id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("Session store lock poisoned")]
    LockPoisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_kind_displays_protocol_key() {
        let err = EngineError::LimitExceeded(LimitKind::MaxFollowups);
        assert_eq!(err.to_string(), "Limit exceeded: maxFollowups");
    }

    #[test]
    fn phase_violation_names_missing_current_phase() {
        let err = EngineError::PhaseViolation {
            question_id: "q3".into(),
            phase: "discover".into(),
            current: None,
        };
        assert!(err.to_string().contains("<not started>"));
    }

    #[test]
    fn report_lists_every_finding() {
        let report = ValidationReport {
            template_id: "t".into(),
            errors: vec![
                ValidationError::new("T1", "empty id"),
                ValidationError::new("T4", "no questions"),
            ],
        };
        let text = report.to_string();
        assert!(text.contains("[T1] empty id"));
        assert!(text.contains("[T4] no questions"));
    }
}

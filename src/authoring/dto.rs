use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Phase skeleton used when a document declares no phase block.
pub const DEFAULT_PHASES: [&str; 5] = ["greet", "discover", "validate", "synthesize", "advance"];

pub fn default_phases() -> Vec<String> {
    DEFAULT_PHASES.iter().map(|p| p.to_string()).collect()
}

fn is_false(v: &bool) -> bool {
    !v
}

// ── Template ──

/// A compiled, validated interview template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared phases in traversal order.
    pub phases: Vec<String>,
    /// Questions in declaration order.
    pub questions: Vec<Question>,
    #[serde(default)]
    pub rules: BTreeMap<String, RuleValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    pub compile_info: CompileInfo,
}

impl Template {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn has_phase(&self, phase: &str) -> bool {
        self.phases.iter().any(|p| p == phase)
    }

    /// Questions of one phase, in declaration order.
    pub fn questions_in_phase<'a>(&'a self, phase: &'a str) -> impl Iterator<Item = &'a Question> {
        self.questions.iter().filter(move |q| q.phase == phase)
    }

    /// All questions ordered by phase order, then declaration order.
    pub fn traversal_order(&self) -> impl Iterator<Item = &Question> {
        self.phases
            .iter()
            .flat_map(move |phase| self.questions_in_phase(phase))
    }
}

// ── Question ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub phase: String,
    pub text: String,
    #[serde(rename = "type", default)]
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    FreeText,
    SingleChoice,
    MultiChoice,
}

impl QuestionType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free_text" => Some(QuestionType::FreeText),
            "single_choice" => Some(QuestionType::SingleChoice),
            "multi_choice" => Some(QuestionType::MultiChoice),
            _ => None,
        }
    }

    pub fn is_choice(&self) -> bool {
        !matches!(self, QuestionType::FreeText)
    }
}

// ── Rules ──

/// A rule override value after literal coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl RuleValue {
    /// Coerce a raw literal: boolean, then integer, then float, else text.
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return RuleValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return RuleValue::Bool(false);
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return RuleValue::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return RuleValue::Float(f);
            }
        }
        RuleValue::Text(unquote(trimmed).to_string())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RuleValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            RuleValue::Integer(i) => u32::try_from(*i).ok(),
            _ => None,
        }
    }
}

fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

// ── Compile metadata ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileInfo {
    pub phase_count: usize,
    pub question_count: usize,
    #[serde(default, skip_serializing_if = "is_false")]
    pub phases_defaulted: bool,
    pub source: SourceRef,
}

/// Back-reference to the raw document a template was compiled from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Caller-supplied label, usually a file path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Hex SHA-256 of the raw document.
    pub sha256: String,
    pub byte_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_literals() {
        assert_eq!(RuleValue::coerce("TRUE"), RuleValue::Bool(true));
        assert_eq!(RuleValue::coerce(" false "), RuleValue::Bool(false));
        assert_eq!(RuleValue::coerce("12"), RuleValue::Integer(12));
        assert_eq!(RuleValue::coerce("-3"), RuleValue::Integer(-3));
        assert_eq!(RuleValue::coerce("0.75"), RuleValue::Float(0.75));
        assert_eq!(RuleValue::coerce("warm"), RuleValue::Text("warm".into()));
        assert_eq!(RuleValue::coerce("\"12\""), RuleValue::Text("12".into()));
        assert_eq!(RuleValue::coerce("inf"), RuleValue::Text("inf".into()));
    }

    #[test]
    fn question_type_parse() {
        assert_eq!(QuestionType::parse("single_choice"), Some(QuestionType::SingleChoice));
        assert_eq!(QuestionType::parse("Multi_Choice"), Some(QuestionType::MultiChoice));
        assert_eq!(QuestionType::parse("essay"), None);
        assert!(!QuestionType::default().is_choice());
    }

    #[test]
    fn rule_value_accessors() {
        assert_eq!(RuleValue::Integer(5).as_u32(), Some(5));
        assert_eq!(RuleValue::Integer(-1).as_u32(), None);
        assert_eq!(RuleValue::Text("5".into()).as_u32(), None);
        assert_eq!(RuleValue::Bool(true).as_bool(), Some(true));
    }
}

//! Facilitation Protocol
//!
//! The rule set governing phase order and session budgets. Loaded from YAML
//! and optionally adjusted by a template's rule overrides.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::authoring::dto::{default_phases, RuleValue};
use crate::error::ProtocolError;

fn default_true() -> bool {
    true
}

fn default_max_questions() -> u32 {
    20
}

fn default_max_followups() -> u32 {
    3
}

fn default_drift_soft_limit() -> u32 {
    2
}

fn default_drift_hard_limit() -> u32 {
    4
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    /// Authoritative advancement order. May differ from a template's own
    /// phase list.
    #[serde(default = "default_phases")]
    pub phases: Vec<String>,
    #[serde(default = "default_true")]
    pub one_question_mode: bool,
    #[serde(default = "default_max_questions")]
    pub max_questions: u32,
    #[serde(default = "default_max_followups")]
    pub max_followups: u32,
    #[serde(default = "default_drift_soft_limit")]
    pub drift_soft_limit: u32,
    #[serde(default = "default_drift_hard_limit")]
    pub drift_hard_limit: u32,
    #[serde(default)]
    pub allow_question_merging: bool,
    #[serde(default)]
    pub allow_question_skipping: bool,
    #[serde(default = "default_true")]
    pub strict_phases: bool,
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            phases: default_phases(),
            one_question_mode: true,
            max_questions: default_max_questions(),
            max_followups: default_max_followups(),
            drift_soft_limit: default_drift_soft_limit(),
            drift_hard_limit: default_drift_hard_limit(),
            allow_question_merging: false,
            allow_question_skipping: false,
            strict_phases: true,
        }
    }
}

impl Protocol {
    /// Parse and validate a protocol from YAML. Missing keys take defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ProtocolError> {
        let protocol: Protocol =
            serde_yaml::from_str(yaml).map_err(|e| ProtocolError::Invalid(e.to_string()))?;
        protocol.validate()?;
        Ok(protocol)
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.phases.is_empty() {
            return Err(ProtocolError::Invalid("no phases declared".to_string()));
        }
        let mut seen = HashSet::new();
        for phase in &self.phases {
            if phase.trim().is_empty() {
                return Err(ProtocolError::Invalid("empty phase name".to_string()));
            }
            if !seen.insert(phase.as_str()) {
                return Err(ProtocolError::Invalid(format!("duplicate phase '{}'", phase)));
            }
        }
        if self.max_questions == 0 {
            return Err(ProtocolError::Invalid(
                "max_questions must be at least 1".to_string(),
            ));
        }
        if self.drift_soft_limit > self.drift_hard_limit {
            return Err(ProtocolError::Invalid(format!(
                "drift_soft_limit ({}) exceeds drift_hard_limit ({})",
                self.drift_soft_limit, self.drift_hard_limit
            )));
        }
        Ok(())
    }

    /// Phase that follows `phase` in advancement order.
    pub fn next_phase(&self, phase: &str) -> Option<&str> {
        let idx = self.phases.iter().position(|p| p == phase)?;
        self.phases.get(idx + 1).map(String::as_str)
    }

    /// Template phases absent from the advancement order. A session whose
    /// current phase is one of these can never advance.
    pub fn missing_phases<'t>(&self, template_phases: &'t [String]) -> Vec<&'t str> {
        template_phases
            .iter()
            .filter(|p| !self.phases.contains(p))
            .map(String::as_str)
            .collect()
    }

    /// Apply a template's rule overrides to a copy of this protocol.
    ///
    /// Keys naming a protocol setting must carry the matching type; other
    /// keys are left for downstream consumers (prompt rendering, reports).
    pub fn with_overrides(&self, rules: &BTreeMap<String, RuleValue>) -> Result<Self, ProtocolError> {
        let mut protocol = self.clone();
        for (key, value) in rules {
            let applied = match key.as_str() {
                "one_question_mode" => set_bool(&mut protocol.one_question_mode, key, value)?,
                "allow_question_merging" => {
                    set_bool(&mut protocol.allow_question_merging, key, value)?
                }
                "allow_question_skipping" => {
                    set_bool(&mut protocol.allow_question_skipping, key, value)?
                }
                "strict_phases" => set_bool(&mut protocol.strict_phases, key, value)?,
                "max_questions" => set_u32(&mut protocol.max_questions, key, value)?,
                "max_followups" => set_u32(&mut protocol.max_followups, key, value)?,
                "drift_soft_limit" => set_u32(&mut protocol.drift_soft_limit, key, value)?,
                "drift_hard_limit" => set_u32(&mut protocol.drift_hard_limit, key, value)?,
                _ => false,
            };
            if applied {
                tracing::debug!(rule = %key, ?value, "Applied protocol override");
            }
        }
        protocol.validate()?;
        Ok(protocol)
    }
}

fn set_bool(slot: &mut bool, key: &str, value: &RuleValue) -> Result<bool, ProtocolError> {
    *slot = value.as_bool().ok_or_else(|| ProtocolError::OverrideType {
        key: key.to_string(),
        expected: "a boolean",
    })?;
    Ok(true)
}

fn set_u32(slot: &mut u32, key: &str, value: &RuleValue) -> Result<bool, ProtocolError> {
    *slot = value.as_u32().ok_or_else(|| ProtocolError::OverrideType {
        key: key.to_string(),
        expected: "a non-negative integer",
    })?;
    Ok(true)
}

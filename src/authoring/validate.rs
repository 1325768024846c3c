use super::dto::*;
use crate::error::ValidationError;
use std::collections::HashSet;

/// Validate a compiled Template before activation. Returns all errors found.
///
/// Templates produced by `compile()` always pass the phase and id rules; the
/// checks exist because a `Template` can also be deserialized or built by hand.
pub fn validate_template(template: &Template) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // T1: Identifier and name must be non-empty
    if template.id.trim().is_empty() {
        errors.push(ValidationError::new("T1", "Template id is empty"));
    }
    if template.name.trim().is_empty() {
        errors.push(ValidationError::new("T1", "Template name is empty"));
    }

    // T2: At least one phase, all names non-empty and unique
    if template.phases.is_empty() {
        errors.push(ValidationError::new("T2", "Template declares no phases"));
    }
    let mut phase_names: HashSet<&str> = HashSet::new();
    for phase in &template.phases {
        if phase.trim().is_empty() {
            errors.push(ValidationError::new("T2", "Empty phase name"));
        } else if !phase_names.insert(phase.as_str()) {
            errors.push(ValidationError::new(
                "T2",
                format!("Duplicate phase: {}", phase),
            ));
        }
    }

    // T3: At least one question
    if template.questions.is_empty() {
        errors.push(ValidationError::new("T3", "Template declares no questions"));
    }

    // T4: Question ids unique
    let mut ids: HashSet<&str> = HashSet::new();
    for question in &template.questions {
        if question.id.trim().is_empty() {
            errors.push(ValidationError::new("T4", "Question with empty id"));
        } else if !ids.insert(question.id.as_str()) {
            errors.push(ValidationError::new(
                "T4",
                format!("Duplicate question id: {}", question.id),
            ));
        }
    }

    for question in &template.questions {
        // T5: Every question phase is declared
        if !phase_names.contains(question.phase.as_str()) {
            errors.push(ValidationError::new(
                "T5",
                format!(
                    "Question {} references undeclared phase: {}",
                    question.id, question.phase
                ),
            ));
        }

        // T6: Question text non-empty
        if question.text.trim().is_empty() {
            errors.push(ValidationError::new(
                "T6",
                format!("Question {} has empty text", question.id),
            ));
        }

        // T7: Choice questions carry options
        if question.question_type.is_choice() && question.options.is_empty() {
            errors.push(ValidationError::new(
                "T7",
                format!("Choice question {} has no options", question.id),
            ));
        }
    }

    // T8: Compile counts match content
    let info = &template.compile_info;
    if info.phase_count != template.phases.len() || info.question_count != template.questions.len()
    {
        errors.push(ValidationError::new(
            "T8",
            format!(
                "Compile info counts ({} phases, {} questions) do not match template ({}, {})",
                info.phase_count,
                info.question_count,
                template.phases.len(),
                template.questions.len()
            ),
        ));
    }

    errors
}

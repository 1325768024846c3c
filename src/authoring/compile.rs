//! Document Compiler
//!
//! Turns a raw template document into a [`Template`] or a [`ParseError`].
//! Compilation is fail-closed: the first structural problem aborts the whole
//! compile and no partial template is ever returned. It is also pure: the
//! output depends only on the input text and the optional origin label.

use std::collections::{BTreeMap, HashSet};

use serde_yaml::Value;
use sha2::{Digest, Sha256};

use super::document::{split_document, Section, SectionKind};
use super::dto::*;
use crate::error::ParseError;

const DEFAULT_CATEGORY: &str = "general";

/// Compile a template document.
pub fn compile(raw: &str) -> Result<Template, ParseError> {
    compile_with_source(raw, None)
}

/// Compile a template document, recording `origin` (usually a file path) in
/// the compile metadata.
pub fn compile_with_source(raw: &str, origin: Option<&str>) -> Result<Template, ParseError> {
    let doc = split_document(raw)?;

    for heading in &doc.unknown_sections {
        tracing::warn!(section = %heading, "Ignoring unknown template section");
    }

    let header = parse_header(&doc.header)?;

    let (phases, phases_defaulted) = match doc.section(SectionKind::Phases) {
        Some(section) => (parse_phases(section)?, false),
        None => (default_phases(), true),
    };

    let questions_section = doc
        .section(SectionKind::Questions)
        .ok_or(ParseError::MissingSection("questions"))?;
    let questions = parse_questions(questions_section, &phases)?;

    let rules = match doc.section(SectionKind::Rules) {
        Some(section) => parse_rules(section)?,
        None => BTreeMap::new(),
    };

    let scoring = doc.section(SectionKind::Scoring).map(Section::verbatim);
    let report = doc.section(SectionKind::Report).map(Section::verbatim);

    let compile_info = CompileInfo {
        phase_count: phases.len(),
        question_count: questions.len(),
        phases_defaulted,
        source: SourceRef {
            origin: origin.map(str::to_string),
            sha256: hex::encode(Sha256::digest(raw.as_bytes())),
            byte_len: raw.len(),
        },
    };

    tracing::debug!(
        template_id = %header.id,
        phases = compile_info.phase_count,
        questions = compile_info.question_count,
        phases_defaulted,
        "Compiled template"
    );

    Ok(Template {
        id: header.id,
        name: header.name,
        category: header.category,
        description: header.description,
        phases,
        questions,
        rules,
        scoring,
        report,
        compile_info,
    })
}

// ── Header ──

struct Header {
    id: String,
    name: String,
    category: String,
    description: Option<String>,
}

fn parse_header(text: &str) -> Result<Header, ParseError> {
    let value: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(text).map_err(|e| ParseError::Yaml {
            section: "header".to_string(),
            message: e.to_string(),
        })?
    };

    let field = |key: &str| -> Option<String> {
        value
            .get(key)
            .and_then(scalar_string)
            .filter(|s| !s.is_empty())
    };

    Ok(Header {
        id: field("id").ok_or(ParseError::MissingHeaderField("id"))?,
        name: field("name").ok_or(ParseError::MissingHeaderField("name"))?,
        category: field("category").unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        description: field("description"),
    })
}

// ── Phases ──

fn parse_phases(section: &Section<'_>) -> Result<Vec<String>, ParseError> {
    let mut phases: Vec<String> = Vec::new();
    for (line_no, line) in section.numbered() {
        let name = strip_list_marker(line.trim());
        if name.is_empty() {
            continue;
        }
        if phases.iter().any(|p| p == name) {
            return Err(ParseError::DuplicatePhase {
                phase: name.to_string(),
                line: line_no,
            });
        }
        phases.push(name.to_string());
    }
    if phases.is_empty() {
        return Err(ParseError::EmptyPhaseBlock);
    }
    Ok(phases)
}

/// Strip a leading `-`, `*` or `1.` list marker.
fn strip_list_marker(line: &str) -> &str {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return rest.trim();
    }
    if line == "-" || line == "*" {
        return "";
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return rest.trim();
        }
    }
    line
}

// ── Questions ──

fn parse_questions(section: &Section<'_>, phases: &[String]) -> Result<Vec<Question>, ParseError> {
    let body = section.lines.join("\n");
    let value: Value = if body.trim().is_empty() {
        Value::Sequence(Vec::new())
    } else {
        serde_yaml::from_str(&body).map_err(|e| ParseError::Yaml {
            section: "questions".to_string(),
            message: e.to_string(),
        })?
    };

    let entries = match value {
        Value::Sequence(entries) => entries,
        _ => {
            return Err(ParseError::MalformedQuestion {
                index: 0,
                reason: "question block must be a list of entries".to_string(),
            })
        }
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut questions = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        let index = i + 1;
        let question = parse_question(index, entry)?;

        if !seen.insert(question.id.clone()) {
            return Err(ParseError::DuplicateQuestionId(question.id));
        }
        if !phases.iter().any(|p| *p == question.phase) {
            return Err(ParseError::UndeclaredPhase {
                question_id: question.id,
                phase: question.phase,
            });
        }
        questions.push(question);
    }

    Ok(questions)
}

fn parse_question(index: usize, entry: &Value) -> Result<Question, ParseError> {
    if !entry.is_mapping() {
        return Err(ParseError::MalformedQuestion {
            index,
            reason: "entry is not a key/value mapping".to_string(),
        });
    }

    let required = |field: &'static str| -> Result<String, ParseError> {
        entry
            .get(field)
            .and_then(scalar_string)
            .filter(|s| !s.is_empty())
            .ok_or(ParseError::MissingField { index, field })
    };

    let id = required("id")?;
    let phase = required("phase")?;
    let text = required("text")?;

    let question_type = match entry.get("type").and_then(scalar_string) {
        None => QuestionType::default(),
        Some(raw) => QuestionType::parse(&raw).ok_or_else(|| ParseError::UnknownQuestionType {
            question_id: id.clone(),
            value: raw,
        })?,
    };

    let options = match entry.get("options") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| {
                scalar_string(item).ok_or_else(|| ParseError::MalformedQuestion {
                    index,
                    reason: "options must be plain values".to_string(),
                })
            })
            .filter(|r| !matches!(r, Ok(s) if s.is_empty()))
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => match scalar_string(other) {
            Some(inline) => inline
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => {
                return Err(ParseError::MalformedQuestion {
                    index,
                    reason: "options must be a list or a comma-separated string".to_string(),
                })
            }
        },
    };

    if question_type.is_choice() && options.is_empty() {
        return Err(ParseError::MissingOptions(id));
    }

    Ok(Question {
        id,
        phase,
        text,
        question_type,
        options,
    })
}

/// Read a YAML scalar as trimmed text. Mappings, sequences and null yield `None`.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ── Rules ──

fn parse_rules(section: &Section<'_>) -> Result<BTreeMap<String, RuleValue>, ParseError> {
    let mut rules = BTreeMap::new();
    for (line_no, line) in section.numbered() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let entry = trimmed.strip_prefix("- ").unwrap_or(trimmed);
        let malformed = || ParseError::MalformedRule {
            line: line_no,
            content: trimmed.to_string(),
        };
        let (key, value) = entry.split_once(':').ok_or_else(malformed)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(malformed());
        }
        if rules.contains_key(key) {
            return Err(ParseError::DuplicateRule {
                key: key.to_string(),
                line: line_no,
            });
        }
        rules.insert(key.to_string(), RuleValue::coerce(value));
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "---\nid: discovery\nname: Discovery Call\ncategory: sales\n---\n";

    fn doc(body: &str) -> String {
        format!("{}{}", HEADER, body)
    }

    #[test]
    fn test_full_document() {
        let text = doc(r#"
## Phases
- greet
- discover

## Questions
- id: q1
  phase: greet
  text: How did you hear about us?
- id: q2
  phase: discover
  text: Which plan fits?
  type: single_choice
  options: [basic, pro]
- id: q3
  phase: discover
  text: Which add-ons?
  type: multi_choice
  options: "sso, audit, , support"

## Rules
max_questions: 12
strict_phases: true
- tone: "warm"
weight: 0.5

## Scoring
Score each answer 1-5.

## Report
Summarise the call.
"#);
        let tpl = compile_with_source(&text, Some("templates/discovery.md")).unwrap();
        assert_eq!(tpl.id, "discovery");
        assert_eq!(tpl.name, "Discovery Call");
        assert_eq!(tpl.category, "sales");
        assert_eq!(tpl.phases, vec!["greet", "discover"]);
        assert_eq!(tpl.questions.len(), 3);
        assert_eq!(tpl.questions[0].question_type, QuestionType::FreeText);
        assert_eq!(tpl.questions[1].options, vec!["basic", "pro"]);
        assert_eq!(tpl.questions[2].options, vec!["sso", "audit", "support"]);
        assert_eq!(tpl.rules["max_questions"], RuleValue::Integer(12));
        assert_eq!(tpl.rules["strict_phases"], RuleValue::Bool(true));
        assert_eq!(tpl.rules["tone"], RuleValue::Text("warm".into()));
        assert_eq!(tpl.rules["weight"], RuleValue::Float(0.5));
        assert_eq!(tpl.scoring.as_deref(), Some("Score each answer 1-5."));
        assert_eq!(tpl.report.as_deref(), Some("Summarise the call."));
        assert_eq!(tpl.compile_info.phase_count, 2);
        assert_eq!(tpl.compile_info.question_count, 3);
        assert!(!tpl.compile_info.phases_defaulted);
        assert_eq!(
            tpl.compile_info.source.origin.as_deref(),
            Some("templates/discovery.md")
        );
        assert_eq!(tpl.compile_info.source.sha256.len(), 64);
        assert_eq!(tpl.compile_info.source.byte_len, text.len());
    }

    #[test]
    fn test_missing_phase_block_uses_default_skeleton() {
        let text = doc("## Questions\n- id: q1\n  phase: discover\n  text: Why now?\n");
        let tpl = compile(&text).unwrap();
        assert_eq!(
            tpl.phases,
            vec!["greet", "discover", "validate", "synthesize", "advance"]
        );
        assert!(tpl.compile_info.phases_defaulted);
        assert!(tpl.scoring.is_none());
        assert!(tpl.report.is_none());
        assert!(tpl.rules.is_empty());
    }

    #[test]
    fn test_duplicate_question_id_fails() {
        let text = doc(
            "## Questions\n- id: q1\n  phase: greet\n  text: A\n- id: q1\n  phase: greet\n  text: B\n",
        );
        assert_eq!(
            compile(&text),
            Err(ParseError::DuplicateQuestionId("q1".into()))
        );
    }

    #[test]
    fn test_undeclared_phase_fails() {
        let text = doc("## Phases\ngreet\n## Questions\n- id: q1\n  phase: closing\n  text: Bye?\n");
        assert_eq!(
            compile(&text),
            Err(ParseError::UndeclaredPhase {
                question_id: "q1".into(),
                phase: "closing".into()
            })
        );
    }

    #[test]
    fn test_missing_required_fields() {
        let text = doc("## Questions\n- id: q1\n  phase: greet\n");
        assert_eq!(
            compile(&text),
            Err(ParseError::MissingField {
                index: 1,
                field: "text"
            })
        );

        let text = doc("## Questions\n- id: q1\n  text: Hi\n  phase: \"  \"\n");
        assert_eq!(
            compile(&text),
            Err(ParseError::MissingField {
                index: 1,
                field: "phase"
            })
        );
    }

    #[test]
    fn test_numeric_ids_read_as_text() {
        let text = doc("## Questions\n- id: 7\n  phase: greet\n  text: Seven?\n");
        let tpl = compile(&text).unwrap();
        assert_eq!(tpl.questions[0].id, "7");
    }

    #[test]
    fn test_choice_without_options_fails() {
        let text = doc("## Questions\n- id: q1\n  phase: greet\n  text: Pick\n  type: single_choice\n");
        assert_eq!(compile(&text), Err(ParseError::MissingOptions("q1".into())));
    }

    #[test]
    fn test_unknown_type_fails() {
        let text = doc("## Questions\n- id: q1\n  phase: greet\n  text: Pick\n  type: essay\n");
        assert!(matches!(
            compile(&text),
            Err(ParseError::UnknownQuestionType { .. })
        ));
    }

    #[test]
    fn test_phase_block_errors() {
        let text = doc("## Phases\n\n## Questions\n- id: q1\n  phase: greet\n  text: Hi\n");
        assert_eq!(compile(&text), Err(ParseError::EmptyPhaseBlock));

        let text = doc("## Phases\n1. greet\n2. greet\n## Questions\n");
        assert!(matches!(
            compile(&text),
            Err(ParseError::DuplicatePhase { ref phase, line: 8 }) if phase == "greet"
        ));
    }

    #[test]
    fn test_missing_header_fields() {
        let text = "---\nname: Nameless\n---\n## Questions\n- id: q1\n  phase: greet\n  text: Hi\n";
        assert_eq!(compile(text), Err(ParseError::MissingHeaderField("id")));
    }

    #[test]
    fn test_missing_questions_section() {
        let text = doc("## Phases\ngreet\n");
        assert_eq!(compile(&text), Err(ParseError::MissingSection("questions")));
    }

    #[test]
    fn test_rule_errors() {
        let text = doc("## Questions\n- id: q1\n  phase: greet\n  text: Hi\n## Rules\nno separator here\n");
        assert!(matches!(
            compile(&text),
            Err(ParseError::MalformedRule { line: 11, .. })
        ));

        let text = doc("## Questions\n- id: q1\n  phase: greet\n  text: Hi\n## Rules\na: 1\na: 2\n");
        assert!(matches!(
            compile(&text),
            Err(ParseError::DuplicateRule { ref key, .. }) if key == "a"
        ));
    }

    #[test]
    fn test_question_block_must_be_list() {
        let text = doc("## Questions\nid: q1\nphase: greet\n");
        assert!(matches!(
            compile(&text),
            Err(ParseError::MalformedQuestion { .. })
        ));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let text = doc("## Questions\n- id: q1\n  phase: greet\n  text: Hi\n");
        assert_eq!(compile(&text).unwrap(), compile(&text).unwrap());
    }
}

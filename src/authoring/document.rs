//! Raw document splitting
//!
//! Breaks a template document into its front-matter header and `## Heading`
//! sections. No interpretation of section bodies happens here.

use std::collections::BTreeMap;

use crate::error::ParseError;

/// Sections the compiler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SectionKind {
    Phases,
    Questions,
    Rules,
    Scoring,
    Report,
}

impl SectionKind {
    fn from_heading(heading: &str) -> Option<Self> {
        match heading.trim().to_ascii_lowercase().as_str() {
            "phases" => Some(SectionKind::Phases),
            "questions" => Some(SectionKind::Questions),
            "rules" => Some(SectionKind::Rules),
            "scoring" => Some(SectionKind::Scoring),
            "report" => Some(SectionKind::Report),
            _ => None,
        }
    }

    /// Free-text sections keep unknown `## ` lines as body text.
    fn is_opaque(&self) -> bool {
        matches!(self, SectionKind::Scoring | SectionKind::Report)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SectionKind::Phases => "phases",
            SectionKind::Questions => "questions",
            SectionKind::Rules => "rules",
            SectionKind::Scoring => "scoring",
            SectionKind::Report => "report",
        }
    }
}

/// One section body with the 1-based line number of its first body line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    pub first_line: usize,
    pub lines: Vec<&'a str>,
}

impl Section<'_> {
    /// Body lines joined back together, without leading or trailing blank lines.
    pub fn verbatim(&self) -> String {
        let start = self.lines.iter().position(|l| !l.trim().is_empty());
        let end = self.lines.iter().rposition(|l| !l.trim().is_empty());
        match (start, end) {
            (Some(s), Some(e)) => self.lines[s..=e].join("\n"),
            _ => String::new(),
        }
    }

    /// Body lines paired with their 1-based line numbers.
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.lines
            .iter()
            .enumerate()
            .map(move |(i, l)| (self.first_line + i, *l))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument<'a> {
    pub header: String,
    pub sections: BTreeMap<SectionKind, Section<'a>>,
    /// Headings that matched no known section.
    pub unknown_sections: Vec<String>,
}

impl<'a> RawDocument<'a> {
    pub fn section(&self, kind: SectionKind) -> Option<&Section<'a>> {
        self.sections.get(&kind)
    }
}

/// Split a document into header and sections.
pub fn split_document(raw: &str) -> Result<RawDocument<'_>, ParseError> {
    let lines: Vec<&str> = raw.lines().collect();

    let open = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .filter(|&i| lines[i].trim() == "---")
        .ok_or(ParseError::MissingHeader)?;
    let close = lines[open + 1..]
        .iter()
        .position(|l| l.trim() == "---")
        .map(|i| open + 1 + i)
        .ok_or(ParseError::UnterminatedHeader)?;

    let header = lines[open + 1..close].join("\n");

    let mut sections: BTreeMap<SectionKind, Section<'_>> = BTreeMap::new();
    let mut unknown_sections = Vec::new();
    // None while inside an unknown section or before the first heading.
    let mut current: Option<SectionKind> = None;

    for (idx, line) in lines.iter().enumerate().skip(close + 1) {
        let line_no = idx + 1;
        if let Some(heading) = level_two_heading(line) {
            let kind = SectionKind::from_heading(heading);
            if kind.is_none() && current.is_some_and(|k| k.is_opaque()) {
                if let Some(section) = current.and_then(|k| sections.get_mut(&k)) {
                    section.lines.push(*line);
                }
                continue;
            }
            current = kind;
            match current {
                Some(kind) => {
                    if sections.contains_key(&kind) {
                        return Err(ParseError::DuplicateSection {
                            section: kind.name().to_string(),
                            line: line_no,
                        });
                    }
                    sections.insert(
                        kind,
                        Section {
                            first_line: line_no + 1,
                            lines: Vec::new(),
                        },
                    );
                }
                None => unknown_sections.push(heading.trim().to_string()),
            }
            continue;
        }
        if let Some(section) = current.and_then(|k| sections.get_mut(&k)) {
            section.lines.push(*line);
        }
    }

    Ok(RawDocument {
        header,
        sections,
        unknown_sections,
    })
}

fn level_two_heading(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("## ")?;
    if rest.starts_with('#') {
        return None;
    }
    Some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_header_and_sections() {
        let doc = "---\nid: t\nname: T\n---\n## Phases\ngreet\n\n## Rules\nx: 1\n";
        let raw = split_document(doc).unwrap();
        assert_eq!(raw.header, "id: t\nname: T");
        let phases = raw.section(SectionKind::Phases).unwrap();
        assert_eq!(phases.first_line, 6);
        assert_eq!(phases.verbatim(), "greet");
        assert!(raw.section(SectionKind::Questions).is_none());
    }

    #[test]
    fn header_must_come_first() {
        assert_eq!(
            split_document("## Phases\ngreet\n"),
            Err(ParseError::MissingHeader)
        );
        assert_eq!(
            split_document("\n---\nid: t\n"),
            Err(ParseError::UnterminatedHeader)
        );
    }

    #[test]
    fn duplicate_section_rejected() {
        let doc = "---\nid: t\n---\n## Phases\na\n## phases\nb\n";
        assert!(matches!(
            split_document(doc),
            Err(ParseError::DuplicateSection { line: 6, .. })
        ));
    }

    #[test]
    fn unknown_sections_recorded_and_skipped() {
        let doc = "---\nid: t\n---\n## Notes\nanything\n## Report\nSummary here\n### Detail\n";
        let raw = split_document(doc).unwrap();
        assert_eq!(raw.unknown_sections, vec!["Notes".to_string()]);
        assert_eq!(
            raw.section(SectionKind::Report).unwrap().verbatim(),
            "Summary here\n### Detail"
        );
    }

    #[test]
    fn free_text_sections_keep_unknown_headings() {
        let doc = "---\nid: t\n---\n## Scoring\nWeights\n## Pain\nhigh\n## Report\nOutline\n## Summary\n## Notes\nafter\n";
        let raw = split_document(doc).unwrap();
        assert!(raw.unknown_sections.is_empty());
        assert_eq!(
            raw.section(SectionKind::Scoring).unwrap().verbatim(),
            "Weights\n## Pain\nhigh"
        );
        assert_eq!(
            raw.section(SectionKind::Report).unwrap().verbatim(),
            "Outline\n## Summary\n## Notes\nafter"
        );
    }
}

//! Configuration loading
//!
//! Resolves the configuration directory and loads the facilitation protocol
//! and template documents from it:
//!
//! ```text
//! <config_dir>/
//!   protocol.yaml        optional, defaults apply when absent
//!   templates/*.md       template documents
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::authoring::compile::compile_with_source;
use crate::authoring::dto::Template;
use crate::error::ParseError;
use crate::protocol::Protocol;

pub const CONFIG_DIR_ENV: &str = "INTERVIEW_CONFIG_DIR";

/// Outcome of compiling one template file
#[derive(Debug)]
pub struct TemplateLoad {
    pub path: PathBuf,
    pub result: Result<Template, ParseError>,
}

pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Create loader from INTERVIEW_CONFIG_DIR env var or default to "config"
    pub fn from_env() -> Self {
        let dir = std::env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| "config".to_string());
        Self::new(dir)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.config_dir.join("templates")
    }

    /// Load protocol.yaml, or the default protocol when the file is absent
    pub fn load_protocol(&self) -> Result<Protocol> {
        let path = self.config_dir.join("protocol.yaml");
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No protocol file, using defaults");
            return Ok(Protocol::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let protocol = Protocol::from_yaml(&content)
            .with_context(|| format!("Invalid protocol in {}", path.display()))?;
        Ok(protocol)
    }

    /// Compile every `*.md` file under templates/, sorted by path.
    ///
    /// I/O failures abort the load; compile failures are reported per file.
    pub fn load_templates(&self) -> Result<Vec<TemplateLoad>> {
        let dir = self.templates_dir();
        if !dir.is_dir() {
            anyhow::bail!("Templates directory not found: {}", dir.display());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "md"))
            .collect();
        paths.sort();

        let mut loads = Vec::with_capacity(paths.len());
        for path in paths {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let origin = path.display().to_string();
            let result = compile_with_source(&content, Some(&origin));
            if let Err(e) = &result {
                tracing::warn!(path = %origin, error = %e, "Template failed to compile");
            }
            loads.push(TemplateLoad { path, result });
        }
        Ok(loads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TEMPLATE: &str = "---\nid: t1\nname: T1\n---\n## Questions\n- id: q1\n  phase: greet\n  text: Hi\n";

    #[test]
    fn missing_protocol_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        assert_eq!(loader.load_protocol().unwrap(), Protocol::default());
    }

    #[test]
    fn protocol_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("protocol.yaml"), "max_questions: 7\n").unwrap();
        let loader = ConfigLoader::new(dir.path());
        assert_eq!(loader.load_protocol().unwrap().max_questions, 7);
    }

    #[test]
    fn invalid_protocol_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("protocol.yaml"), "max_questions: 0\n").unwrap();
        let loader = ConfigLoader::new(dir.path());
        let err = loader.load_protocol().unwrap_err();
        assert!(format!("{:#}", err).contains("max_questions"));
    }

    #[test]
    fn templates_compiled_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        fs::create_dir(&templates).unwrap();
        fs::write(templates.join("b_good.md"), TEMPLATE).unwrap();
        fs::write(templates.join("a_bad.md"), "no header").unwrap();
        fs::write(templates.join("notes.txt"), "ignored").unwrap();

        let loads = ConfigLoader::new(dir.path()).load_templates().unwrap();
        assert_eq!(loads.len(), 2);
        assert_eq!(loads[0].result, Err(ParseError::MissingHeader));
        let tpl = loads[1].result.as_ref().unwrap();
        assert_eq!(tpl.id, "t1");
        assert!(tpl
            .compile_info
            .source
            .origin
            .as_deref()
            .is_some_and(|o| o.ends_with("b_good.md")));
    }

    #[test]
    fn missing_templates_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ConfigLoader::new(dir.path()).load_templates().is_err());
    }
}

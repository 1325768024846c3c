use crate::authoring::dto::Template;
use crate::authoring::validate::validate_template;
use crate::error::{RegistryError, ValidationReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

// ── Activation State ──
// Active → Inactive when a newer version of the same identifier is activated.
// Exactly one version per identifier is Active once any has been activated.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateState {
    Active,
    Inactive,
}

/// One stored version of a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredTemplate {
    pub version: u32,
    pub state: TemplateState,
    pub activated_at: DateTime<Utc>,
    pub template: Template,
}

/// Outcome of a successful `activate` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationReceipt {
    pub template_id: String,
    pub version: u32,
    /// Version that was Active before this call, if any.
    pub replaced_version: Option<u32>,
}

/// In-memory registry of compiled templates.
///
/// Each `activate` runs under a single write lock, so readers never observe
/// an identifier with zero or two Active versions. Concurrent activations of
/// the same identifier are still ordered by whoever takes the lock first.
pub struct TemplateRegistry {
    inner: RwLock<HashMap<String, Vec<RegisteredTemplate>>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Validate and activate a template, deactivating the previous Active
    /// version of the same identifier.
    pub fn activate(&self, template: Template) -> Result<ActivationReceipt, RegistryError> {
        let errors = validate_template(&template);
        if !errors.is_empty() {
            tracing::warn!(
                template_id = %template.id,
                findings = errors.len(),
                "Rejected template activation"
            );
            return Err(RegistryError::Validation(ValidationReport {
                template_id: template.id,
                errors,
            }));
        }

        let mut store = self
            .inner
            .write()
            .map_err(|_| RegistryError::LockPoisoned)?;
        let versions = store.entry(template.id.clone()).or_default();

        let mut replaced_version = None;
        for entry in versions.iter_mut() {
            if entry.state == TemplateState::Active {
                entry.state = TemplateState::Inactive;
                replaced_version = Some(entry.version);
            }
        }

        let version = versions.iter().map(|e| e.version).max().unwrap_or(0) + 1;
        let receipt = ActivationReceipt {
            template_id: template.id.clone(),
            version,
            replaced_version,
        };

        versions.push(RegisteredTemplate {
            version,
            state: TemplateState::Active,
            activated_at: Utc::now(),
            template,
        });

        tracing::info!(
            template_id = %receipt.template_id,
            version,
            replaced = ?replaced_version,
            "Activated template"
        );
        Ok(receipt)
    }

    /// The Active template for an identifier.
    pub fn get_active(&self, template_id: &str) -> Result<Template, RegistryError> {
        let store = self.inner.read().map_err(|_| RegistryError::LockPoisoned)?;
        store
            .get(template_id)
            .and_then(|versions| {
                versions
                    .iter()
                    .find(|e| e.state == TemplateState::Active)
            })
            .map(|e| e.template.clone())
            .ok_or_else(|| RegistryError::NotFound(template_id.to_string()))
    }

    /// All stored versions of an identifier, oldest first.
    pub fn versions(&self, template_id: &str) -> Result<Vec<(u32, TemplateState)>, RegistryError> {
        let store = self.inner.read().map_err(|_| RegistryError::LockPoisoned)?;
        Ok(store
            .get(template_id)
            .map(|versions| versions.iter().map(|e| (e.version, e.state)).collect())
            .unwrap_or_default())
    }

    /// Known identifiers, sorted.
    pub fn identifiers(&self) -> Result<Vec<String>, RegistryError> {
        let store = self.inner.read().map_err(|_| RegistryError::LockPoisoned)?;
        let mut ids: Vec<String> = store.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authoring::compile::compile;
    use std::sync::Arc;

    fn sample_template(id: &str, name: &str) -> Template {
        compile(&format!(
            "---\nid: {}\nname: {}\n---\n## Phases\ngreet\n## Questions\n- id: q1\n  phase: greet\n  text: Hello?\n",
            id, name
        ))
        .unwrap()
    }

    #[test]
    fn activate_then_get_active() {
        let registry = TemplateRegistry::new();
        let receipt = registry.activate(sample_template("wf1", "First")).unwrap();
        assert_eq!(receipt.version, 1);
        assert_eq!(receipt.replaced_version, None);

        let active = registry.get_active("wf1").unwrap();
        assert_eq!(active.name, "First");
    }

    #[test]
    fn reactivation_replaces_previous_version() {
        let registry = TemplateRegistry::new();
        registry.activate(sample_template("wf1", "First")).unwrap();
        let receipt = registry.activate(sample_template("wf1", "Second")).unwrap();
        assert_eq!(receipt.version, 2);
        assert_eq!(receipt.replaced_version, Some(1));

        assert_eq!(registry.get_active("wf1").unwrap().name, "Second");
        assert_eq!(
            registry.versions("wf1").unwrap(),
            vec![(1, TemplateState::Inactive), (2, TemplateState::Active)]
        );
    }

    #[test]
    fn invalid_template_rejected_without_mutation() {
        let registry = TemplateRegistry::new();
        registry.activate(sample_template("wf1", "First")).unwrap();

        let mut broken = sample_template("wf1", "Broken");
        broken.questions.clear();
        let result = registry.activate(broken);
        match result {
            Err(RegistryError::Validation(report)) => {
                assert_eq!(report.template_id, "wf1");
                assert!(report.errors.iter().any(|e| e.rule == "T3"));
            }
            other => panic!("Expected validation error, got {:?}", other),
        }

        assert_eq!(registry.get_active("wf1").unwrap().name, "First");
        assert_eq!(registry.versions("wf1").unwrap().len(), 1);
    }

    #[test]
    fn unknown_identifier_not_found() {
        let registry = TemplateRegistry::new();
        assert_eq!(
            registry.get_active("missing"),
            Err(RegistryError::NotFound("missing".into()))
        );
        assert!(registry.versions("missing").unwrap().is_empty());
    }

    #[test]
    fn identifiers_are_independent() {
        let registry = TemplateRegistry::new();
        registry.activate(sample_template("b", "B")).unwrap();
        registry.activate(sample_template("a", "A")).unwrap();
        registry.activate(sample_template("a", "A2")).unwrap();
        assert_eq!(registry.identifiers().unwrap(), vec!["a", "b"]);
        assert_eq!(registry.get_active("b").unwrap().name, "B");
    }

    #[test]
    fn concurrent_activations_leave_one_active() {
        let registry = Arc::new(TemplateRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .activate(sample_template("shared", &format!("N{}", i)))
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let versions = registry.versions("shared").unwrap();
        assert_eq!(versions.len(), 8);
        let active = versions
            .iter()
            .filter(|(_, s)| *s == TemplateState::Active)
            .count();
        assert_eq!(active, 1);
        assert_eq!(versions.iter().map(|(v, _)| *v).max(), Some(8));
    }
}

//! Template authoring: document compilation, validation and the registry of
//! active templates.

pub mod compile;
pub mod document;
pub mod dto;
pub mod registry;
pub mod validate;

pub use compile::{compile, compile_with_source};
pub use dto::{
    default_phases, CompileInfo, Question, QuestionType, RuleValue, SourceRef, Template,
    DEFAULT_PHASES,
};
pub use registry::{ActivationReceipt, RegisteredTemplate, TemplateRegistry, TemplateState};
pub use validate::validate_template;

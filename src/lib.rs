//! Interview Core
//!
//! Compiles semi-structured interview templates into a validated question
//! graph and drives single conversations through it under a facilitation
//! protocol.
//!
//! Key concepts:
//! - Compilation is pure and fail-closed: a document yields a `Template` or a
//!   `ParseError`, never a partial template
//! - The registry keeps exactly one active template per identifier
//! - The engine holds no state of its own; every operation maps a
//!   `SessionState` to a new `SessionState` or a typed error
//!
//! # Example
//!
//! ```
//! use interview_core::{compile, FacilitationEngine, Protocol, SessionState};
//!
//! let template = compile(
//!     "---\nid: intro\nname: Intro\n---\n## Phases\ngreet\n## Questions\n- id: q1\n  phase: greet\n  text: Who are you?\n",
//! )
//! .unwrap();
//! let protocol = Protocol::default();
//! let engine = FacilitationEngine::new(&template, &protocol);
//!
//! let state = SessionState::new();
//! let question = engine.next_question(&state).unwrap();
//! let state = engine
//!     .apply_answer(&state, &question.id, serde_json::json!("Ada"))
//!     .unwrap();
//! assert!(engine.next_question(&state).is_none());
//! ```

pub mod authoring;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod session;
pub mod store;

pub use authoring::{
    compile, compile_with_source, validate_template, ActivationReceipt, Question, QuestionType,
    RuleValue, Template, TemplateRegistry,
};
pub use config::ConfigLoader;
pub use engine::{DriftOutcome, FacilitationEngine, Progress, SessionStatus};
pub use error::{
    EngineError, LimitKind, ParseError, ProtocolError, RegistryError, StoreError, ValidationError,
    ValidationReport,
};
pub use protocol::Protocol;
pub use session::{AnswerValue, SessionState};
pub use store::{MemorySessionStore, SessionStore, StoredSession};

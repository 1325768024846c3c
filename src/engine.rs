//! Facilitation Engine
//!
//! Drives one session through a compiled template under a protocol. Every
//! operation is a pure transformation: it reads the input `SessionState` and
//! returns either a new state or an `EngineError`, leaving the input as it
//! was. Phase advancement runs synchronously inside `apply_answer`, so a state
//! observed between answers always reflects everything already answered.

use serde::Serialize;
use uuid::Uuid;

use crate::authoring::dto::{Question, Template};
use crate::error::{EngineError, LimitKind};
use crate::protocol::Protocol;
use crate::session::{AnswerValue, SessionState};

/// Conceptual position of a session in the template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "phase", rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InPhase(String),
    Completed,
}

/// Result of recording a drift event
#[derive(Debug, Clone, PartialEq)]
pub struct DriftOutcome {
    pub state: SessionState,
    /// Set once the drift count exceeds the protocol's soft limit
    pub soft_limit_reached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseProgress {
    pub phase: String,
    pub answered: usize,
    pub total: usize,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub answered: usize,
    pub total: usize,
    pub phases: Vec<PhaseProgress>,
}

/// The facilitation engine for one template under one protocol
#[derive(Debug, Clone, Copy)]
pub struct FacilitationEngine<'a> {
    template: &'a Template,
    protocol: &'a Protocol,
}

impl<'a> FacilitationEngine<'a> {
    pub fn new(template: &'a Template, protocol: &'a Protocol) -> Self {
        for phase in protocol.missing_phases(&template.phases) {
            tracing::warn!(
                template_id = %template.id,
                phase,
                "Template phase missing from protocol, sessions cannot advance past it"
            );
        }
        Self { template, protocol }
    }

    pub fn template(&self) -> &'a Template {
        self.template
    }

    pub fn protocol(&self) -> &'a Protocol {
        self.protocol
    }

    /// First unanswered question by phase order, then declaration order.
    pub fn next_question(&self, state: &SessionState) -> Option<&'a Question> {
        self.template
            .traversal_order()
            .find(|q| !state.is_answered(&q.id))
    }

    /// Questions to put to the participant in the next turn.
    ///
    /// One question unless the protocol allows merging outside one-question
    /// mode, in which case every unanswered question of the next question's
    /// phase is returned.
    pub fn next_batch(&self, state: &SessionState) -> Vec<&'a Question> {
        let Some(first) = self.next_question(state) else {
            return Vec::new();
        };
        if self.protocol.one_question_mode || !self.protocol.allow_question_merging {
            return vec![first];
        }
        self.template
            .questions_in_phase(&first.phase)
            .filter(|q| !state.is_answered(&q.id))
            .collect()
    }

    /// A phase is complete when it declares at least one question and all of
    /// them have a recorded answer. Coverage is by id, not by call count.
    pub fn phase_complete(&self, state: &SessionState, phase: &str) -> bool {
        let mut declared = self.template.questions_in_phase(phase).peekable();
        declared.peek().is_some() && declared.all(|q| state.is_answered(&q.id))
    }

    pub fn status(&self, state: &SessionState) -> SessionStatus {
        if !self.template.questions.is_empty()
            && self
                .template
                .questions
                .iter()
                .all(|q| state.is_answered(&q.id))
        {
            return SessionStatus::Completed;
        }
        match &state.current_phase {
            None => SessionStatus::NotStarted,
            Some(phase) => SessionStatus::InPhase(phase.clone()),
        }
    }

    pub fn progress(&self, state: &SessionState) -> Progress {
        let phases: Vec<PhaseProgress> = self
            .template
            .phases
            .iter()
            .map(|phase| {
                let total = self.template.questions_in_phase(phase).count();
                let answered = self
                    .template
                    .questions_in_phase(phase)
                    .filter(|q| state.is_answered(&q.id))
                    .count();
                PhaseProgress {
                    phase: phase.clone(),
                    answered,
                    total,
                    complete: total > 0 && answered == total,
                }
            })
            .collect();

        Progress {
            session_id: state.session_id,
            status: self.status(state),
            answered: phases.iter().map(|p| p.answered).sum(),
            total: phases.iter().map(|p| p.total).sum(),
            phases,
        }
    }

    /// Record an answer and advance one phase if the answered question's phase
    /// is now complete.
    ///
    /// Checks run in order: unknown question, phase ordering (strict mode),
    /// question budget. The first failing check rejects the call.
    pub fn apply_answer(
        &self,
        state: &SessionState,
        question_id: &str,
        answer: AnswerValue,
    ) -> Result<SessionState, EngineError> {
        let question = self.template.question(question_id).ok_or_else(|| {
            tracing::debug!(session_id = %state.session_id, question_id, "Answer for undeclared question");
            EngineError::InvalidQuestion(question_id.to_string())
        })?;

        if self.protocol.strict_phases && !self.phase_permitted(state, &question.phase) {
            tracing::debug!(
                session_id = %state.session_id,
                question_id,
                phase = %question.phase,
                current = ?state.current_phase,
                "Answer outside permitted phase"
            );
            return Err(EngineError::PhaseViolation {
                question_id: question_id.to_string(),
                phase: question.phase.clone(),
                current: state.current_phase.clone(),
            });
        }

        if state.questions_asked_total >= self.protocol.max_questions {
            tracing::info!(
                session_id = %state.session_id,
                max_questions = self.protocol.max_questions,
                "Question budget exhausted"
            );
            return Err(EngineError::LimitExceeded(LimitKind::MaxQuestions));
        }

        let mut next = state.clone();
        next.answers.insert(question.id.clone(), answer);
        next.total_questions_asked = next.total_questions_asked.saturating_add(1);
        next.questions_asked_total = next.questions_asked_total.saturating_add(1);
        next.current_question_id = Some(question.id.clone());
        if next.current_phase.is_none() {
            next.current_phase = Some(question.phase.clone());
        }

        if self.phase_complete(&next, &question.phase) {
            self.advance(&mut next);
        }

        tracing::debug!(
            session_id = %next.session_id,
            question_id,
            phase = ?next.current_phase,
            asked_in_phase = next.total_questions_asked,
            asked_total = next.questions_asked_total,
            "Answer recorded"
        );
        Ok(next)
    }

    /// Record a deliberate skip as a `null` answer. Requires the protocol to
    /// allow skipping; otherwise the same checks as `apply_answer` apply.
    pub fn skip_question(
        &self,
        state: &SessionState,
        question_id: &str,
    ) -> Result<SessionState, EngineError> {
        if !self.protocol.allow_question_skipping {
            return Err(EngineError::SkippingDisabled);
        }
        self.apply_answer(state, question_id, AnswerValue::Null)
    }

    pub fn record_followup(&self, state: &SessionState) -> Result<SessionState, EngineError> {
        if state.followup_count >= self.protocol.max_followups {
            tracing::info!(
                session_id = %state.session_id,
                max_followups = self.protocol.max_followups,
                "Follow-up budget exhausted"
            );
            return Err(EngineError::LimitExceeded(LimitKind::MaxFollowups));
        }
        let mut next = state.clone();
        next.followup_count += 1;
        Ok(next)
    }

    pub fn record_drift(&self, state: &SessionState) -> Result<DriftOutcome, EngineError> {
        if state.drift_count >= self.protocol.drift_hard_limit {
            tracing::info!(
                session_id = %state.session_id,
                drift_hard_limit = self.protocol.drift_hard_limit,
                "Drift hard limit reached"
            );
            return Err(EngineError::LimitExceeded(LimitKind::DriftHardLimit));
        }
        let mut next = state.clone();
        next.drift_count += 1;
        let soft_limit_reached = next.drift_count > self.protocol.drift_soft_limit;
        if soft_limit_reached {
            tracing::debug!(
                session_id = %next.session_id,
                drift_count = next.drift_count,
                "Drift soft limit exceeded"
            );
        }
        Ok(DriftOutcome {
            state: next,
            soft_limit_reached,
        })
    }

    /// In strict mode an answer may target the current phase or the phase
    /// that follows it in protocol order. Before the first answer every phase
    /// is open, since the answered question's phase becomes current.
    fn phase_permitted(&self, state: &SessionState, phase: &str) -> bool {
        match state.current_phase.as_deref() {
            Some(current) => {
                phase == current || self.protocol.next_phase(current) == Some(phase)
            }
            None => true,
        }
    }

    /// Step the current phase once along the protocol order. The final phase
    /// is never left.
    fn advance(&self, state: &mut SessionState) {
        let Some(current) = state.current_phase.clone() else {
            return;
        };
        let Some(next_phase) = self.protocol.next_phase(&current) else {
            return;
        };
        tracing::info!(
            session_id = %state.session_id,
            from = %current,
            to = %next_phase,
            "Phase advanced"
        );
        state.current_phase = Some(next_phase.to_string());
        state.total_questions_asked = 0;
    }
}

use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::flows::states::{
    FailureKind, FlowAction, FlowEvent, FlowState, FlowType, TransitionOutcome,
};

pub trait FlowDefinition {
    fn flow_type(&self) -> FlowType;
    fn initial_state(&self) -> FlowState;
    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Single-round-trip model flow: validate, invoke once, validate, return.
#[derive(Clone, Debug)]
pub struct ModelFlow {
    flow_type: FlowType,
}

impl ModelFlow {
    pub fn video_analysis() -> Self {
        Self { flow_type: FlowType::VideoAnalysis }
    }

    pub fn coach_feedback() -> Self {
        Self { flow_type: FlowType::CoachFeedback }
    }
}

impl Default for ModelFlow {
    fn default() -> Self {
        Self::video_analysis()
    }
}

impl FlowDefinition for ModelFlow {
    fn flow_type(&self) -> FlowType {
        self.flow_type
    }

    fn initial_state(&self) -> FlowState {
        FlowState::Idle
    }

    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_model_flow(current, event)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow.flow_type()
    }

    pub fn initial_state(&self) -> FlowState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &FlowState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event);
        match &result {
            Ok(outcome) => {
                let outcome_kind = match outcome.to {
                    FlowState::Failed(_) => AuditOutcome::Failed,
                    _ => AuditOutcome::Success,
                };
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "flow.transition_applied",
                        AuditCategory::Flow,
                        outcome_kind,
                    )
                    .with_metadata("flow", format!("{:?}", self.flow_type()))
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "flow.transition_rejected",
                        AuditCategory::Flow,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<ModelFlow> {
    fn default() -> Self {
        Self::new(ModelFlow::default())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: FlowState, event: FlowEvent },
    #[error("flow already finished in {state:?}")]
    AlreadyTerminal { state: FlowState },
}

fn transition_model_flow(
    current: &FlowState,
    event: &FlowEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{
        InvokeModel, RenderPrompt, ReturnError, ReturnResult, ValidateInput, ValidateOutput,
    };
    use FlowEvent::{
        CallReceived, InputAccepted, InputRejected, ModelResponded, ModelUnreachable,
        OutputAccepted, OutputRejected,
    };
    use FlowState::{Failed, Finalizing, Idle, Invoking, Succeeded, Validating};

    if current.is_terminal() {
        return Err(FlowTransitionError::AlreadyTerminal { state: *current });
    }

    let (to, actions) = match (current, event) {
        (Idle, CallReceived) => (Validating, vec![ValidateInput]),
        (Validating, InputAccepted) => (Invoking, vec![RenderPrompt, InvokeModel]),
        (Validating, InputRejected) => (Failed(FailureKind::InvalidInput), vec![ReturnError]),
        (Invoking, ModelResponded) => (Finalizing, vec![ValidateOutput]),
        (Invoking, ModelUnreachable) => {
            (Failed(FailureKind::ModelUnavailable), vec![ReturnError])
        }
        (Finalizing, OutputAccepted) => (Succeeded, vec![ReturnResult]),
        (Finalizing, OutputRejected) => {
            (Failed(FailureKind::ModelOutputInvalid), vec![ReturnError])
        }
        _ => {
            return Err(FlowTransitionError::InvalidTransition { state: *current, event: *event });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: *event, actions })
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::flows::engine::{FlowDefinition, FlowEngine, FlowTransitionError, ModelFlow};
    use crate::flows::states::{FailureKind, FlowAction, FlowEvent, FlowState, FlowType};

    #[test]
    fn happy_path_reaches_succeeded() {
        let engine = FlowEngine::default();
        let mut state = engine.initial_state();

        for event in [
            FlowEvent::CallReceived,
            FlowEvent::InputAccepted,
            FlowEvent::ModelResponded,
        ] {
            state = engine.apply(&state, &event).expect("forward transition").to;
        }
        let done = engine.apply(&state, &FlowEvent::OutputAccepted).expect("finalizing -> done");

        assert_eq!(done.to, FlowState::Succeeded);
        assert_eq!(done.actions, vec![FlowAction::ReturnResult]);
    }

    #[test]
    fn rejected_input_fails_before_invocation() {
        let engine = FlowEngine::default();
        let validating =
            engine.apply(&FlowState::Idle, &FlowEvent::CallReceived).expect("idle -> validating");
        let failed =
            engine.apply(&validating.to, &FlowEvent::InputRejected).expect("validating -> failed");

        assert_eq!(failed.to, FlowState::Failed(FailureKind::InvalidInput));
        assert!(!failed.actions.contains(&FlowAction::InvokeModel));
    }

    #[test]
    fn invoking_failures_map_to_their_kinds() {
        let engine = FlowEngine::default();
        let unreachable = engine
            .apply(&FlowState::Invoking, &FlowEvent::ModelUnreachable)
            .expect("invoking -> failed");
        let rejected = engine
            .apply(&FlowState::Finalizing, &FlowEvent::OutputRejected)
            .expect("finalizing -> failed");

        assert_eq!(unreachable.to, FlowState::Failed(FailureKind::ModelUnavailable));
        assert_eq!(rejected.to, FlowState::Failed(FailureKind::ModelOutputInvalid));
    }

    #[test]
    fn skipping_validation_is_rejected() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(&FlowState::Idle, &FlowEvent::ModelResponded)
            .expect_err("idle cannot jump to finalizing");

        assert!(matches!(
            error,
            FlowTransitionError::InvalidTransition {
                state: FlowState::Idle,
                event: FlowEvent::ModelResponded
            }
        ));
    }

    #[test]
    fn terminal_states_accept_no_events() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(&FlowState::Succeeded, &FlowEvent::CallReceived)
            .expect_err("terminal state");
        assert_eq!(error, FlowTransitionError::AlreadyTerminal { state: FlowState::Succeeded });
    }

    #[test]
    fn flow_type_follows_definition() {
        let coach = FlowEngine::new(ModelFlow::coach_feedback());
        assert_eq!(coach.flow_type(), FlowType::CoachFeedback);
        assert_eq!(ModelFlow::default().flow_type(), FlowType::VideoAnalysis);
    }

    #[test]
    fn flow_transition_emits_audit_event() {
        let engine = FlowEngine::default();
        let sink = InMemoryAuditSink::default();

        let _ = engine
            .apply_with_audit(
                &FlowState::Idle,
                &FlowEvent::CallReceived,
                &sink,
                &AuditContext::new("analysis-1", "req-42", "orchestrator"),
            )
            .expect("transition should succeed");

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-42");
        assert_eq!(events[0].analysis_id, "analysis-1");
        assert_eq!(events[0].event_type, "flow.transition_applied");
        assert_eq!(events[0].metadata.get("to").map(String::as_str), Some("Validating"));
    }
}

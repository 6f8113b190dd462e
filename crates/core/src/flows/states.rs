use serde::{Deserialize, Serialize};

use crate::errors::ErrorKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowType {
    VideoAnalysis,
    CoachFeedback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    Idle,
    Validating,
    Invoking,
    Finalizing,
    Succeeded,
    Failed(FailureKind),
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    InvalidInput,
    ModelUnavailable,
    ModelOutputInvalid,
}

impl From<ErrorKind> for FailureKind {
    fn from(value: ErrorKind) -> Self {
        match value {
            ErrorKind::InvalidInput => Self::InvalidInput,
            ErrorKind::ModelUnavailable => Self::ModelUnavailable,
            ErrorKind::ModelOutputInvalid => Self::ModelOutputInvalid,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    CallReceived,
    InputAccepted,
    InputRejected,
    ModelResponded,
    ModelUnreachable,
    OutputAccepted,
    OutputRejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    ValidateInput,
    RenderPrompt,
    InvokeModel,
    ValidateOutput,
    ReturnResult,
    ReturnError,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowState,
    pub to: FlowState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}

pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, ModelFlow};
pub use states::{FailureKind, FlowAction, FlowEvent, FlowState, FlowType, TransitionOutcome};

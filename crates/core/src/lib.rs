//! Contracts, feedback policy and flow rules for basketball video analysis.
//!
//! Everything in this crate is synchronous and side-effect free apart from
//! config loading. Model access lives in `hoops-agent`.

pub mod audit;
pub mod config;
pub mod contracts;
pub mod domain;
pub mod errors;
pub mod feedback;
pub mod flows;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use contracts::{Contract, ContractIssue, ContractViolation};
pub use domain::{
    AnalysisRequest, AnalysisResult, AnalysisVariant, CoachFeedback, CoachRequest,
    CountCommentary, CountFeedback, GameplayAnalysis, MediaDataUri, MediaError,
};
pub use errors::{AnalysisError, ErrorKind, InputError, InterfaceError, OutputFailure};
pub use feedback::{feedback_for, FeedbackTier};
pub use flows::{FlowEngine, FlowEvent, FlowState, ModelFlow};

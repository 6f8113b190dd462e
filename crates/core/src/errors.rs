use serde::Serialize;
use thiserror::Error;

use crate::contracts::ContractViolation;
use crate::domain::MediaError;

/// Why a request never reached the model.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error(transparent)]
    Contract(#[from] ContractViolation),
    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Why a model response was not accepted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OutputFailure {
    #[error("model returned no output")]
    Empty,
    #[error(transparent)]
    Contract(#[from] ContractViolation),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("model output invalid: {0}")]
    ModelOutputInvalid(#[from] OutputFailure),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    ModelUnavailable,
    ModelOutputInvalid,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::ModelUnavailable => "model_unavailable",
            Self::ModelOutputInvalid => "model_output_invalid",
        }
    }
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            Self::ModelOutputInvalid(_) => ErrorKind::ModelOutputInvalid,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::BadGateway { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<MediaError> for AnalysisError {
    fn from(value: MediaError) -> Self {
        Self::InvalidInput(InputError::Media(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("bad gateway: {message}")]
    BadGateway { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The upload could not be processed. Check that it is a valid video and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The analysis service is temporarily unavailable. Please retry shortly."
            }
            Self::BadGateway { .. } => {
                "Something went wrong. Please try another video or a shorter one."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::BadGateway { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl From<AnalysisError> for InterfaceError {
    fn from(value: AnalysisError) -> Self {
        let message = value.to_string();
        let correlation_id = "unassigned".to_owned();
        match value {
            AnalysisError::InvalidInput(_) => Self::BadRequest { message, correlation_id },
            AnalysisError::ModelUnavailable(_) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            AnalysisError::ModelOutputInvalid(_) => Self::BadGateway { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::contracts::{ContractIssue, ContractViolation};
    use crate::domain::MediaError;
    use crate::errors::{AnalysisError, ErrorKind, InterfaceError, OutputFailure};

    #[test]
    fn media_error_maps_to_bad_request_interface_error() {
        let interface = AnalysisError::from(MediaError::EmptyPayload).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The upload could not be processed. Check that it is a valid video and try again."
        );
    }

    #[test]
    fn empty_output_is_distinct_from_contract_violation() {
        let empty = AnalysisError::from(OutputFailure::Empty);
        let violated = AnalysisError::from(OutputFailure::Contract(ContractViolation::single(
            "count_with_feedback",
            ContractIssue::MissingField { path: "feedback".to_string() },
        )));

        assert_eq!(empty.kind(), ErrorKind::ModelOutputInvalid);
        assert_eq!(violated.kind(), ErrorKind::ModelOutputInvalid);
        assert_ne!(empty, violated);
        assert!(violated.to_string().contains("`feedback` is required"));
    }

    #[test]
    fn transport_failure_maps_to_service_unavailable() {
        let interface =
            AnalysisError::ModelUnavailable("connection reset".to_owned()).into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-3");
        assert_eq!(ErrorKind::ModelUnavailable.code(), "model_unavailable");
    }

    #[test]
    fn invalid_output_maps_to_bad_gateway() {
        let interface = AnalysisError::from(OutputFailure::Empty).into_interface("req-4");
        assert!(matches!(interface, InterfaceError::BadGateway { .. }));
    }
}

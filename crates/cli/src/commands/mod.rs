pub mod analyze;
pub mod coach;
pub mod config;
pub mod doctor;
pub mod feedback;

use std::future::Future;
use std::sync::Arc;

use hoops_agent::{build_model_client, AnalysisRuntime};
use hoops_core::config::{AppConfig, LoadOptions};
use hoops_core::errors::{AnalysisError, ErrorKind};
use hoops_core::TracingAuditSink;
use serde::Serialize;
use serde_json::Value;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_PRECHECK: u8 = 3;
pub const EXIT_INVALID_INPUT: u8 = 4;
pub const EXIT_MODEL_UNAVAILABLE: u8 = 5;
pub const EXIT_MODEL_OUTPUT_INVALID: u8 = 6;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with(command, message, None)
    }

    pub fn success_with(command: &str, message: impl Into<String>, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn analysis_failure(command: &str, error: &AnalysisError) -> Self {
        let exit_code = match error.kind() {
            ErrorKind::InvalidInput => EXIT_INVALID_INPUT,
            ErrorKind::ModelUnavailable => EXIT_MODEL_UNAVAILABLE,
            ErrorKind::ModelOutputInvalid => EXIT_MODEL_OUTPUT_INVALID,
        };
        Self::failure(command, error.kind().code(), error.to_string(), exit_code)
    }
}

/// Loads config, starts logging and wires the orchestrator for one command.
pub(crate) fn prepare_runtime(command: &str) -> Result<(AppConfig, AnalysisRuntime), CommandResult> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    })?;
    crate::logging::init(&config.logging);

    let runtime = build_runtime(&config)
        .map_err(|message| CommandResult::failure(command, "model_setup", message, EXIT_CONFIG))?;
    Ok((config, runtime))
}

pub(crate) fn build_runtime(config: &AppConfig) -> Result<AnalysisRuntime, String> {
    let model = build_model_client(&config.llm).map_err(|error| error.to_string())?;
    let runtime = AnalysisRuntime::new(model).map_err(|error| error.to_string())?;
    Ok(runtime
        .with_audit_sink(Arc::new(TracingAuditSink))
        .with_default_variant(config.analysis.variant))
}

pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output, std::io::Error> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}

pub(crate) fn correlation_id(command: &str) -> String {
    format!("cli-{command}-{}", std::process::id())
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

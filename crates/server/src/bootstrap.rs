use std::sync::Arc;

use hoops_agent::prompt::PromptError;
use hoops_agent::{build_model_client, AnalysisRuntime, ModelError};
use hoops_core::config::{AppConfig, ConfigError};
use hoops_core::TracingAuditSink;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<AnalysisRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("model client setup failed: {0}")]
    Model(#[from] ModelError),
    #[error("prompt templates failed to load: {0}")]
    Prompt(#[from] PromptError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        "starting application bootstrap"
    );

    let model = build_model_client(&config.llm)?;
    let runtime = AnalysisRuntime::new(model)?
        .with_audit_sink(Arc::new(TracingAuditSink))
        .with_default_variant(config.analysis.variant);
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        model = runtime.model_name(),
        variant = %runtime.default_variant(),
        "analysis runtime ready"
    );

    Ok(Application { config, runtime: Arc::new(runtime) })
}

use std::sync::Arc;

use async_trait::async_trait;
use hoops_core::config::{LlmConfig, LlmProvider};
use hoops_core::contracts::Contract;
use serde_json::Value;
use thiserror::Error;

use crate::fixture::FixtureModelClient;
use crate::gemini::GeminiClient;
use crate::prompt::RenderedPrompt;
use crate::tools::ToolRegistry;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model transport failed: {0}")]
    Transport(String),
    #[error("model endpoint returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("model protocol error: {0}")]
    Protocol(String),
    #[error("model fixture unreadable: {0}")]
    Io(String),
}

/// Everything a model adapter needs for one round trip.
#[derive(Clone, Debug)]
pub struct ModelRequest {
    pub prompt: RenderedPrompt,
    pub output_contract: Contract,
    pub tools: ToolRegistry,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    fn name(&self) -> &str;

    /// One logical round trip. `Ok(None)` means the model produced nothing.
    async fn generate(&self, request: &ModelRequest) -> Result<Option<Value>, ModelError>;
}

pub fn build_model_client(config: &LlmConfig) -> Result<Arc<dyn ModelClient>, ModelError> {
    match config.provider {
        LlmProvider::Gemini => Ok(Arc::new(GeminiClient::new(config)?)),
        LlmProvider::Fixture => {
            let path = config.fixture_path.clone().ok_or_else(|| {
                ModelError::Io("llm.fixture_path is required for the fixture provider".to_string())
            })?;
            Ok(Arc::new(FixtureModelClient::new(path)))
        }
    }
}

/// Best-effort extraction of a JSON value from model text.
///
/// Blank text is no output. Text that holds no JSON comes back as a JSON
/// string so the output contract rejects it.
pub fn parse_model_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let unfenced = strip_code_fence(trimmed);
    if let Ok(value) = serde_json::from_str(unfenced) {
        return Some(value);
    }

    if let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&unfenced[start..=end]) {
                return Some(value);
            }
        }
    }

    Some(Value::String(trimmed.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(body) = text.strip_prefix("```") else {
        return text;
    };
    let body = body.split_once('\n').map_or(body, |(_, rest)| rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

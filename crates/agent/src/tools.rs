use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use hoops_core::contracts::{catalog, Contract, ContractViolation};
use hoops_core::feedback_for;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("tool `{tool}` rejected its input: {violation}")]
    InvalidInput { tool: String, violation: ContractViolation },
    #[error("tool `{tool}` failed: {message}")]
    Failed { tool: String, message: String },
}

/// A capability the model may call while producing its answer.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_contract(&self) -> Contract;
    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}

/// What a model adapter advertises for each registered tool.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name(), Arc::new(tool));
    }

    pub fn with<T>(mut self, tool: T) -> Self
    where
        T: Tool + 'static,
    {
        self.register(tool);
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools
            .values()
            .map(|tool| ToolDeclaration {
                name: tool.name(),
                description: tool.description(),
                parameters: tool.input_contract().to_json_schema(),
            })
            .collect()
    }

    /// Validates `input` against the tool's contract, then runs it.
    pub async fn invoke(&self, name: &str, input: Value) -> Result<Value, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        if let Err(violation) = tool.input_contract().validate(&input) {
            tracing::warn!(
                event_name = "analysis.tool_rejected",
                tool = name,
                error = %violation,
                "tool input failed its contract"
            );
            return Err(ToolError::InvalidInput { tool: name.to_string(), violation });
        }

        let output = tool.execute(input).await?;
        tracing::debug!(event_name = "analysis.tool_invoked", tool = name, "tool invoked");
        Ok(output)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.tools.keys().collect::<Vec<_>>()).finish()
    }
}

/// Maps a basket count to its fixed feedback tier.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProvideFeedbackTool;

impl ProvideFeedbackTool {
    pub const NAME: &'static str = "provideFeedback";
}

#[async_trait]
impl Tool for ProvideFeedbackTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Provides feedback based on the number of baskets scored."
    }

    fn input_contract(&self) -> Contract {
        catalog::feedback_tool_input()
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let count = input.get(catalog::NUMBER_OF_BASKETS).and_then(Value::as_u64).ok_or_else(|| {
            ToolError::Failed {
                tool: Self::NAME.to_string(),
                message: "numberOfBaskets must be a non-negative integer".to_string(),
            }
        })?;
        Ok(Value::String(feedback_for(count).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ProvideFeedbackTool, ToolError, ToolRegistry};

    fn registry() -> ToolRegistry {
        ToolRegistry::default().with(ProvideFeedbackTool)
    }

    #[tokio::test]
    async fn feedback_tool_follows_the_tiers() {
        let registry = registry();
        for (count, expected) in [(0, "needs improvement"), (5, "good effort"), (12, "excellent")] {
            let output = registry
                .invoke("provideFeedback", json!({ "numberOfBaskets": count }))
                .await
                .expect("tool runs");
            assert_eq!(output, json!(expected));
        }
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_execution() {
        let error = registry()
            .invoke("provideFeedback", json!({ "numberOfBaskets": -2 }))
            .await
            .expect_err("negative counts are rejected");
        assert!(matches!(error, ToolError::InvalidInput { ref tool, .. } if tool == "provideFeedback"));
    }

    #[tokio::test]
    async fn unknown_tools_are_reported() {
        let error = registry().invoke("scoreGame", json!({})).await.expect_err("not registered");
        assert!(matches!(error, ToolError::UnknownTool(name) if name == "scoreGame"));
    }

    #[test]
    fn declarations_carry_the_input_schema() {
        let registry = registry();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("provideFeedback"));

        let declarations = registry.declarations();
        assert_eq!(declarations[0].name, "provideFeedback");
        assert_eq!(declarations[0].parameters["required"], json!(["numberOfBaskets"]));
        assert_eq!(declarations[0].parameters["properties"]["numberOfBaskets"]["minimum"], json!(0));
        assert!(ToolRegistry::default().is_empty());
    }
}

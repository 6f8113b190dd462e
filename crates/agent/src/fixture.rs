use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{parse_model_json, ModelClient, ModelError, ModelRequest};

/// Replays a recorded model answer from disk. Offline runs and demos.
#[derive(Clone, Debug)]
pub struct FixtureModelClient {
    path: PathBuf,
}

impl FixtureModelClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ModelClient for FixtureModelClient {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn generate(&self, _request: &ModelRequest) -> Result<Option<Value>, ModelError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|error| ModelError::Io(format!("{}: {error}", self.path.display())))?;
        Ok(parse_model_json(&text))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use hoops_core::contracts::catalog;
    use serde_json::json;

    use super::FixtureModelClient;
    use crate::llm::{ModelClient, ModelError, ModelRequest};
    use crate::prompt::RenderedPrompt;
    use crate::tools::ToolRegistry;

    fn request() -> ModelRequest {
        ModelRequest {
            prompt: RenderedPrompt::text("count"),
            output_contract: catalog::count_with_feedback(),
            tools: ToolRegistry::default(),
        }
    }

    #[tokio::test]
    async fn replays_recorded_json() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{\"numberOfBaskets\": 6, \"feedback\": \"good effort\"}}").expect("write");

        let client = FixtureModelClient::new(file.path());
        let output = client.generate(&request()).await.expect("fixture read");
        assert_eq!(output, Some(json!({ "numberOfBaskets": 6, "feedback": "good effort" })));
    }

    #[tokio::test]
    async fn empty_fixture_is_no_output() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let client = FixtureModelClient::new(file.path());
        assert_eq!(client.generate(&request()).await.expect("fixture read"), None);
    }

    #[tokio::test]
    async fn missing_fixture_is_an_io_error() {
        let client = FixtureModelClient::new("/definitely/not/here.json");
        let error = client.generate(&request()).await.expect_err("missing file");
        assert!(matches!(error, ModelError::Io(_)));
    }
}

//! Google Generative Language (`generateContent`) adapter built on reqwest.

use std::time::Duration;

use async_trait::async_trait;
use hoops_core::config::LlmConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::llm::{parse_model_json, ModelClient, ModelError, ModelRequest};
use crate::prompt::{PromptPart, RenderedPrompt};
use crate::tools::ToolRegistry;

const X_GOOG_API_KEY: &str = "x-goog-api-key";
const MAX_ERROR_BODY: usize = 512;

pub struct GeminiClient {
    api_key: SecretString,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
    max_tool_turns: u32,
    client: Client,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("max_tool_turns", &self.max_tool_turns)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, ModelError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ModelError::Protocol("llm.api_key is required for the gemini provider".to_string())
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ModelError::Transport(format!("failed to build http client: {error}")))?;

        Ok(Self {
            api_key,
            endpoint: generate_endpoint(&config.base_url, &config.model),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tool_turns: config.max_tool_turns.max(1),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, body: &GenerateRequest<'_>) -> Result<GenerateResponse, ModelError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(X_GOOG_API_KEY, self.api_key.expose_secret())
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|error| ModelError::Transport(error.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut message =
                response.text().await.unwrap_or_else(|_| "unreadable error body".to_string());
            message.truncate(floor_char_boundary(&message, MAX_ERROR_BODY));
            return Err(ModelError::Status { status: status.as_u16(), message });
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|error| ModelError::Protocol(format!("unexpected response body: {error}")))
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &ModelRequest) -> Result<Option<Value>, ModelError> {
        let mut contents = vec![Content::user(prompt_parts(&request.prompt))];
        let tools = tool_declarations(&request.tools);
        let generation_config = generation_config(request, self.temperature);

        for turn in 1..=self.max_tool_turns {
            let body = GenerateRequest {
                contents: &contents,
                tools: tools.as_deref(),
                generation_config: &generation_config,
            };
            let response = self.send(&body).await?;

            let Some(content) = response.first_content() else {
                return Ok(None);
            };
            let calls: Vec<FunctionCall> =
                content.parts.iter().filter_map(|part| part.function_call.clone()).collect();
            if calls.is_empty() {
                return Ok(parse_model_json(&content.text()));
            }

            tracing::debug!(
                event_name = "analysis.tool_turn",
                turn,
                calls = calls.len(),
                "model requested tool calls"
            );
            contents.push(content);
            let mut replies = Vec::with_capacity(calls.len());
            for call in calls {
                let reply = match request.tools.invoke(&call.name, call.args).await {
                    Ok(result) => json!({ "result": result }),
                    Err(error) => json!({ "error": error.to_string() }),
                };
                replies.push(Part::function_response(call.name, reply));
            }
            contents.push(Content { role: "user".to_string(), parts: replies });
        }

        tracing::warn!(
            event_name = "analysis.tool_turns_exhausted",
            max_tool_turns = self.max_tool_turns,
            "model kept calling tools without answering"
        );
        Ok(None)
    }
}

fn generate_endpoint(base_url: &str, model: &str) -> String {
    let model = model.trim().trim_start_matches("models/");
    format!("{}/v1beta/models/{model}:generateContent", base_url.trim_end_matches('/'))
}

fn floor_char_boundary(text: &str, max: usize) -> usize {
    if text.len() <= max {
        return text.len();
    }
    (0..=max).rev().find(|index| text.is_char_boundary(*index)).unwrap_or(0)
}

fn prompt_parts(prompt: &RenderedPrompt) -> Vec<Part> {
    prompt
        .parts
        .iter()
        .map(|part| match part {
            PromptPart::Text(text) => Part::text(text.clone()),
            PromptPart::Media(media) => Part {
                inline_data: Some(InlineData {
                    mime_type: media.mime_type().to_string(),
                    data: media.payload().to_string(),
                }),
                ..Part::default()
            },
        })
        .collect()
}

fn tool_declarations(tools: &ToolRegistry) -> Option<Vec<Value>> {
    if tools.is_empty() {
        return None;
    }
    let declarations: Vec<Value> = tools
        .declarations()
        .into_iter()
        .map(|declaration| {
            json!({
                "name": declaration.name,
                "description": declaration.description,
                "parameters": provider_schema(declaration.parameters),
            })
        })
        .collect();
    Some(vec![json!({ "functionDeclarations": declarations })])
}

/// Structured output is only requested when no tools are offered; the API
/// rejects `responseSchema` alongside function calling.
fn generation_config(request: &ModelRequest, temperature: Option<f32>) -> Value {
    let mut config = json!({});
    if request.tools.is_empty() {
        config["responseMimeType"] = json!("application/json");
        config["responseSchema"] = provider_schema(request.output_contract.to_json_schema());
    }
    if let Some(temperature) = temperature {
        config["temperature"] = json!(temperature);
    }
    config
}

/// The API's schema dialect uses upper-case type names.
fn provider_schema(mut schema: Value) -> Value {
    uppercase_types(&mut schema);
    schema
}

fn uppercase_types(value: &mut Value) {
    if let Value::Object(object) = value {
        for (key, child) in object.iter_mut() {
            match (key.as_str(), child) {
                ("type", Value::String(kind)) => *kind = kind.to_ascii_uppercase(),
                ("properties", Value::Object(properties)) => {
                    properties.values_mut().for_each(uppercase_types);
                }
                (_, child) => uppercase_types(child),
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
    generation_config: &'a Value,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user(parts: Vec<Part>) -> Self {
        Self { role: "user".to_string(), parts }
    }

    fn text(&self) -> String {
        self.parts.iter().filter_map(|part| part.text.as_deref()).collect()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: String) -> Self {
        Self { text: Some(text), ..Self::default() }
    }

    fn function_response(name: String, response: Value) -> Self {
        Self { function_response: Some(FunctionResponse { name, response }), ..Self::default() }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    fn first_content(self) -> Option<Content> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .filter(|content| !content.parts.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

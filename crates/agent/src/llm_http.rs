//! HTTP implementation of the model boundary against an OpenAI-compatible
//! chat-completions endpoint (works for OpenAI itself and for Ollama's
//! compatibility layer). Transport failures are retried with a short
//! backoff; malformed payloads are not retried.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::llm::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, LlmClient, LlmError, TokenUsage,
    ToolCall,
};

pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
}

impl HttpLlmClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        model: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            max_retries,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    async fn post_once(&self, body: &WireRequest) -> Result<WireResponse, LlmError> {
        let mut request = self.http.post(self.endpoint()).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Transport(format!("model endpoint returned {status}")));
        }

        response.json::<WireResponse>().await.map_err(|error| LlmError::Malformed(error.to_string()))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = WireRequest::from_request(&self.model, &request);

        let mut attempt = 0u32;
        let wire = loop {
            match self.post_once(&body).await {
                Ok(wire) => break wire,
                Err(LlmError::Transport(detail)) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "llm.retry",
                        attempt,
                        error = %detail,
                        "model call failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
                }
                Err(error) => return Err(error),
            }
        };

        wire.into_response()
    }
}

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

impl WireRequest {
    fn from_request(model: &str, request: &CompletionRequest) -> Self {
        Self {
            model: model.to_string(),
            messages: request.messages.iter().map(WireMessage::from_message).collect(),
            max_tokens: request.max_tokens,
            tools: request
                .tools
                .iter()
                .map(|tool| WireTool {
                    kind: "function".to_string(),
                    function: WireFunction {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn from_message(message: &ChatMessage) -> Self {
        let role = match message.role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        };
        Self { role, content: message.content.clone(), tool_call_id: message.tool_call_id.clone() }
    }
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireCalledFunction,
}

#[derive(Deserialize)]
struct WireCalledFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl WireResponse {
    fn into_response(self) -> Result<CompletionResponse, LlmError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Malformed("response carried no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| {
                let arguments = serde_json::from_str(&call.function.arguments).map_err(|error| {
                    LlmError::Malformed(format!("tool arguments are not valid JSON: {error}"))
                })?;
                Ok(ToolCall { id: call.id, name: call.function.name, arguments })
            })
            .collect::<Result<Vec<_>, LlmError>>()?;

        let usage = self
            .usage
            .map(|usage| TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse { content: choice.message.content, tool_calls, usage })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::llm::{ChatMessage, CompletionRequest, ToolSpec};

    use super::{WireRequest, WireResponse};

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![
                ChatMessage::system("You are a shop assistant."),
                ChatMessage::user("do you have shirts?"),
            ],
            tools: vec![ToolSpec {
                name: "stock_lookup".to_string(),
                description: "Check stock".to_string(),
                parameters: json!({ "type": "object", "properties": {} }),
            }],
            max_tokens: 256,
        }
    }

    #[test]
    fn wire_request_uses_function_calling_shape() {
        let wire = WireRequest::from_request("llama3.1", &request());
        let value = serde_json::to_value(&wire).expect("serialize");

        assert_eq!(value["model"], "llama3.1");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["tools"][0]["function"]["name"], "stock_lookup");
    }

    #[test]
    fn wire_response_parses_content_and_usage() {
        let raw = json!({
            "choices": [{ "message": { "content": "{\"action\":\"reply\"}" } }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 24 }
        });

        let response: WireResponse = serde_json::from_value(raw).expect("deserialize");
        let completion = response.into_response().expect("convert");

        assert_eq!(completion.content.as_deref(), Some("{\"action\":\"reply\"}"));
        assert_eq!(completion.usage.input_tokens, 120);
        assert_eq!(completion.usage.output_tokens, 24);
        assert!(completion.tool_calls.is_empty());
    }

    #[test]
    fn wire_response_parses_tool_calls_with_json_arguments() {
        let raw = json!({
            "choices": [{ "message": {
                "content": null,
                "tool_calls": [{
                    "id": "call-1",
                    "function": { "name": "stock_lookup", "arguments": "{\"product_id\":\"shirt-classic\"}" }
                }]
            }}]
        });

        let response: WireResponse = serde_json::from_value(raw).expect("deserialize");
        let completion = response.into_response().expect("convert");

        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].name, "stock_lookup");
        assert_eq!(completion.tool_calls[0].arguments["product_id"], "shirt-classic");
    }

    #[test]
    fn empty_choices_is_malformed() {
        let raw = json!({ "choices": [] });
        let response: WireResponse = serde_json::from_value(raw).expect("deserialize");
        assert!(response.into_response().is_err());
    }
}

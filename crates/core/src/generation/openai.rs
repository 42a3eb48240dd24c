//! OpenAI-compatible provider with a single protocol fallback.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    ChatMessage, Completion, CompletionRequest, GenerationConfig, GenerationProvider, Protocol,
    ProviderError,
};
use crate::metrics;

/// Client for OpenAI-compatible text generation APIs.
///
/// Tries `chat/completions` first. Any failure other than the deadline
/// triggers exactly one `responses` call. The configured timeout bounds both
/// calls together.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model.clone(),
            timeout: config.timeout(),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .header("content-type", "application/json");
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn chat(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .post("/v1/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let parsed: ChatResponse = read_json(response).await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        non_empty(text)
    }

    async fn responses(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = ResponsesRequest {
            model: &self.model,
            input: &request.messages,
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        };

        let response = self
            .post("/v1/responses")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let parsed: ResponsesResponse = read_json(response).await?;
        let text = parsed.output_text.map(OutputText::join).unwrap_or_default();

        non_empty(text)
    }

    async fn complete_with_fallback(
        &self,
        request: &CompletionRequest,
    ) -> Result<Completion, ProviderError> {
        let primary = self.chat(request).await;
        record_call(Protocol::Chat, &primary);

        let primary_err = match primary {
            Ok(text) => {
                return Ok(Completion {
                    text,
                    protocol: Protocol::Chat,
                })
            }
            Err(e) => e,
        };

        warn!(
            model = %self.model,
            error = %primary_err,
            "Chat completion failed, falling back to responses protocol"
        );

        let fallback = self.responses(request).await;
        record_call(Protocol::Responses, &fallback);

        match fallback {
            Ok(text) => Ok(Completion {
                text,
                protocol: Protocol::Responses,
            }),
            Err(e) => {
                warn!(model = %self.model, error = %e, "Fallback responses call failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl GenerationProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let timeout = request.timeout.unwrap_or(self.timeout);
        let start = Instant::now();

        match tokio::time::timeout(timeout, self.complete_with_fallback(&request)).await {
            Ok(result) => {
                if let Ok(completion) = &result {
                    debug!(
                        protocol = %completion.protocol,
                        duration_ms = start.elapsed().as_millis() as u64,
                        chars = completion.text.len(),
                        "Provider call succeeded"
                    );
                }
                result
            }
            Err(_) => {
                warn!(model = %self.model, ?timeout, "Provider call timed out");
                metrics::PROVIDER_TIMEOUTS_TOTAL.inc();
                Err(ProviderError::Timeout(timeout))
            }
        }
    }
}

fn record_call(protocol: Protocol, result: &Result<String, ProviderError>) {
    let outcome = if result.is_ok() { "success" } else { "failure" };
    metrics::PROVIDER_CALLS_TOTAL
        .with_label_values(&[protocol.as_str(), outcome])
        .inc();
}

fn non_empty(text: String) -> Result<String, ProviderError> {
    if text.trim().is_empty() {
        Err(ProviderError::EmptyResponse)
    } else {
        Ok(text)
    }
}

/// Turn a non-2xx status into [`ProviderError::Api`], otherwise decode the body.
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&error_text)
            .map(|e| e.error.message)
            .unwrap_or(error_text);
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::Json(e.to_string()))
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output_text: Option<OutputText>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OutputText {
    Single(String),
    Many(Vec<String>),
}

impl OutputText {
    fn join(self) -> String {
        match self {
            OutputText::Single(text) => text,
            OutputText::Many(parts) => parts.join("\n"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

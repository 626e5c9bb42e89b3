//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionError, TextCompletion};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiClient {
    /// `timeout` bounds the whole HTTP exchange; the relay applies its own
    /// timeout on top.
    pub fn new(
        api_key: String,
        model: String,
        base_url: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string();

        Ok(Self {
            client,
            base_url,
            api_key,
            model,
            timeout,
        })
    }

    fn generate_content_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl TextCompletion for GeminiClient {
    async fn complete(
        &self,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<String, CompletionError> {
        debug!(model = %self.model, "sending Gemini generateContent request");

        let request = GenerateContentRequest::new(prompt, system_instruction);
        let response = self
            .client
            .post(self.generate_content_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| transport_error(error, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(text) => text,
                Err(error) => format!("unable to read error body: {error}"),
            };
            return Err(status_error(status, &body));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|error| CompletionError::Unknown(format!("malformed response: {error}")))?;

        body.text().ok_or(CompletionError::EmptyResponse)
    }
}

fn transport_error(error: reqwest::Error, timeout: Duration) -> CompletionError {
    if error.is_timeout() {
        CompletionError::Timeout(timeout)
    } else {
        CompletionError::Unknown(error.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> CompletionError {
    let message = error_message(body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CompletionError::AuthFailed(message),
        StatusCode::BAD_REQUEST if message.to_lowercase().contains("api key") => {
            CompletionError::AuthFailed(message)
        }
        _ => CompletionError::Unknown(format!("HTTP {}: {message}", status.as_u16())),
    }
}

/// Pull `error.message` out of a Google error body, or fall back to the raw body.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.trim().chars().take(200).collect(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(prompt: &'a str, system_instruction: &'a str) -> Self {
        let system_instruction = (!system_instruction.trim().is_empty()).then(|| Content {
            role: None,
            parts: vec![Part {
                text: system_instruction,
            }],
        });

        Self {
            system_instruction,
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts joined. `None` when there is nothing to show.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

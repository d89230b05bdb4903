//! The scoring functions used by the command line: a client for an OpenAI-compatible
//! chat completion service, and a replay of recorded responses.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::scoring::*;

/// Sends each prompt as a single user message to `{base_url}/chat/completions`.
pub struct ChatCompletionClient {
    api_key: String,
    settings: ModelSettings,
    http_client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl ChatCompletionClient {
    /// Reads the API key from the environment and prepares the HTTP client.
    ///
    /// Fails before any request is sent if the key is missing.
    pub fn from_settings(settings: &ModelSettings) -> NsResult<ChatCompletionClient> {
        let api_key = match std::env::var(&settings.api_key_env) {
            Ok(k) if !k.trim().is_empty() => k.trim().to_string(),
            _ => {
                return MissingApiKeySnafu {
                    var: settings.api_key_env.clone(),
                }
                .fail()
            }
        };
        let http_client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context(HttpClientSnafu {})?;
        info!(
            "Using model {} at {}",
            settings.name, settings.base_url
        );
        Ok(ChatCompletionClient {
            api_key,
            settings: settings.clone(),
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn request(&self, attribute: &str, prompt: &str) -> NsResult<String> {
        let body = ChatRequest {
            model: self.settings.name.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };
        debug!("request: attribute {:?}: {} prompt bytes", attribute, prompt.len());

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .context(ModelRequestSnafu { attribute })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let message = match serde_json::from_str::<ApiError>(&text) {
                Ok(e) => e.error.message,
                Err(_) => text,
            };
            return ModelStatusSnafu {
                status: status.as_u16(),
                attribute,
                message,
            }
            .fail();
        }

        let parsed: ChatResponse = response.json().context(ModelRequestSnafu { attribute })?;
        parse_completion(parsed, attribute)
    }
}

fn parse_completion(response: ChatResponse, attribute: &str) -> NsResult<String> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .context(EmptyCompletionSnafu { attribute })?;
    Ok(content.trim().to_string())
}

impl Scorer for ChatCompletionClient {
    fn complete(&mut self, attribute: &str, prompt: &str) -> Result<String, ScoringErrors> {
        self.request(attribute, prompt).map_err(|e| {
            let message = error_chain(&e);
            warn!("The model call failed for attribute {:?}: {}", attribute, message);
            ScoringErrors::ScorerFailed {
                attribute: attribute.to_string(),
                message,
            }
        })
    }
}

/// Answers with responses recorded beforehand, keyed by attribute.
pub struct ReplayScorer {
    responses: HashMap<String, String>,
}

impl ReplayScorer {
    pub fn new(responses: HashMap<String, String>) -> ReplayScorer {
        ReplayScorer { responses }
    }

    pub fn from_file(path: &str) -> NsResult<ReplayScorer> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
        let responses: HashMap<String, String> =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        debug!("from_file: {} recorded responses in {}", responses.len(), path);
        Ok(ReplayScorer::new(responses))
    }
}

impl Scorer for ReplayScorer {
    fn complete(&mut self, attribute: &str, _prompt: &str) -> Result<String, ScoringErrors> {
        match self.responses.get(attribute) {
            Some(r) => Ok(r.clone()),
            None => Err(ScoringErrors::ScorerFailed {
                attribute: attribute.to_string(),
                message: "no recorded response".to_string(),
            }),
        }
    }
}

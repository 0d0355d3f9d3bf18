//! DeepSeek chat-completion backend.
//!
//! Speaks the OpenAI-compatible `/chat/completions` endpoint with
//! bearer auth. Only the first choice's message content is used.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use super::{CompletionBackend, CompletionError};
use crate::Config;

#[derive(Debug, Clone)]
pub struct DeepSeek {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

impl DeepSeek {
    pub fn new(config: &Config) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    async fn request(
        &self,
        system_prompt: &str,
        document_text: &str,
        client: &reqwest::Client,
        timeout: Duration,
    ) -> Result<String, CompletionError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": document_text },
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let response = client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(CompletionError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let mut message: String = body.chars().take(300).collect();
            if message.is_empty() {
                message = status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string();
            }
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(CompletionError::EmptyCompletion)?;

        Ok(content)
    }
}

impl CompletionBackend for DeepSeek {
    fn name(&self) -> &str {
        "DeepSeek"
    }

    fn complete<'a>(
        &'a self,
        system_prompt: &'a str,
        document_text: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>> {
        Box::pin(self.request(system_prompt, document_text, client, timeout))
    }
}

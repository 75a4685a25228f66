//! OpenAI 호환 API provider 어댑터.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::application::ports::{ModelError, ModelRunner};
use crate::infrastructure::config::{Config, resolve_provider_api_key};

use super::check_token_budget;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TEMPERATURE: f32 = 0.8;
const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct OpenAiApiRunner {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_prompt_tokens: usize,
}

impl OpenAiApiRunner {
    /// model과 api key가 모두 해석될 때만 러너를 활성화한다.
    pub fn from_config(config: &Config) -> Option<Self> {
        let provider = config.providers.openai.as_ref()?;
        if !provider.is_enabled() {
            return None;
        }

        let model = provider.model.clone()?;
        let api_key = resolve_provider_api_key(provider).credential?;
        let api_base = provider
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Some(Self {
            client,
            api_base,
            api_key,
            model,
            temperature: provider.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_prompt_tokens: config.max_prompt_tokens(),
        })
    }
}

#[async_trait]
impl ModelRunner for OpenAiApiRunner {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        _max_turns: u32,
    ) -> Result<String, ModelError> {
        check_token_budget(system_prompt, user_prompt, self.max_prompt_tokens)?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system_prompt },
                    { "role": "user", "content": user_prompt },
                ],
                "temperature": self.temperature,
                "stream": false,
            }))
            .send()
            .await
            .map_err(|err| {
                ModelError::Invocation(format!("openai: chat completion request failed: {err}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            ModelError::Invocation(format!("openai: failed to read chat completion body: {err}"))
        })?;

        if !status.is_success() {
            return Err(ModelError::Invocation(format!(
                "openai: chat completion failed ({status}): {body}"
            )));
        }

        let value: Value = serde_json::from_str(&body).map_err(|err| {
            ModelError::Invocation(format!("openai: invalid chat completion JSON: {err}"))
        })?;

        chat_content(&value).ok_or_else(|| {
            ModelError::Invocation("openai: chat completion returned no content".to_string())
        })
    }
}

/// chat completions 응답에서 본문 텍스트를 뽑는다.
/// `choices[].message.content`는 문자열 또는 `{"text": ...}` 블록 배열로 온다.
fn chat_content(response: &Value) -> Option<String> {
    let choices = response.get("choices")?.as_array()?;

    let mut out = String::new();
    for choice in choices {
        match choice.get("message").map(|message| &message["content"]) {
            Some(Value::String(text)) => out.push_str(text),
            Some(Value::Array(blocks)) => {
                for block in blocks {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        out.push_str(text);
                    }
                }
            }
            _ => {}
        }
    }

    let trimmed = out.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_content_reads_string_message() {
        let value = json!({
            "choices": [{ "message": { "role": "assistant", "content": "hello there" } }]
        });
        assert_eq!(chat_content(&value).as_deref(), Some("hello there"));
    }

    #[test]
    fn chat_content_joins_text_blocks() {
        let value = json!({
            "choices": [{
                "message": { "content": [{ "text": "part one, " }, { "text": "part two" }] }
            }]
        });
        assert_eq!(chat_content(&value).as_deref(), Some("part one, part two"));
    }

    #[test]
    fn chat_content_rejects_empty_or_malformed_responses() {
        assert!(chat_content(&json!({ "choices": [] })).is_none());
        assert!(chat_content(&json!({ "error": { "message": "quota" } })).is_none());
        assert!(
            chat_content(&json!({ "choices": [{ "message": { "content": "  " } }] })).is_none()
        );
    }
}

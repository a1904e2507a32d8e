//! Chat-completions [`Generator`].

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use hybrid_rag_core::answer::Generator;

use crate::config::{api_key_from_env, GenerationConfig};
use crate::http;

/// Sends the assembled prompt as a single user message to
/// `POST {url}/chat/completions` and returns the first choice.
pub struct ChatGenerator {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl ChatGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: format!("{}/chat/completions", config.url.trim_end_matches('/')),
            api_key: api_key_from_env(config.api_key_env.as_deref())?,
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
        });
        let json = http::post_json(
            &self.client,
            &self.url,
            self.api_key.as_deref(),
            &body,
            self.max_retries,
            "Chat completions",
        )
        .await?;
        parse_completion(&json)
    }
}

fn parse_completion(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid chat completions response: missing choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_completion() {
        let json = json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "I don't know"}}]
        });
        assert_eq!(parse_completion(&json).unwrap(), "I don't know");
        assert!(parse_completion(&json!({"choices": []})).is_err());
    }
}

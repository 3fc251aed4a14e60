use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BackendKind, Generator, GeneratorError, LlmConfig};

/// OpenAI-compatible chat completions backend
pub struct OpenAiGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn from_config(config: &LlmConfig) -> Result<Self, GeneratorError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            GeneratorError::ConfigError("LLM_API_KEY is not set for the OpenAI backend".into())
        })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: chat_endpoint(&config.base_url),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::OpenAi
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GeneratorError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system_prompt,
                },
                Message {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
        };

        debug!(
            model = %self.model,
            prompt_len = system_prompt.len() + user_prompt.len(),
            "Requesting chat completion"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                message: text.chars().take(300).collect(),
            });
        }

        parse_chat_response(&text)
    }
}

fn parse_chat_response(text: &str) -> Result<String, GeneratorError> {
    let parsed: ChatResponse = serde_json::from_str(text)
        .map_err(|e| GeneratorError::InvalidResponse(e.to_string()))?;

    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_endpoint_handles_trailing_slash() {
        assert_eq!(
            chat_endpoint("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint("http://localhost:8080/v1"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"[APPROVE]\nLooks good"}}]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "[APPROVE]\nLooks good");
    }

    #[test]
    fn test_parse_chat_response_null_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "");
        assert_eq!(parse_chat_response(r#"{"choices":[]}"#).unwrap(), "");
    }

    #[test]
    fn test_parse_chat_response_invalid_json() {
        assert!(matches!(
            parse_chat_response("<html>bad gateway</html>"),
            Err(GeneratorError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let result = OpenAiGenerator::from_config(&LlmConfig::default());
        assert!(matches!(result, Err(GeneratorError::ConfigError(_))));
    }
}

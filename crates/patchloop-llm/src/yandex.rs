use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BackendKind, Generator, GeneratorError, LlmConfig};

const COMPLETION_URL: &str = "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";

/// YandexGPT foundation models backend (synchronous completion API)
pub struct YandexGptGenerator {
    client: reqwest::Client,
    api_key: String,
    folder_id: String,
    model_uri: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest<'a> {
    model_uri: &'a str,
    completion_options: CompletionOptions,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    stream: bool,
    temperature: f32,
    // The API takes this as a string
    max_tokens: String,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Deserialize)]
struct CompletionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Deserialize)]
struct Alternative {
    message: AlternativeMessage,
}

#[derive(Deserialize)]
struct AlternativeMessage {
    #[serde(default)]
    text: String,
}

impl YandexGptGenerator {
    pub fn from_config(config: &LlmConfig) -> Result<Self, GeneratorError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            GeneratorError::ConfigError("LLM_API_KEY is not set for the YandexGPT backend".into())
        })?;
        let folder_id = config.folder_id.clone().ok_or_else(|| {
            GeneratorError::ConfigError("YC_FOLDER_ID is not set for the YandexGPT backend".into())
        })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            model_uri: model_uri(&folder_id, &config.model),
            api_key,
            folder_id,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

/// `gpt://<folder>/<model>`; non-Yandex model names map to `yandexgpt/latest`
fn model_uri(folder_id: &str, model: &str) -> String {
    if model.starts_with("gpt://") {
        model.to_string()
    } else if model.to_lowercase().starts_with("yandexgpt") {
        format!("gpt://{}/{}", folder_id, model)
    } else {
        format!("gpt://{}/yandexgpt/latest", folder_id)
    }
}

#[async_trait]
impl Generator for YandexGptGenerator {
    fn name(&self) -> &str {
        "YandexGPT"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::YandexGpt
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GeneratorError> {
        let request = CompletionRequest {
            model_uri: &self.model_uri,
            completion_options: CompletionOptions {
                stream: false,
                temperature: self.temperature,
                max_tokens: self.max_tokens.to_string(),
            },
            messages: vec![
                Message {
                    role: "system",
                    text: system_prompt,
                },
                Message {
                    role: "user",
                    text: user_prompt,
                },
            ],
        };

        debug!(model_uri = %self.model_uri, "Requesting YandexGPT completion");

        let response = self
            .client
            .post(COMPLETION_URL)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .header("x-folder-id", &self.folder_id)
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

        parse_completion(&text)
    }
}

fn parse_completion(text: &str) -> Result<String, GeneratorError> {
    let parsed: CompletionResponse = serde_json::from_str(text)
        .map_err(|e| GeneratorError::InvalidResponse(e.to_string()))?;
    Ok(parsed
        .result
        .alternatives
        .into_iter()
        .next()
        .map(|a| a.message.text)
        .unwrap_or_default())
}

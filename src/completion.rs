//! Chat-completion providers for answers and triage.
//!
//! - **[`OpenAICompatibleModel`]**: `POST {url}/chat/completions`. Works with
//!   OpenAI, Groq (`https://api.groq.com/openai/v1`), and other compatible
//!   gateways.
//! - **[`OllamaChatModel`]**: a local Ollama instance's `/api/chat`.
//! - **[`DisabledModel`]**: fails every call.
//!
//! One request per call; any failure is [`Error::Generation`].

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use tracing::debug;

use easyserve_core::completion::{CompletionModel, CompletionRequest};
use easyserve_core::{Error, Result};

use crate::config::CompletionConfig;
use crate::http::{self, api_key};

const OPENAI_URL: &str = "https://api.openai.com/v1";
const OLLAMA_URL: &str = "http://localhost:11434";

pub fn create_completion_model(
    config: &CompletionConfig,
) -> anyhow::Result<Arc<dyn CompletionModel>> {
    let model: Arc<dyn CompletionModel> = match config.provider.as_str() {
        "disabled" => Arc::new(DisabledModel),
        "openai" => Arc::new(OpenAICompatibleModel::new(config)?),
        "ollama" => Arc::new(OllamaChatModel::new(config)?),
        other => bail!("Unknown completion provider: {}", other),
    };
    Ok(model)
}

fn messages(request: &CompletionRequest) -> serde_json::Value {
    serde_json::json!([
        { "role": "system", "content": request.system },
        { "role": "user", "content": request.user },
    ])
}

pub struct DisabledModel;

#[async_trait]
impl CompletionModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        Err(Error::generation("Completion provider is disabled"))
    }
}

pub struct OpenAICompatibleModel {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAICompatibleModel {
    pub fn new(config: &CompletionConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for OpenAI provider"))?;
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config.url.clone().unwrap_or_else(|| OPENAI_URL.to_string()),
            api_key: api_key(config.api_key_env.as_deref(), "OPENAI_API_KEY")?,
            model,
        })
    }
}

#[async_trait]
impl CompletionModel for OpenAICompatibleModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!(model = %self.model, max_tokens = request.budget.max_tokens, "chat completion");
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages(request),
            "temperature": request.budget.temperature,
            "max_tokens": request.budget.max_tokens,
        });
        let call = self
            .client
            .post(format!("{}/chat/completions", self.url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body);
        let json = http::send_json("Chat", call, Error::generation).await?;
        parse_openai_chat(&json)
    }
}

fn parse_openai_chat(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::generation("Invalid chat response: missing choices[0].message.content"))
}

pub struct OllamaChatModel {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaChatModel {
    pub fn new(config: &CompletionConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for Ollama provider"))?;
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config.url.clone().unwrap_or_else(|| OLLAMA_URL.to_string()),
            model,
        })
    }
}

#[async_trait]
impl CompletionModel for OllamaChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!(model = %self.model, "ollama chat");
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages(request),
            "stream": false,
            "options": {
                "temperature": request.budget.temperature,
                "num_predict": request.budget.max_tokens,
            },
        });
        let call = self
            .client
            .post(format!("{}/api/chat", self.url.trim_end_matches('/')))
            .json(&body);
        let json = http::send_json("Ollama", call, Error::generation).await?;
        json.pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::generation("Invalid Ollama response: missing message.content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easyserve_core::completion::GenerationBudget;

    #[test]
    fn parses_first_choice() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"a\":1}" } }]
        });
        assert_eq!(parse_openai_chat(&json).unwrap(), "{\"a\":1}");
        assert!(parse_openai_chat(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[test]
    fn messages_carry_system_then_user() {
        let req = CompletionRequest::new("sys", "usr", GenerationBudget::default());
        let m = messages(&req);
        assert_eq!(m[0]["role"], "system");
        assert_eq!(m[1]["content"], "usr");
    }

    #[tokio::test]
    async fn disabled_model_fails() {
        let model = create_completion_model(&CompletionConfig::default()).unwrap();
        let req = CompletionRequest::new("s", "u", GenerationBudget::default());
        assert!(matches!(
            model.complete(&req).await,
            Err(Error::Generation(_))
        ));
    }
}

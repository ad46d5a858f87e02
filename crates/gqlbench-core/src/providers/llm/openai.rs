use super::{LlmClient, LlmProvider};
use crate::config::PredictionSettings;
use crate::model::{ChatMessage, LlmResponse};
use async_trait::async_trait;
use serde_json::json;

/// OpenAI-compatible `/chat/completions` backend.
pub struct OpenAiClient {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub extra_body: Option<serde_json::Value>,
    pub client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(model: String, base_url: String, api_key: Option<String>) -> Self {
        Self {
            model,
            base_url,
            api_key,
            temperature: None,
            extra_body: None,
            client: reqwest::Client::new(),
        }
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(serde_json::Value::Object(extra)) = &self.extra_body {
            for (k, v) in extra {
                body[k.as_str()] = v.clone();
            }
        }
        body
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&self.request_body(messages));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("chat API error ({}): {}", status, error_text);
        }

        let json: serde_json::Value = resp.json().await?;

        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("chat API response missing content"))?
            .to_string();

        Ok(LlmResponse {
            text,
            provider: "openai".to_string(),
            model: self.model.clone(),
            meta: json.get("usage").cloned().unwrap_or(serde_json::Value::Null),
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Hands each worker its own HTTP client.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    model: String,
    base_url: String,
    api_key: Option<String>,
    temperature: Option<f32>,
    extra_body: Option<serde_json::Value>,
}

impl OpenAiProvider {
    pub fn from_settings(settings: &PredictionSettings) -> Self {
        let api_key = settings.resolve_api_key();
        if api_key.is_none() {
            tracing::warn!(
                env = %settings.api_key_env,
                "no API key configured; sending unauthenticated requests"
            );
        }
        Self {
            model: settings.model.clone(),
            base_url: settings.base_url.clone(),
            api_key,
            temperature: settings.temperature,
            extra_body: settings.extra_body.clone(),
        }
    }
}

impl LlmProvider for OpenAiProvider {
    fn session(&self) -> anyhow::Result<Box<dyn LlmClient>> {
        let mut client = OpenAiClient::new(
            self.model.clone(),
            self.base_url.clone(),
            self.api_key.clone(),
        );
        client.temperature = self.temperature;
        client.extra_body = self.extra_body.clone();
        Ok(Box::new(client))
    }
}

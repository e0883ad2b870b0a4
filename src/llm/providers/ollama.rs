use crate::config::LlmConfig;
use crate::llm::{LlmError, QueryGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ollama backend via the non-streaming `/api/generate` endpoint.
pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
}

#[derive(Serialize, Debug)]
struct OllamaRequest {
    model: String,
    prompt: String,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
    #[serde(flatten)]
    _extra: std::collections::HashMap<String, serde_json::Value>,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434/api/generate".to_string());

        let client = reqwest::Client::new();

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl QueryGenerator for OllamaProvider {
    async fn complete(&self, system_prompt: &str, question: &str) -> Result<String, LlmError> {
        // No chat roles on /api/generate; fold the instruction and the
        // question into a single prompt.
        let prompt = format!("{}\n\n{}", system_prompt, question);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt,
            temperature: 0.0,
            stream: false,
        };

        debug!("Sending request to Ollama: {:?}", request);

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };
            return Err(LlmError::ResponseError(format!(
                "Ollama API responded with status code: {}{}",
                status, error_body
            )));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(format!("Failed to parse Ollama response: {}", e)))?;

        let content = ollama_response.response.trim().to_string();
        if content.is_empty() {
            return Err(LlmError::ResponseError(
                "Empty response from Ollama".to_string(),
            ));
        }

        Ok(content)
    }
}

pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// A text-completion backend. Given a system instruction and the user's
/// verbatim question, returns the raw model output.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn complete(&self, system_prompt: &str, question: &str) -> Result<String, LlmError>;
}

pub struct LlmManager {
    generator: Box<dyn QueryGenerator + Send + Sync>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let generator: Box<dyn QueryGenerator + Send + Sync> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )));
            }
        };

        Ok(Self { generator })
    }

    /// Wraps an arbitrary generator; lets tests substitute a mock backend.
    #[cfg(test)]
    pub fn from_generator(generator: Box<dyn QueryGenerator + Send + Sync>) -> Self {
        Self { generator }
    }

    pub async fn complete(&self, system_prompt: &str, question: &str) -> Result<String, LlmError> {
        self.generator.complete(system_prompt, question).await
    }
}

//! Model Provider Abstraction
//!
//! HTTP clients for OpenAI-compatible chat completion APIs (OpenAI, Ollama, local servers).
//! The pipeline never talks to these directly; it goes through `backend::TextBackend`,
//! which `backend::ProviderBackend` implements on top of a `ModelProviderClient`.

use crate::error::GenerationError;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

pub mod openai;

pub use openai::OpenAiCompatibleClient;

/// Resolved model provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelProvider {
    OpenAI {
        model: String,
        api_key: String,
        base_url: Option<String>, // For custom endpoints (e.g., Azure OpenAI)
    },
    Ollama {
        model: String,
        base_url: Option<String>, // Default: http://localhost:11434
    },
    LocalCustom {
        model: String,
        endpoint: String, // Full endpoint URL (e.g., http://localhost:8080/v1)
        api_key: Option<String>,
    },
}

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Completion options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: Option<f32>, // 0.0-2.0
    pub max_tokens: Option<u32>,
}

/// Completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub finish_reason: Option<String>,
}

/// Streaming completion type
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Model provider client trait
#[async_trait]
pub trait ModelProviderClient: Send + Sync {
    /// Generate a completion from a list of messages
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, GenerationError>;

    /// Generate a streaming completion
    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionStream, GenerationError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Provider factory for creating provider clients
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_client(
        provider: &ModelProvider,
    ) -> Result<Box<dyn ModelProviderClient>, GenerationError> {
        match provider {
            ModelProvider::OpenAI {
                model,
                api_key,
                base_url,
            } => Ok(Box::new(OpenAiCompatibleClient::new(
                "openai",
                model.clone(),
                Some(api_key.clone()),
                base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            )?)),
            ModelProvider::Ollama { model, base_url } => {
                let base = base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string());
                Ok(Box::new(OpenAiCompatibleClient::new(
                    "ollama",
                    model.clone(),
                    None,
                    format!("{}/v1", base.trim_end_matches('/')),
                )?))
            }
            ModelProvider::LocalCustom {
                model,
                endpoint,
                api_key,
            } => Ok(Box::new(OpenAiCompatibleClient::new(
                "local",
                model.clone(),
                api_key.clone(),
                endpoint.clone(),
            )?)),
        }
    }
}

/// Provider type as written in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[default]
    OpenAI,
    Ollama,
    #[serde(rename = "local")]
    LocalCustom,
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,

    pub model: String,

    /// Falls back to `OPENAI_API_KEY` for the openai provider type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL (openai, ollama) or full endpoint (local)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: ProviderType::OpenAI,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            endpoint: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(format!("Invalid endpoint URL: {}", endpoint));
            }
        }
        if self.provider_type == ProviderType::LocalCustom && self.endpoint.is_none() {
            return Err("Local providers require an endpoint".to_string());
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(format!("Temperature out of range: {}", temperature));
            }
        }
        Ok(())
    }

    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Resolve into a concrete provider, reading the API key from the environment if needed
    pub fn to_model_provider(&self) -> Result<ModelProvider, GenerationError> {
        self.validate().map_err(GenerationError::Config)?;
        match self.provider_type {
            ProviderType::OpenAI => {
                let api_key = self
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                    .ok_or_else(|| {
                        GenerationError::Config(
                            "OpenAI provider requires api_key or OPENAI_API_KEY".to_string(),
                        )
                    })?;
                Ok(ModelProvider::OpenAI {
                    model: self.model.clone(),
                    api_key,
                    base_url: self.endpoint.clone(),
                })
            }
            ProviderType::Ollama => Ok(ModelProvider::Ollama {
                model: self.model.clone(),
                base_url: self.endpoint.clone(),
            }),
            ProviderType::LocalCustom => Ok(ModelProvider::LocalCustom {
                model: self.model.clone(),
                endpoint: self.endpoint.clone().unwrap_or_default(),
                api_key: self.api_key.clone(),
            }),
        }
    }
}

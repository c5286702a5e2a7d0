//! Generative text backend seam.
//!
//! `TextBackend` is the only capability the pipeline needs from a model: one prompt in,
//! either a complete text or a finite sequence of fragments out. It is injected into the
//! orchestrator so tests can substitute a scripted fake.

use crate::error::GenerationError;
use crate::provider::{ChatMessage, CompletionOptions, CompletionStream, ModelProviderClient};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Lazy, finite, non-restartable sequence of text fragments
pub type FragmentStream = CompletionStream;

#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Generate a complete response for `prompt`
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Generate a response incrementally; the stream may end early with an error item
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream, GenerationError>;
}

#[async_trait]
impl<T: TextBackend + ?Sized> TextBackend for Arc<T> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt).await
    }

    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream, GenerationError> {
        (**self).generate_stream(prompt).await
    }
}

/// Adapts a chat-style provider client to the single-prompt backend contract.
pub struct ProviderBackend {
    client: Box<dyn ModelProviderClient>,
    options: CompletionOptions,
}

impl ProviderBackend {
    pub fn new(client: Box<dyn ModelProviderClient>, options: CompletionOptions) -> Self {
        Self { client, options }
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }
}

#[async_trait]
impl TextBackend for ProviderBackend {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .complete(vec![ChatMessage::user(prompt)], self.options.clone())
            .await?;
        Ok(response.content)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream, GenerationError> {
        self.client
            .stream(vec![ChatMessage::user(prompt)], self.options.clone())
            .await
    }
}

/// Applies a deadline to every batch call and to the gap between streamed fragments.
///
/// A timed-out call surfaces as `GenerationError::Timeout`, which every caller treats
/// the same as a backend failure.
pub struct TimeoutBackend<B> {
    inner: B,
    call_timeout: Duration,
    fragment_timeout: Duration,
}

impl<B: TextBackend> TimeoutBackend<B> {
    pub fn new(inner: B, call_timeout: Duration, fragment_timeout: Duration) -> Self {
        Self {
            inner,
            call_timeout,
            fragment_timeout,
        }
    }
}

#[async_trait]
impl<B: TextBackend> TextBackend for TimeoutBackend<B> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        match tokio::time::timeout(self.call_timeout, self.inner.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.call_timeout, "Backend call timed out");
                Err(GenerationError::Timeout(self.call_timeout))
            }
        }
    }

    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream, GenerationError> {
        let inner = match tokio::time::timeout(self.call_timeout, self.inner.generate_stream(prompt))
            .await
        {
            Ok(result) => result?,
            Err(_) => return Err(GenerationError::Timeout(self.call_timeout)),
        };

        let fragment_timeout = self.fragment_timeout;
        Ok(Box::pin(stream::unfold(
            Some(inner),
            move |state| async move {
                let mut inner = state?;
                match tokio::time::timeout(fragment_timeout, inner.next()).await {
                    Ok(Some(Ok(fragment))) => Some((Ok(fragment), Some(inner))),
                    // An error item terminates the sequence.
                    Ok(Some(Err(e))) => Some((Err(e), None)),
                    Ok(None) => None,
                    Err(_) => {
                        warn!(timeout = ?fragment_timeout, "Stream fragment timed out");
                        Some((Err(GenerationError::Timeout(fragment_timeout)), None))
                    }
                }
            },
        )))
    }
}

//! Single-section generation, batch and streaming.

use crate::backend::TextBackend;
use crate::compress::ContextCompressor;
use crate::config::PipelineConfig;
use crate::error::GenerationError;
use crate::normalize::{normalize, StreamNormalizer};
use crate::orchestrator::GenerationContext;
use crate::plan::{SectionDescriptor, SectionPlan};
use crate::prompt;
use crate::request::GenerationRequest;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a section produced no usable content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Backend,
    Timeout,
    InsufficientContent,
    Cancelled,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&GenerationError> for SectionFailure {
    fn from(err: &GenerationError) -> Self {
        let kind = match err {
            GenerationError::Backend(_) => FailureKind::Backend,
            GenerationError::Timeout(_) => FailureKind::Timeout,
            GenerationError::InsufficientContent { .. } => FailureKind::InsufficientContent,
            GenerationError::Cancelled => FailureKind::Cancelled,
            _ => FailureKind::Other,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for SectionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of generating one section. Failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionResult {
    pub key: String,
    pub display_name: String,
    pub order: u32,
    pub outcome: Result<String, SectionFailure>,
}

impl SectionResult {
    pub fn success(section: &SectionDescriptor, content: String) -> Self {
        Self {
            key: section.key.clone(),
            display_name: section.display_name.clone(),
            order: section.order,
            outcome: Ok(content),
        }
    }

    pub fn failure(section: &SectionDescriptor, err: &GenerationError) -> Self {
        Self {
            key: section.key.clone(),
            display_name: section.display_name.clone(),
            order: section.order,
            outcome: Err(SectionFailure::from(err)),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn content(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    pub fn error(&self) -> Option<&SectionFailure> {
        self.outcome.as_ref().err()
    }
}

/// Normalized fragments of one streamed section
pub type SectionFragments = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Generates one section end to end: prompt, backend call, validation, refinement,
/// normalization.
pub struct SectionGenerator {
    backend: Arc<dyn TextBackend>,
    compressor: ContextCompressor,
    min_content_chars: usize,
    refine: bool,
}

impl SectionGenerator {
    pub fn new(backend: Arc<dyn TextBackend>, settings: &PipelineConfig) -> Self {
        let compressor = ContextCompressor::new(
            backend.clone(),
            settings.compression_threshold_chars,
            settings.truncation_chars,
        );
        Self {
            backend,
            compressor,
            min_content_chars: settings.min_content_chars,
            refine: settings.refine,
        }
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
        plan: &SectionPlan,
        section: &SectionDescriptor,
        context: &GenerationContext,
    ) -> SectionResult {
        match self.try_generate(request, plan, section, context).await {
            Ok(content) => {
                debug!(section = %section.key, chars = content.len(), "Section generated");
                SectionResult::success(section, content)
            }
            Err(e) => {
                warn!(section = %section.key, error = %e, "Section generation failed");
                SectionResult::failure(section, &e)
            }
        }
    }

    async fn try_generate(
        &self,
        request: &GenerationRequest,
        plan: &SectionPlan,
        section: &SectionDescriptor,
        context: &GenerationContext,
    ) -> Result<String, GenerationError> {
        let prompt = self.build_prompt(request, plan, section, context).await;
        let draft = self.backend.generate(&prompt).await?;
        self.validate_content(section, &draft)?;

        let content = normalize(&draft);
        self.validate_content(section, &content)?;
        if !self.refine {
            return Ok(content);
        }
        Ok(self.refine(request, plan, section, &draft, content).await)
    }

    /// Best-effort quality pass over a validated draft.
    ///
    /// The refined text is judged after normalization; any failure keeps the
    /// normalized draft, so refinement never fails a section.
    async fn refine(
        &self,
        request: &GenerationRequest,
        plan: &SectionPlan,
        section: &SectionDescriptor,
        draft: &str,
        normalized_draft: String,
    ) -> String {
        let prompt = prompt::refinement_prompt(request, plan, section, draft);
        match self.backend.generate(&prompt).await {
            Ok(refined) => {
                let refined = normalize(&refined);
                match self.validate_content(section, &refined) {
                    Ok(()) => refined,
                    Err(e) => {
                        warn!(section = %section.key, error = %e, "Refinement too short; keeping draft");
                        normalized_draft
                    }
                }
            }
            Err(e) => {
                warn!(section = %section.key, error = %e, "Refinement failed; keeping draft");
                normalized_draft
            }
        }
    }

    /// Stream a section's normalized text.
    ///
    /// The fragments concatenate to exactly the section content. Length validation is
    /// left to the caller once the stream ends, via `validate_content`. Streamed
    /// sections are not refined.
    pub async fn generate_stream(
        &self,
        request: &GenerationRequest,
        plan: &SectionPlan,
        section: &SectionDescriptor,
        context: &GenerationContext,
    ) -> Result<SectionFragments, GenerationError> {
        let prompt = self.build_prompt(request, plan, section, context).await;
        let raw = self.backend.generate_stream(&prompt).await?;
        Ok(normalized_fragments(raw))
    }

    /// Reject empty or too-short output
    pub fn validate_content(
        &self,
        section: &SectionDescriptor,
        text: &str,
    ) -> Result<(), GenerationError> {
        let length = text.trim().chars().count();
        if length == 0 || length < self.min_content_chars {
            return Err(GenerationError::InsufficientContent {
                section: section.key.clone(),
                length,
                minimum: self.min_content_chars,
            });
        }
        Ok(())
    }

    async fn build_prompt(
        &self,
        request: &GenerationRequest,
        plan: &SectionPlan,
        section: &SectionDescriptor,
        context: &GenerationContext,
    ) -> String {
        let digests = self.compressor.compress_all(context.iter()).await;
        prompt::section_prompt(request, plan, section, &prompt::context_block(&digests))
    }
}

struct NormalizeState<S> {
    raw: S,
    normalizer: StreamNormalizer,
    done: bool,
}

fn normalized_fragments<S>(raw: S) -> SectionFragments
where
    S: Stream<Item = Result<String, GenerationError>> + Send + Unpin + 'static,
{
    let state = NormalizeState {
        raw,
        normalizer: StreamNormalizer::new(),
        done: false,
    };
    Box::pin(stream::unfold(state, |mut state| async move {
        while !state.done {
            match state.raw.next().await {
                Some(Ok(fragment)) => {
                    let text = state.normalizer.push(&fragment);
                    if !text.is_empty() {
                        return Some((Ok(text), state));
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    let text = state.normalizer.finish();
                    if !text.is_empty() {
                        return Some((Ok(text), state));
                    }
                }
            }
        }
        None
    }))
}

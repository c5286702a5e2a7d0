//! Strategy selection: structured multi-section generation, then a single-prompt fallback.

use crate::backend::TextBackend;
use crate::error::GenerationError;
use crate::normalize::normalize;
use crate::orchestrator::{AssembledDocument, GenerationOrchestrator, SectionStatus};
use crate::plan::PlanSource;
use crate::prompt;
use crate::request::GenerationRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Structured,
    SinglePrompt,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Structured => f.write_str("structured"),
            Strategy::SinglePrompt => f.write_str("single_prompt"),
        }
    }
}

/// A document together with the strategy that produced it
#[derive(Debug, Clone)]
pub struct ProducedDocument {
    pub strategy: Strategy,
    pub document: AssembledDocument,
    /// Empty for single-prompt documents, which have no section structure
    pub per_section_status: Vec<SectionStatus>,
}

/// Tagged result of strategy selection
#[derive(Debug)]
pub enum StrategyOutcome {
    Produced(ProducedDocument),
    /// The structured run failed with an error no other strategy can fix
    Rejected(GenerationError),
    /// Both strategies failed
    Unavailable {
        structured: GenerationError,
        single_prompt: GenerationError,
    },
}

impl StrategyOutcome {
    pub fn into_result(self) -> Result<ProducedDocument, GenerationError> {
        match self {
            StrategyOutcome::Produced(document) => Ok(document),
            StrategyOutcome::Rejected(err) => Err(err),
            StrategyOutcome::Unavailable {
                structured,
                single_prompt,
            } => Err(GenerationError::GenerationUnavailable {
                structured: structured.to_string(),
                single_prompt: single_prompt.to_string(),
            }),
        }
    }
}

/// Whole-document generation from one backend call.
pub struct SinglePromptStrategy {
    backend: Arc<dyn TextBackend>,
    plans: Arc<dyn PlanSource>,
    min_content_chars: usize,
}

impl SinglePromptStrategy {
    pub fn new(
        backend: Arc<dyn TextBackend>,
        plans: Arc<dyn PlanSource>,
        min_content_chars: usize,
    ) -> Self {
        Self {
            backend,
            plans,
            min_content_chars,
        }
    }

    pub async fn run(&self, request: &GenerationRequest) -> Result<AssembledDocument, GenerationError> {
        let plan = self.plans.lookup(&request.document_type)?;
        let text = self
            .backend
            .generate(&prompt::single_prompt(request, &plan))
            .await?;
        let content = normalize(&text);
        let length = content.chars().count();
        if length == 0 || length < self.min_content_chars {
            return Err(GenerationError::InsufficientContent {
                section: request.document_type.clone(),
                length,
                minimum: self.min_content_chars,
            });
        }
        Ok(AssembledDocument::from_text(content))
    }
}

/// Tries the structured strategy and falls back to a single prompt when it fails outright.
///
/// A structured run that merely lost some sections still counts as success.
pub struct FallbackStrategySelector {
    orchestrator: Arc<GenerationOrchestrator>,
    single_prompt: SinglePromptStrategy,
}

impl FallbackStrategySelector {
    pub fn new(orchestrator: Arc<GenerationOrchestrator>, single_prompt: SinglePromptStrategy) -> Self {
        Self {
            orchestrator,
            single_prompt,
        }
    }

    pub fn orchestrator(&self) -> &Arc<GenerationOrchestrator> {
        &self.orchestrator
    }

    pub async fn select(&self, request: &GenerationRequest) -> StrategyOutcome {
        match self.orchestrator.run(request).await {
            Ok(outcome) => StrategyOutcome::Produced(ProducedDocument {
                strategy: Strategy::Structured,
                document: outcome.document,
                per_section_status: outcome.per_section_status,
            }),
            Err(structured) => self.after_structured_failure(request, structured).await,
        }
    }

    pub async fn produce(&self, request: &GenerationRequest) -> Result<ProducedDocument, GenerationError> {
        self.select(request).await.into_result()
    }

    /// Decide what to do once the structured strategy has failed with `structured`
    pub async fn after_structured_failure(
        &self,
        request: &GenerationRequest,
        structured: GenerationError,
    ) -> StrategyOutcome {
        if !structured.is_retryable_by_fallback() {
            return StrategyOutcome::Rejected(structured);
        }
        warn!(
            document_type = %request.document_type,
            error = %structured,
            strategy = %Strategy::SinglePrompt,
            "Structured generation failed; falling back"
        );
        match self.single_prompt.run(request).await {
            Ok(document) => {
                info!(document_type = %request.document_type, strategy = %Strategy::SinglePrompt, "Fallback produced document");
                StrategyOutcome::Produced(ProducedDocument {
                    strategy: Strategy::SinglePrompt,
                    document,
                    per_section_status: Vec::new(),
                })
            }
            Err(single_prompt) => {
                warn!(document_type = %request.document_type, error = %single_prompt, "Fallback failed");
                StrategyOutcome::Unavailable {
                    structured,
                    single_prompt,
                }
            }
        }
    }
}

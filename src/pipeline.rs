//! Document pipeline: the caller-facing boundary.
//!
//! Wires backend, plans, generator, orchestrator, fallback and persistence together and
//! exposes a blocking `produce_document` plus an event-streaming variant.

use crate::backend::{ProviderBackend, TextBackend, TimeoutBackend};
use crate::config::{FolioConfig, PipelineConfig};
use crate::error::GenerationError;
use crate::fallback::{FallbackStrategySelector, ProducedDocument, SinglePromptStrategy, Strategy};
use crate::generator::SectionGenerator;
use crate::orchestrator::{GenerationOrchestrator, SectionStatus, StreamEvent};
use crate::persistence::PersistenceCoordinator;
use crate::plan::PlanSource;
use crate::provider::ProviderFactory;
use crate::request::GenerationRequest;
use crate::store::{DocumentStore, SledDocumentStore, StoredDocument};
use futures::stream::{self, Stream};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const EVENT_BUFFER: usize = 64;

/// A saved document and how it was produced
#[derive(Debug, Clone)]
pub struct ProducedReport {
    pub document: StoredDocument,
    pub strategy: Strategy,
    pub per_section_status: Vec<SectionStatus>,
}

impl ProducedReport {
    pub fn content(&self) -> &str {
        &self.document.content
    }
}

/// How a streaming run ended, as seen by the background task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed { document_id: String, strategy: Strategy },
    /// The consumer went away; `partial_id` names the partial record, if any was saved
    Interrupted { partial_id: Option<String> },
    Failed { error: String },
}

/// Events of one streaming run.
///
/// Dropping the stream (or calling `cancel`) cancels the run; sections finished by then
/// are saved as a partial document.
pub struct DocumentStream {
    events: Pin<Box<dyn Stream<Item = StreamEvent> + Send>>,
    task: JoinHandle<StreamOutcome>,
}

impl DocumentStream {
    /// Drain the remaining events and wait for the run to end
    pub async fn finish(mut self) -> (Vec<StreamEvent>, StreamOutcome) {
        use futures::StreamExt;
        let mut events = Vec::new();
        while let Some(event) = self.events.next().await {
            events.push(event);
        }
        (events, join(self.task).await)
    }

    /// Stop listening and wait for the interrupted run to wind down
    pub async fn cancel(self) -> StreamOutcome {
        drop(self.events);
        join(self.task).await
    }
}

impl Stream for DocumentStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
        self.get_mut().events.as_mut().poll_next(cx)
    }
}

async fn join(task: JoinHandle<StreamOutcome>) -> StreamOutcome {
    match task.await {
        Ok(outcome) => outcome,
        Err(e) => StreamOutcome::Failed {
            error: format!("Generation task aborted: {}", e),
        },
    }
}

pub struct DocumentPipeline {
    selector: FallbackStrategySelector,
    persistence: PersistenceCoordinator,
}

impl DocumentPipeline {
    pub fn new(selector: FallbackStrategySelector, persistence: PersistenceCoordinator) -> Self {
        Self {
            selector,
            persistence,
        }
    }

    /// Wire a pipeline from its collaborators
    pub fn assemble(
        backend: Arc<dyn TextBackend>,
        plans: Arc<dyn PlanSource>,
        store: Arc<dyn DocumentStore>,
        settings: &PipelineConfig,
    ) -> Self {
        let generator = Arc::new(SectionGenerator::new(backend.clone(), settings));
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            plans.clone(),
            generator,
            settings.max_concurrent_sections,
        ));
        let single_prompt = SinglePromptStrategy::new(backend, plans, settings.min_content_chars);
        Self::new(
            FallbackStrategySelector::new(orchestrator, single_prompt),
            PersistenceCoordinator::new(store),
        )
    }

    /// Build the production pipeline: configured provider behind timeouts, built-in and
    /// configured plans, sled store.
    pub fn from_config(config: &FolioConfig) -> Result<Self, GenerationError> {
        config.pipeline.validate().map_err(GenerationError::Config)?;
        let provider = config.provider.to_model_provider()?;
        let client = ProviderFactory::create_client(&provider)?;
        info!(
            provider = client.provider_name(),
            model = client.model_name(),
            "Using model provider"
        );
        let backend = TimeoutBackend::new(
            ProviderBackend::new(client, config.provider.completion_options()),
            config.pipeline.call_timeout(),
            config.pipeline.fragment_timeout(),
        );
        let plans = config.plan_registry()?;
        let store = SledDocumentStore::new(&config.storage.store_path)?;
        Ok(Self::assemble(
            Arc::new(backend),
            Arc::new(plans),
            Arc::new(store),
            &config.pipeline,
        ))
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        self.persistence.store()
    }

    /// Generate, fall back if needed, and save
    pub async fn produce_document(
        &self,
        request: &GenerationRequest,
    ) -> Result<ProducedReport, GenerationError> {
        let produced = self.selector.produce(request).await?;
        let document = self.persistence.save(request, &produced)?;
        Ok(ProducedReport {
            document,
            strategy: produced.strategy,
            per_section_status: produced.per_section_status,
        })
    }

    /// Start a streaming run in the background.
    ///
    /// Events arrive in order; the last one is either `Completed` (progress 100) or
    /// `Failed`. Must be called within a tokio runtime.
    pub fn produce_document_stream(self: &Arc<Self>, request: GenerationRequest) -> DocumentStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let pipeline = Arc::clone(self);
        let task = tokio::spawn(async move { pipeline.run_stream(request, tx).await });
        let events = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        DocumentStream {
            events: Box::pin(events),
            task,
        }
    }

    async fn run_stream(&self, request: GenerationRequest, tx: mpsc::Sender<StreamEvent>) -> StreamOutcome {
        let mut completed = Vec::new();
        let run = tokio::select! {
            result = self.selector.orchestrator().run_streaming(&request, &mut completed, &tx) => Some(result),
            _ = tx.closed() => None,
        };

        let produced = match run {
            None | Some(Err(GenerationError::Cancelled)) => {
                return self.interrupted(&request, &completed, "consumer disconnected");
            }
            Some(Ok(outcome)) => Ok(ProducedDocument {
                strategy: Strategy::Structured,
                document: outcome.document,
                per_section_status: outcome.per_section_status,
            }),
            Some(Err(structured)) => {
                let fallback = tokio::select! {
                    outcome = self.selector.after_structured_failure(&request, structured) => Some(outcome),
                    _ = tx.closed() => None,
                };
                match fallback {
                    Some(outcome) => outcome.into_result(),
                    None => return self.interrupted(&request, &completed, "consumer disconnected"),
                }
            }
        };

        let result = produced.and_then(|produced| {
            let stored = self.persistence.save(&request, &produced)?;
            Ok((produced, stored))
        });
        match result {
            Ok((produced, stored)) => {
                let outcome = StreamOutcome::Completed {
                    document_id: stored.id.clone(),
                    strategy: produced.strategy,
                };
                let event = StreamEvent::Completed {
                    content: stored.content,
                    per_section_status: produced.per_section_status,
                    document_id: Some(stored.id),
                    progress: 100,
                };
                if tx.send(event).await.is_err() {
                    warn!(document_type = %request.document_type, "Consumer left before completion event");
                }
                outcome
            }
            Err(e) => {
                error!(document_type = %request.document_type, error = %e, "Streaming generation failed");
                let error = e.to_string();
                let _ = tx
                    .send(StreamEvent::Failed {
                        error: error.clone(),
                    })
                    .await;
                StreamOutcome::Failed { error }
            }
        }
    }

    fn interrupted(
        &self,
        request: &GenerationRequest,
        completed: &[crate::generator::SectionResult],
        reason: &str,
    ) -> StreamOutcome {
        info!(
            document_type = %request.document_type,
            completed = completed.len(),
            "Streaming run cancelled"
        );
        match self
            .persistence
            .save_under_interruption(request, completed, reason)
        {
            Ok(saved) => StreamOutcome::Interrupted {
                partial_id: saved.map(|doc| doc.id),
            },
            Err(e) => {
                error!(error = %e, "Failed to save partial document");
                StreamOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

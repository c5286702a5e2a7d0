//! Generation orchestrator: runs a section plan as a two-phase barrier.
//!
//! Independent sections are generated concurrently against an empty context. Once all
//! of them have finished, dependent sections run one at a time in ascending `order`,
//! each seeing every section completed before it. The context is only written by the
//! orchestrator between generations, so no locking is involved.

use crate::error::GenerationError;
use crate::generator::{SectionFailure, SectionGenerator, SectionResult};
use crate::plan::{PlanSource, SectionDescriptor, SectionPlan};
use crate::request::GenerationRequest;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Generated text of completed sections, kept in plan order.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    entries: Vec<ContextEntry>,
}

#[derive(Debug, Clone)]
struct ContextEntry {
    key: String,
    order: u32,
    text: String,
}

impl GenerationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, section: &SectionDescriptor, text: String) {
        self.entries.retain(|e| e.key != section.key);
        let at = self
            .entries
            .partition_point(|e| e.order < section.order);
        self.entries.insert(
            at,
            ContextEntry {
                key: section.key.clone(),
                order: section.order,
                text,
            },
        );
    }

    /// Add a result's content; failed results leave the context untouched
    fn absorb(&mut self, result: &SectionResult, plan: &SectionPlan) {
        if let (Some(content), Some(section)) = (result.content(), plan.get(&result.key)) {
            self.insert(section, content.to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.text.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(key, text)` pairs in plan order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.key.as_str(), e.text.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Planning,
    GeneratingIndependent,
    GeneratingDependent,
    Assembling,
    Done,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Planning => "planning",
            RunPhase::GeneratingIndependent => "generating_independent",
            RunPhase::GeneratingDependent => "generating_dependent",
            RunPhase::Assembling => "assembling",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }
}

/// Tracks and logs the phase of one run
struct PhaseTracker<'a> {
    document_type: &'a str,
    phase: RunPhase,
}

impl<'a> PhaseTracker<'a> {
    fn new(document_type: &'a str) -> Self {
        debug!(document_type, phase = %RunPhase::Planning, "Run started");
        Self {
            document_type,
            phase: RunPhase::Planning,
        }
    }

    fn enter(&mut self, next: RunPhase) {
        debug!(
            document_type = self.document_type,
            from = %self.phase,
            to = %next,
            "Phase transition"
        );
        self.phase = next;
    }

    fn fail(&mut self, err: GenerationError) -> GenerationError {
        if !self.phase.is_terminal() {
            warn!(
                document_type = self.document_type,
                phase = %self.phase,
                error = %err,
                "Run failed"
            );
            self.phase = RunPhase::Failed;
        }
        err
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledSection {
    pub key: String,
    pub display_name: String,
    pub order: u32,
    pub content: String,
}

impl AssembledSection {
    pub fn heading(&self) -> String {
        self.display_name.to_uppercase()
    }
}

/// Final document text plus the sections it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledDocument {
    pub content: String,
    pub sections: Vec<AssembledSection>,
}

impl AssembledDocument {
    /// Successful results in ascending `order`, each under its uppercase heading.
    /// The input order does not matter.
    pub fn assemble(results: &[SectionResult]) -> Self {
        let mut sections: Vec<AssembledSection> = results
            .iter()
            .filter_map(|r| {
                r.content().map(|content| AssembledSection {
                    key: r.key.clone(),
                    display_name: r.display_name.clone(),
                    order: r.order,
                    content: content.to_string(),
                })
            })
            .collect();
        sections.sort_by_key(|s| s.order);

        let content = sections
            .iter()
            .map(|s| format!("{}\n\n{}", s.heading(), s.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        Self { content, sections }
    }

    /// A document produced as one block of text, without section structure
    pub fn from_text(content: String) -> Self {
        Self {
            content,
            sections: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionStatus {
    pub key: String,
    pub display_name: String,
    pub order: u32,
    pub succeeded: bool,
    pub error: Option<SectionFailure>,
}

impl From<&SectionResult> for SectionStatus {
    fn from(result: &SectionResult) -> Self {
        Self {
            key: result.key.clone(),
            display_name: result.display_name.clone(),
            order: result.order,
            succeeded: result.succeeded(),
            error: result.error().cloned(),
        }
    }
}

/// Per-section status in ascending `order`
pub fn section_statuses(results: &[SectionResult]) -> Vec<SectionStatus> {
    let mut statuses: Vec<SectionStatus> = results.iter().map(SectionStatus::from).collect();
    statuses.sort_by_key(|s| s.order);
    statuses
}

/// Result of a structured run that reached DONE
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub document: AssembledDocument,
    pub per_section_status: Vec<SectionStatus>,
}

impl GenerationOutcome {
    pub fn failed_sections(&self) -> usize {
        self.per_section_status.iter().filter(|s| !s.succeeded).count()
    }
}

/// Events delivered to a streaming caller, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Text of the dependent section currently being generated
    Fragment {
        section: String,
        display_name: String,
        fragment: String,
        progress: u8,
    },
    SectionCompleted {
        section: String,
        display_name: String,
        content: String,
        progress: u8,
    },
    SectionFailed {
        section: String,
        display_name: String,
        error: String,
        progress: u8,
    },
    /// Terminal success; always carries progress 100
    Completed {
        content: String,
        per_section_status: Vec<SectionStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document_id: Option<String>,
        progress: u8,
    },
    /// Terminal failure
    Failed { error: String },
}

impl StreamEvent {
    pub fn progress(&self) -> Option<u8> {
        match self {
            StreamEvent::Fragment { progress, .. }
            | StreamEvent::SectionCompleted { progress, .. }
            | StreamEvent::SectionFailed { progress, .. }
            | StreamEvent::Completed { progress, .. } => Some(*progress),
            StreamEvent::Failed { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed { .. } | StreamEvent::Failed { .. })
    }

    fn section_finished(result: &SectionResult, progress: u8) -> Self {
        match &result.outcome {
            Ok(content) => StreamEvent::SectionCompleted {
                section: result.key.clone(),
                display_name: result.display_name.clone(),
                content: content.clone(),
                progress,
            },
            Err(failure) => StreamEvent::SectionFailed {
                section: result.key.clone(),
                display_name: result.display_name.clone(),
                error: failure.message.clone(),
                progress,
            },
        }
    }
}

/// `completed / total` as a percentage, held below 100 until the run is over
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed * 100) / total).min(99) as u8
}

async fn emit(events: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> Result<(), GenerationError> {
    events.send(event).await.map_err(|_| GenerationError::Cancelled)
}

/// Runs one request's section plan.
pub struct GenerationOrchestrator {
    plans: Arc<dyn PlanSource>,
    generator: Arc<SectionGenerator>,
    max_concurrent: usize,
}

impl GenerationOrchestrator {
    pub fn new(
        plans: Arc<dyn PlanSource>,
        generator: Arc<SectionGenerator>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            plans,
            generator,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn plans(&self) -> &Arc<dyn PlanSource> {
        &self.plans
    }

    /// Run the plan to completion.
    ///
    /// Section failures are reported in `per_section_status`; only a run where no
    /// section succeeded fails, with `NoContentGenerated`.
    pub async fn run(&self, request: &GenerationRequest) -> Result<GenerationOutcome, GenerationError> {
        let mut results = Vec::new();
        self.execute(request, &mut results, None).await
    }

    /// Run the plan while reporting progress on `events`.
    ///
    /// Independent sections are reported as whole units as they finish; dependent
    /// sections are streamed fragment by fragment. Every finished section is pushed onto
    /// `completed` as soon as it is known, so a caller that abandons this future still
    /// holds everything finished so far. A closed event channel ends the run with
    /// `Cancelled`.
    pub async fn run_streaming(
        &self,
        request: &GenerationRequest,
        completed: &mut Vec<SectionResult>,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<GenerationOutcome, GenerationError> {
        self.execute(request, completed, Some(events)).await
    }

    async fn execute(
        &self,
        request: &GenerationRequest,
        results: &mut Vec<SectionResult>,
        events: Option<&mpsc::Sender<StreamEvent>>,
    ) -> Result<GenerationOutcome, GenerationError> {
        let mut tracker = PhaseTracker::new(&request.document_type);
        request.validate().map_err(|e| tracker.fail(e))?;
        let plan = self
            .plans
            .lookup(&request.document_type)
            .map_err(|e| tracker.fail(e))?;
        let plan: &SectionPlan = &plan;
        let (independent, dependent) = plan.partition();
        let total = plan.len();
        info!(
            document_type = %request.document_type,
            independent = independent.len(),
            dependent = dependent.len(),
            "Generating document"
        );

        tracker.enter(RunPhase::GeneratingIndependent);
        let empty = GenerationContext::new();
        let generator = &self.generator;
        let initial = &empty;
        // Futures are built eagerly so the spawned run stays Send
        let tasks: Vec<_> = independent
            .into_iter()
            .map(|section| generator.generate(request, plan, section, initial))
            .collect();
        let mut pending = stream::iter(tasks).buffer_unordered(self.max_concurrent);
        while let Some(result) = pending.next().await {
            let progress = progress_percent(results.len() + 1, total);
            let event = StreamEvent::section_finished(&result, progress);
            results.push(result);
            if let Some(events) = events {
                emit(events, event).await.map_err(|e| tracker.fail(e))?;
            }
        }
        drop(pending);

        let mut context = GenerationContext::new();
        for result in results.iter() {
            context.absorb(result, plan);
        }

        tracker.enter(RunPhase::GeneratingDependent);
        for section in dependent {
            let result = match events {
                Some(events) => self
                    .stream_section(request, plan, section, &context, results.len(), total, events)
                    .await
                    .map_err(|e| tracker.fail(e))?,
                None => self.generator.generate(request, plan, section, &context).await,
            };
            context.absorb(&result, plan);
            let progress = progress_percent(results.len() + 1, total);
            let event = StreamEvent::section_finished(&result, progress);
            results.push(result);
            if let Some(events) = events {
                emit(events, event).await.map_err(|e| tracker.fail(e))?;
            }
        }

        tracker.enter(RunPhase::Assembling);
        let document = AssembledDocument::assemble(results);
        if document.sections.is_empty() {
            return Err(tracker.fail(GenerationError::NoContentGenerated {
                failed: results.len(),
            }));
        }
        let outcome = GenerationOutcome {
            document,
            per_section_status: section_statuses(results),
        };
        tracker.enter(RunPhase::Done);
        info!(
            document_type = %request.document_type,
            sections = outcome.document.sections.len(),
            failed = outcome.failed_sections(),
            "Document assembled"
        );
        Ok(outcome)
    }

    /// Stream one dependent section, forwarding fragments as they arrive
    #[allow(clippy::too_many_arguments)]
    async fn stream_section(
        &self,
        request: &GenerationRequest,
        plan: &SectionPlan,
        section: &SectionDescriptor,
        context: &GenerationContext,
        completed: usize,
        total: usize,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<SectionResult, GenerationError> {
        let progress = progress_percent(completed, total);
        let mut fragments = match self
            .generator
            .generate_stream(request, plan, section, context)
            .await
        {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!(section = %section.key, error = %e, "Section stream failed to start");
                return Ok(SectionResult::failure(section, &e));
            }
        };

        let mut content = String::new();
        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => {
                    content.push_str(&fragment);
                    emit(
                        events,
                        StreamEvent::Fragment {
                            section: section.key.clone(),
                            display_name: section.display_name.clone(),
                            fragment,
                            progress,
                        },
                    )
                    .await?;
                }
                Err(e) => {
                    warn!(section = %section.key, error = %e, "Section stream ended with error");
                    return Ok(SectionResult::failure(section, &e));
                }
            }
        }

        match self.generator.validate_content(section, &content) {
            Ok(()) => Ok(SectionResult::success(section, content)),
            Err(e) => {
                warn!(section = %section.key, error = %e, "Streamed section rejected");
                Ok(SectionResult::failure(section, &e))
            }
        }
    }
}

//! CLI route: single route table and run context. Dispatches to the pipeline, the
//! document store and presentation.

use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{
    format_document_json, format_document_page_json, format_document_page_text,
    format_document_text, format_generation_report, format_plans_json, format_plans_text,
    StreamRenderer,
};
use crate::config::{ConfigLoader, FolioConfig};
use crate::error::GenerationError;
use crate::pipeline::{DocumentPipeline, StreamOutcome};
use crate::request::GenerationRequest;
use crate::store::{DocumentStore, SledDocumentStore};
use anyhow::{bail, Context};
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Runtime context for CLI execution: workspace and loaded configuration.
pub struct RunContext {
    config: FolioConfig,
    workspace_root: PathBuf,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ConfigLoader::load(&workspace_root).context("Failed to load configuration")?,
        };
        if let Err(errors) = config.validate() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(GenerationError::Config(messages.join("; ")).into());
        }
        config.storage.store_path = resolve_path(&workspace_root, &config.storage.store_path);
        if let Some(path) = config.plans_file.take() {
            config.plans_file = Some(resolve_path(&workspace_root, &path));
        }
        Ok(Self {
            config,
            workspace_root,
        })
    }

    pub fn config(&self) -> &FolioConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Run one command and return its rendered output
    pub fn execute(&self, command: &Commands) -> anyhow::Result<String> {
        info!(command = command.name(), "Executing command");
        match command {
            Commands::Generate {
                title,
                document_type,
                instructions,
                user,
                stream,
            } => {
                let mut request = GenerationRequest::new(title, document_type, user);
                if let Some(instructions) = instructions {
                    request = request.with_instructions(instructions);
                }
                if *stream {
                    self.handle_generate_stream(request)
                } else {
                    self.handle_generate(request)
                }
            }
            Commands::Show { id, user, format } => {
                let store = self.open_store()?;
                let Some(document) = store.get(id, user)? else {
                    bail!("Document {} not found", id);
                };
                Ok(match format {
                    OutputFormat::Text => format_document_text(&document),
                    OutputFormat::Json => format_document_json(&document),
                })
            }
            Commands::List {
                user,
                page,
                limit,
                format,
            } => {
                let store = self.open_store()?;
                let page = store.list(user, *page, *limit)?;
                Ok(match format {
                    OutputFormat::Text => format_document_page_text(&page),
                    OutputFormat::Json => format_document_page_json(&page),
                })
            }
            Commands::Delete { id, user } => {
                let store = self.open_store()?;
                if !store.delete(id, user)? {
                    bail!("Document {} not found", id);
                }
                store.flush()?;
                Ok(format!("Deleted document {}", id))
            }
            Commands::Plans { format } => {
                let registry = self.config.plan_registry()?;
                Ok(match format {
                    OutputFormat::Text => format_plans_text(&registry),
                    OutputFormat::Json => format_plans_json(&registry),
                })
            }
        }
    }

    fn handle_generate(&self, request: GenerationRequest) -> anyhow::Result<String> {
        let pipeline = self.pipeline()?;
        let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
        let report = runtime.block_on(pipeline.produce_document(&request))?;
        Ok(format_generation_report(&report))
    }

    fn handle_generate_stream(&self, request: GenerationRequest) -> anyhow::Result<String> {
        let pipeline = Arc::new(self.pipeline()?);
        let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
        let outcome = runtime.block_on(async {
            let mut events = pipeline.produce_document_stream(request);
            let mut renderer = StreamRenderer::new();
            let mut stdout = std::io::stdout();
            while let Some(event) = events.next().await {
                write!(stdout, "{}", renderer.render(&event))?;
                stdout.flush()?;
            }
            let (_, outcome) = events.finish().await;
            Ok::<_, std::io::Error>(outcome)
        })?;
        match outcome {
            StreamOutcome::Completed {
                document_id,
                strategy,
            } => Ok(format!("Document {} ({} strategy)", document_id, strategy)),
            StreamOutcome::Interrupted { partial_id } => match partial_id {
                Some(id) => bail!("Generation interrupted; partial document saved as {}", id),
                None => bail!("Generation interrupted before any section completed"),
            },
            StreamOutcome::Failed { error } => bail!("Generation failed: {}", error),
        }
    }

    fn pipeline(&self) -> anyhow::Result<DocumentPipeline> {
        prepare_store_dir(&self.config.storage.store_path)?;
        Ok(DocumentPipeline::from_config(&self.config)?)
    }

    fn open_store(&self) -> anyhow::Result<SledDocumentStore> {
        let path = &self.config.storage.store_path;
        prepare_store_dir(path)?;
        SledDocumentStore::new(path)
            .with_context(|| format!("Failed to open document store at {}", path.display()))
    }
}

fn prepare_store_dir(path: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create store directory {}", path.display()))
}

/// Relative paths in config are relative to the workspace root
fn resolve_path(workspace_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}

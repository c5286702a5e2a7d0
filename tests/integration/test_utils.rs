//! Shared test utilities for integration tests
//!
//! A scripted `TextBackend`, pipeline wiring over a temporary sled store, and
//! environment isolation for config tests.

use async_trait::async_trait;
use folio::backend::{FragmentStream, TextBackend};
use folio::config::PipelineConfig;
use folio::error::GenerationError;
use folio::pipeline::DocumentPipeline;
use folio::plan::{PlanRegistry, SectionDescriptor, SectionPlan};
use folio::store::{DocumentStore, SledDocumentStore};
use futures::stream;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

#[derive(Clone)]
pub enum Reply {
    Text(String),
    Fragments(Vec<String>),
    Fail(String),
    Delayed(Duration, String),
    /// Never answers
    Hang,
}

pub fn text(s: &str) -> Reply {
    Reply::Text(s.to_string())
}

/// Backend whose replies are picked by the first rule whose needle occurs in the prompt.
pub struct FakeBackend {
    rules: Vec<(String, Reply)>,
    default: Reply,
    prompts: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new(default: Reply) -> Self {
        Self {
            rules: Vec::new(),
            default,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::new(Reply::Fail("backend unavailable".to_string()))
    }

    pub fn rule(mut self, needle: &str, reply: Reply) -> Self {
        self.rules.push((needle.to_string(), reply));
        self
    }

    /// Rule matching the prompt for one section
    pub fn section(self, display_name: &str, reply: Reply) -> Self {
        let needle = format!("Write the \"{}\" section", display_name);
        self.rule(&needle, reply)
    }

    pub fn calls_matching(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }

    fn reply_for(&self, prompt: &str) -> Reply {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl TextBackend for FakeBackend {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        match self.reply_for(prompt) {
            Reply::Text(text) => Ok(text),
            Reply::Fragments(parts) => Ok(parts.concat()),
            Reply::Fail(message) => Err(GenerationError::Backend(message)),
            Reply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Reply::Hang => std::future::pending().await,
        }
    }

    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream, GenerationError> {
        match self.reply_for(prompt) {
            Reply::Text(text) => Ok(Box::pin(stream::iter(vec![Ok(text)]))),
            Reply::Fragments(parts) => Ok(Box::pin(stream::iter(
                parts.into_iter().map(Ok).collect::<Vec<_>>(),
            ))),
            Reply::Fail(message) => Err(GenerationError::Backend(message)),
            Reply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(Box::pin(stream::iter(vec![Ok(text)])))
            }
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Settings that accept any non-empty section and skip refinement
pub fn lenient_settings() -> PipelineConfig {
    PipelineConfig {
        min_content_chars: 1,
        refine: false,
        ..PipelineConfig::default()
    }
}

/// Registry holding the two-section "proposal" plan: intro (independent), methodology (dependent)
pub fn proposal_registry() -> PlanRegistry {
    let mut registry = PlanRegistry::empty();
    registry.insert(
        SectionPlan::new(
            "proposal",
            vec![
                SectionDescriptor::new("intro", "Intro", 1, true),
                SectionDescriptor::new("methodology", "Methodology", 2, false),
            ],
            None,
        )
        .unwrap(),
    );
    registry
}

pub struct TestPipeline {
    pub pipeline: Arc<DocumentPipeline>,
    pub backend: Arc<FakeBackend>,
    pub store: Arc<SledDocumentStore>,
    _dir: TempDir,
}

/// Pipeline over `backend` and `registry`, backed by a sled store in a temp dir
pub fn pipeline_with(backend: FakeBackend, registry: PlanRegistry) -> TestPipeline {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SledDocumentStore::new(dir.path().join("store")).unwrap());
    let backend = Arc::new(backend);
    let pipeline = DocumentPipeline::assemble(
        backend.clone(),
        Arc::new(registry),
        store.clone() as Arc<dyn DocumentStore>,
        &lenient_settings(),
    );
    TestPipeline {
        pipeline: Arc::new(pipeline),
        backend,
        store,
        _dir: dir,
    }
}

/// Run `f` with `vars` set and config/home directories pointed into `test_dir`;
/// the previous environment is restored afterwards.
pub fn with_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let mut names: Vec<&str> = vec!["HOME", "XDG_CONFIG_HOME"];
    names.extend(vars.iter().map(|(name, _)| *name));
    let saved: Vec<(String, Option<String>)> = names
        .iter()
        .map(|name| (name.to_string(), std::env::var(name).ok()))
        .collect();

    let home = test_dir.path().join("home");
    let config_home = test_dir.path().join("config");
    std::fs::create_dir_all(&home).unwrap();
    std::fs::create_dir_all(&config_home).unwrap();
    std::env::set_var("HOME", &home);
    std::env::set_var("XDG_CONFIG_HOME", &config_home);
    for (name, value) in vars {
        std::env::set_var(name, value);
    }

    let result = f();

    for (name, value) in saved {
        match value {
            Some(value) => std::env::set_var(&name, value),
            None => std::env::remove_var(&name),
        }
    }
    result
}

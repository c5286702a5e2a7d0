//! Integration tests for configuration loading

use crate::integration::test_utils::with_env;
use folio::config::ConfigLoader;
use folio::plan::{PlanRegistry, PlanSource};
use folio::provider::ProviderType;
use tempfile::TempDir;

const WORKSPACE_CONFIG: &str = r#"
[provider]
provider_type = "ollama"
model = "llama3"
endpoint = "http://localhost:11434"

[pipeline]
min_content_chars = 20
max_concurrent_sections = 2

[storage]
store_path = "store"

[plans.memo]
structure = "Summary, then Details"
sections = [
    { key = "summary", name = "Summary", order = 1, independent = true },
    { key = "details", name = "Details", order = 2 },
]
"#;

#[test]
fn workspace_file_overrides_defaults() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(workspace.join("folio.toml"), WORKSPACE_CONFIG).unwrap();

    let config = with_env(&temp, &[], || ConfigLoader::load(&workspace)).unwrap();

    assert_eq!(config.provider.provider_type, ProviderType::Ollama);
    assert_eq!(config.provider.model, "llama3");
    assert_eq!(config.pipeline.min_content_chars, 20);
    assert_eq!(config.pipeline.max_concurrent_sections, 2);
    assert_eq!(config.pipeline.compression_threshold_chars, 500);
    assert!(config.validate().is_ok());
}

#[test]
fn environment_overrides_workspace_file() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(workspace.join("folio.toml"), WORKSPACE_CONFIG).unwrap();

    let config = with_env(
        &temp,
        &[
            ("FOLIO_PIPELINE__REFINE", "false"),
            ("FOLIO_PIPELINE__MIN_CONTENT_CHARS", "75"),
        ],
        || ConfigLoader::load(&workspace),
    )
    .unwrap();

    assert!(!config.pipeline.refine);
    assert_eq!(config.pipeline.min_content_chars, 75);
}

#[test]
fn global_file_sits_beneath_workspace_file() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(workspace.join("folio.toml"), WORKSPACE_CONFIG).unwrap();

    let config = with_env(&temp, &[], || {
        let global = ConfigLoader::global_config_path().unwrap();
        std::fs::create_dir_all(global.parent().unwrap()).unwrap();
        std::fs::write(
            &global,
            "[pipeline]\nmin_content_chars = 5\ntruncation_chars = 200\n",
        )
        .unwrap();
        ConfigLoader::load(&workspace)
    })
    .unwrap();

    assert_eq!(config.pipeline.truncation_chars, 200);
    assert_eq!(config.pipeline.min_content_chars, 20);
}

#[test]
fn configured_plans_join_builtin_registry() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(workspace.join("folio.toml"), WORKSPACE_CONFIG).unwrap();

    let config = with_env(&temp, &[], || ConfigLoader::load(&workspace)).unwrap();
    let registry = PlanRegistry::builtin()
        .with_configured(&config.plans)
        .unwrap();

    let memo = registry.lookup("memo").unwrap();
    let (independent, dependent) = memo.partition();
    assert_eq!(independent.len(), 1);
    assert_eq!(dependent[0].key, "details");
    assert_eq!(memo.structure_description(), "Summary, then Details");
    assert!(registry.lookup("project_proposal").is_ok());
}

#[test]
fn invalid_plan_fails_validation() {
    let temp = TempDir::new().unwrap();
    let config_file = temp.path().join("folio.toml");
    std::fs::write(
        &config_file,
        r#"
[plans.broken]
sections = [
    { key = "a", name = "A", order = 1 },
    { key = "b", name = "B", order = 3 },
]
"#,
    )
    .unwrap();

    let config = with_env(&temp, &[], || ConfigLoader::load_from_file(&config_file)).unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("broken"));
}

#[test]
fn inline_plans_override_plans_file() {
    let temp = TempDir::new().unwrap();
    let plans_file = temp.path().join("plans.toml");
    std::fs::write(
        &plans_file,
        r#"
[memo]
sections = [{ key = "body", name = "Body", order = 1, independent = true }]

[brief]
sections = [{ key = "points", name = "Points", order = 1, independent = true }]
"#,
    )
    .unwrap();
    let config_file = temp.path().join("folio.toml");
    std::fs::write(
        &config_file,
        format!(
            "plans_file = {:?}\n\n[plans.memo]\nsections = [{{ key = \"summary\", name = \"Summary\", order = 1 }}]\n",
            plans_file.to_string_lossy()
        ),
    )
    .unwrap();

    let config = with_env(&temp, &[], || ConfigLoader::load_from_file(&config_file)).unwrap();
    let registry = config.plan_registry().unwrap();

    assert_eq!(registry.lookup("memo").unwrap().sections()[0].key, "summary");
    assert_eq!(registry.lookup("brief").unwrap().sections()[0].key, "points");
}

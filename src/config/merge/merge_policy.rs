//! Merge rules: defaults applied beneath every other source.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("provider.provider_type", "openai")?
        .set_default("pipeline.compression_threshold_chars", 500)?
        .set_default("pipeline.truncation_chars", 300)?
        .set_default("pipeline.min_content_chars", 50)
}

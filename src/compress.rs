//! Context compression for prior sections.

use crate::backend::TextBackend;
use crate::prompt;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shrinks previously generated sections before they are embedded in a later prompt.
///
/// Short content passes through untouched. Long content is summarized by the backend;
/// if that fails, or the summary is no shorter than the input, the content is truncated
/// instead. Compression never fails.
pub struct ContextCompressor {
    backend: Arc<dyn TextBackend>,
    threshold_chars: usize,
    truncation_chars: usize,
}

impl ContextCompressor {
    pub fn new(backend: Arc<dyn TextBackend>, threshold_chars: usize, truncation_chars: usize) -> Self {
        Self {
            backend,
            threshold_chars,
            truncation_chars,
        }
    }

    pub async fn compress(&self, section_key: &str, content: &str) -> String {
        let length = content.chars().count();
        if length < self.threshold_chars {
            return content.to_string();
        }

        match self.backend.generate(&prompt::summary_prompt(section_key, content)).await {
            Ok(summary) => {
                let summary = summary.trim();
                if !summary.is_empty() && summary.chars().count() < length {
                    debug!(section = section_key, from = length, "Compressed section context");
                    return summary.to_string();
                }
                warn!(
                    section = section_key,
                    "Summary was empty or not shorter than its input; truncating"
                );
            }
            Err(e) => {
                warn!(section = section_key, error = %e, "Summarization failed; truncating");
            }
        }
        self.truncate(content)
    }

    /// Compress every entry, preserving input order
    pub async fn compress_all<'a, I>(&self, entries: I) -> Vec<(String, String)>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        join_all(entries.into_iter().map(|(key, content)| async move {
            (key.to_string(), self.compress(key, content).await)
        }))
        .await
    }

    /// Keep a prefix plus an ellipsis, never as long as the input itself
    fn truncate(&self, content: &str) -> String {
        let keep = self
            .truncation_chars
            .min(content.chars().count().saturating_sub(4));
        let mut truncated: String = content.chars().take(keep).collect();
        truncated.push_str("...");
        truncated
    }
}

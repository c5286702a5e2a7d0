//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::GenerationError;

/// Map command errors to a single message for stderr.
///
/// Known pipeline errors get a hint; anything else prints its full cause chain.
pub fn map_error(e: &anyhow::Error) -> String {
    match e.downcast_ref::<GenerationError>() {
        Some(GenerationError::UnknownDocumentType(t)) => {
            format!("Unknown document type '{}'. Run `folio plans` to see the available types.", t)
        }
        Some(GenerationError::Config(msg)) => format!("Configuration error: {}", msg),
        Some(err @ GenerationError::GenerationUnavailable { .. }) => {
            format!("{}. Check the provider settings and try again.", err)
        }
        _ => format!("Error: {:#}", e),
    }
}

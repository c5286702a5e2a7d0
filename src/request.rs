//! Caller-supplied generation request.

use crate::error::GenerationError;
use serde::{Deserialize, Serialize};

/// Page formatting the rendered document should follow.
///
/// The pipeline does not render; these values are passed to the single-prompt strategy
/// and stored with the document for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattingRequirements {
    pub line_height: f32,
    pub font_size: u32,
    pub header_size: u32,
    pub paragraph_size: u32,
    pub font_family: String,
    /// Margins in millimetres
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

impl Default for FormattingRequirements {
    fn default() -> Self {
        Self {
            line_height: 1.5,
            font_size: 12,
            header_size: 16,
            paragraph_size: 12,
            font_family: "Times New Roman".to_string(),
            margin_top: 25.4,
            margin_bottom: 25.4,
            margin_left: 31.75,
            margin_right: 25.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub title: String,
    pub document_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_instructions: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub requirements: FormattingRequirements,
}

impl GenerationRequest {
    pub fn new(
        title: impl Into<String>,
        document_type: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            document_type: document_type.into(),
            user_instructions: None,
            user_id: user_id.into(),
            requirements: FormattingRequirements::default(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.user_instructions = Some(instructions.into());
        self
    }

    pub fn with_requirements(mut self, requirements: FormattingRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    /// Instructions with surrounding whitespace removed; blank instructions count as none
    pub fn instructions(&self) -> Option<&str> {
        self.user_instructions
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.title.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("title is required".to_string()));
        }
        if self.document_type.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "document type is required".to_string(),
            ));
        }
        if self.user_id.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("user id is required".to_string()));
        }
        Ok(())
    }
}

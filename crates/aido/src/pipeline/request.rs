//! Run request submitted to the pipeline endpoint.

use serde::Serialize;

/// Identifies exactly one logical run. Immutable once submitted; a retry is
/// a new request with a fresh document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineRunRequest {
    pub doc_id: String,
    /// Inline source text, for text submissions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    /// Server-side token of an uploaded media file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_token: Option<String>,
    /// Server-side token of an uploaded template document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_token: Option<String>,
    /// Free-form generation guidance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl PipelineRunRequest {
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            text_content: None,
            file_token: None,
            template_token: None,
            instructions: None,
        }
    }

    /// True when the run transcribes uploaded media rather than inline text.
    pub fn uses_media(&self) -> bool {
        self.file_token.is_some()
    }
}

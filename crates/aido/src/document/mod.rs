//! Document model and the in-memory registry of recent documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of documents retained in the recency list.
const MAX_RECENT_DOCUMENTS: usize = 10;

/// Media kind of the submitted source, serialized as its MIME string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    #[serde(rename = "audio/mpeg")]
    Mp3,
    #[serde(rename = "video/mp4")]
    Mp4,
    #[serde(rename = "text/plain")]
    PlainText,
    #[serde(
        rename = "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    )]
    Docx,
    #[serde(rename = "application/octet-stream")]
    Unknown,
}

impl Default for MediaKind {
    fn default() -> Self {
        MediaKind::PlainText
    }
}

impl MediaKind {
    /// True for sources that go through transcription.
    pub fn is_media(&self) -> bool {
        matches!(self, MediaKind::Mp3 | MediaKind::Mp4)
    }
}

/// Lifecycle status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploading,
    Processing,
    Ready,
    Error,
}

impl DocumentStatus {
    /// True while a run for this document is still in flight.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, DocumentStatus::Uploading | DocumentStatus::Processing)
    }
}

/// A generated-manual document and its artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub kind: MediaKind,
    pub status: DocumentStatus,
    pub uploaded_at: DateTime<Utc>,
    /// Extracted or transcribed source text, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// The generated manual text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_content: Option<String>,
    /// Server-relative route of the generated DOCX artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_docx_path: Option<String>,
    /// Server-relative route of the transcript artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,
    /// Custom guidance supplied on submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            status: DocumentStatus::Uploading,
            uploaded_at: Utc::now(),
            content: None,
            manual_content: None,
            manual_docx_path: None,
            transcript_path: None,
            instructions: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == DocumentStatus::Ready
    }
}

/// In-memory registry of recent documents, newest first.
///
/// Holds at most [`MAX_RECENT_DOCUMENTS`] entries. Documents whose run is
/// still in flight are never evicted, so the list can briefly exceed the
/// cap when everything is processing at once.
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    documents: Vec<Document>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new document at the front, evicting the oldest settled
    /// document beyond the cap.
    pub fn register(&mut self, document: Document) {
        self.documents.insert(0, document);
        while self.documents.len() > MAX_RECENT_DOCUMENTS {
            match self
                .documents
                .iter()
                .rposition(|d| !d.status.is_in_flight())
            {
                Some(pos) => {
                    self.documents.remove(pos);
                }
                None => break,
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.documents.iter_mut().find(|d| d.id == id)
    }

    pub fn set_status(&mut self, id: &str, status: DocumentStatus) -> bool {
        match self.get_mut(id) {
            Some(document) => {
                document.status = status;
                true
            }
            None => false,
        }
    }

    /// Documents in recency order, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, status: DocumentStatus) -> Document {
        let mut d = Document::new(id, format!("doc {id}"), MediaKind::PlainText);
        d.status = status;
        d
    }

    #[test]
    fn test_register_puts_newest_first() {
        let mut registry = DocumentRegistry::new();
        registry.register(doc("a", DocumentStatus::Ready));
        registry.register(doc("b", DocumentStatus::Ready));

        let ids: Vec<&str> = registry.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_registry_caps_at_ten() {
        let mut registry = DocumentRegistry::new();
        for i in 0..15 {
            registry.register(doc(&format!("d{i}"), DocumentStatus::Ready));
        }

        assert_eq!(registry.len(), 10);
        // The oldest five were evicted.
        assert!(registry.get("d4").is_none());
        assert!(registry.get("d5").is_some());
        assert!(registry.get("d14").is_some());
    }

    #[test]
    fn test_in_flight_documents_survive_eviction() {
        let mut registry = DocumentRegistry::new();
        registry.register(doc("running", DocumentStatus::Processing));
        for i in 0..12 {
            registry.register(doc(&format!("d{i}"), DocumentStatus::Ready));
        }

        assert!(registry.get("running").is_some());
        assert_eq!(registry.len(), 10);
    }

    #[test]
    fn test_set_status_on_unknown_document() {
        let mut registry = DocumentRegistry::new();
        assert!(!registry.set_status("nope", DocumentStatus::Error));
    }

    #[test]
    fn test_media_kind_mime_spelling() {
        assert_eq!(
            serde_json::to_string(&MediaKind::Mp3).unwrap(),
            "\"audio/mpeg\""
        );
        let kind: MediaKind = serde_json::from_str("\"video/mp4\"").unwrap();
        assert_eq!(kind, MediaKind::Mp4);
        assert!(kind.is_media());
    }
}

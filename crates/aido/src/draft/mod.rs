//! Locally editable manual drafts.
//!
//! A draft is the user's working copy of a generated manual. Edits are
//! purely local until an explicit save; the dirty flag tracks divergence
//! from the server.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The editable copy of one document's manual.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ManualDraft {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// True while the buffer diverges from the last known server state.
    pub is_dirty: bool,
}

/// Per-document draft buffers, keyed by document id.
#[derive(Debug, Default)]
pub struct DraftStore {
    drafts: HashMap<String, ManualDraft>,
}

impl DraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, doc_id: &str) -> Option<&ManualDraft> {
        self.drafts.get(doc_id)
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.drafts.contains_key(doc_id)
    }

    /// Overwrites the draft with a local edit. Synchronous, no network
    /// effect; the draft stays dirty until a successful save.
    pub fn edit(&mut self, doc_id: &str, content: impl Into<String>) {
        self.drafts.insert(
            doc_id.to_string(),
            ManualDraft {
                content: content.into(),
                updated_at: Some(Utc::now()),
                is_dirty: true,
            },
        );
    }

    /// Installs server content, replacing any local draft. Terminal server
    /// output wins over an unsaved edit.
    pub fn seed(
        &mut self,
        doc_id: &str,
        content: impl Into<String>,
        updated_at: Option<DateTime<Utc>>,
    ) {
        self.drafts.insert(
            doc_id.to_string(),
            ManualDraft {
                content: content.into(),
                updated_at,
                is_dirty: false,
            },
        );
    }

    /// Marks the draft clean after a successful save.
    pub fn mark_saved(&mut self, doc_id: &str, at: DateTime<Utc>) {
        if let Some(draft) = self.drafts.get_mut(doc_id) {
            draft.is_dirty = false;
            draft.updated_at = Some(at);
        }
    }
}

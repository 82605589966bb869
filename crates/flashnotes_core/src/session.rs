//! crates/flashnotes_core/src/session.rs
//!
//! The document-selection state machine. Exactly one document may be active
//! at a time, and the chat transcript belongs to that selection: every
//! selection change is a hard reset of the transcript, never a merge.

use crate::domain::ChatMessage;

/// Which document, if any, the session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    NoDocument,
    DocumentActive(i64),
}

/// Binds the chat session to the active document.
///
/// Holds the ephemeral per-selection state: the message transcript, the
/// remote conversation id and whether the document's text has already been
/// pushed to the backend. None of it survives a selection change, and none
/// of it is ever persisted.
#[derive(Debug)]
pub struct SessionBinder {
    selection: Selection,
    messages: Vec<ChatMessage>,
    conversation_id: Option<String>,
    document_ingested: bool,
}

impl Default for SessionBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBinder {
    /// Starts with no document selected.
    pub fn new() -> Self {
        Self {
            selection: Selection::NoDocument,
            messages: Vec::new(),
            conversation_id: None,
            document_ingested: false,
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// The active document id, when one is selected.
    pub fn active_document(&self) -> Option<i64> {
        match self.selection {
            Selection::DocumentActive(id) => Some(id),
            Selection::NoDocument => None,
        }
    }

    /// Makes `id` the active document. The session state resets on every
    /// call, even when `id` is already active: selection is per call, never
    /// diffed against the previous one. Returns the abandoned remote
    /// conversation id, if any, so the caller can delete it server-side.
    pub fn select_document(&mut self, id: i64) -> Option<String> {
        let abandoned = self.reset_session();
        self.selection = Selection::DocumentActive(id);
        abandoned
    }

    /// Reacts to the deletion of `deleted`. When it was the active document,
    /// the selection falls back to the first remaining id, or to no document
    /// when none remain. Deleting an inactive document changes nothing.
    pub fn document_deleted(&mut self, deleted: i64, remaining: &[i64]) -> Option<String> {
        if self.selection != Selection::DocumentActive(deleted) {
            return None;
        }
        let abandoned = self.reset_session();
        self.selection = match remaining.first() {
            Some(&next) => Selection::DocumentActive(next),
            None => Selection::NoDocument,
        };
        abandoned
    }

    /// Drops the selection and all session state.
    pub fn clear_all(&mut self) -> Option<String> {
        let abandoned = self.reset_session();
        self.selection = Selection::NoDocument;
        abandoned
    }

    /// Records a message against the active document and reports whether it
    /// was kept. A message arriving while no document is selected is
    /// discarded so it can never be attributed to a later selection.
    pub fn push_message(&mut self, message: ChatMessage) -> bool {
        match self.selection {
            Selection::DocumentActive(_) => {
                self.messages.push(message);
                true
            }
            Selection::NoDocument => false,
        }
    }

    /// The transcript for the current selection, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The remote conversation id for this session, once the backend has
    /// assigned one.
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Adopts the conversation id returned by the backend. Ignored while no
    /// document is selected, since the reply then raced a selection change.
    pub fn adopt_conversation_id(&mut self, id: String) {
        if matches!(self.selection, Selection::DocumentActive(_)) {
            self.conversation_id = Some(id);
        }
    }

    /// Whether the active document's text has been pushed to the backend
    /// during this session.
    pub fn document_ingested(&self) -> bool {
        self.document_ingested
    }

    /// Marks the active document's text as pushed to the backend.
    pub fn mark_ingested(&mut self) {
        self.document_ingested = true;
    }

    fn reset_session(&mut self) -> Option<String> {
        self.messages.clear();
        self.document_ingested = false;
        self.conversation_id.take()
    }
}

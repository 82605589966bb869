//! crates/flashnotes_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The media types the upload pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Pdf,
    Pptx,
    Txt,
}

impl MediaKind {
    /// Maps a declared MIME type onto a supported kind. Anything else is
    /// filtered out before upload.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "application/pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
                Some(Self::Pptx)
            }
            "text/plain" => Some(Self::Txt),
            _ => None,
        }
    }

    /// The short form used for storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Pptx => "pptx",
            Self::Txt => "txt",
        }
    }

    /// Parses the short form produced by [`MediaKind::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pdf" => Some(Self::Pdf),
            "pptx" => Some(Self::Pptx),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    /// The canonical MIME type for this kind.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Self::Txt => "text/plain",
        }
    }
}

/// A file as handed to the upload pipeline, before any validation.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    /// The MIME type declared by whoever selected the file, not sniffed
    /// from the content.
    pub media_type: String,
    pub content: Bytes,
}

/// A fully assembled document that has not been persisted yet. The store
/// assigns `id` and `created_at` at write time, so this type carries neither.
#[derive(Debug, Clone)]
pub struct DocumentDraft {
    pub title: String,
    pub media_kind: MediaKind,
    pub raw_content: Bytes,
    pub extracted_text: String,
    pub size_bytes: u64,
}

/// A document held in the local store.
///
/// `extracted_text` may be empty when the remote extraction produced nothing;
/// such a record is valid but degraded and must not be used as chat, summary
/// or quiz context.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: i64,
    pub title: String,
    pub media_kind: MediaKind,
    pub raw_content: Bytes,
    pub extracted_text: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// The author of a chat message. `Error` entries carry user-facing failure
/// text so the transcript keeps its place in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    Error,
}

/// A single entry in the chat transcript for the active document.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub sources: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Builds a message stamped with a fresh id and the current time.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            sources: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Builds an assistant message together with its supporting sources.
    pub fn assistant(content: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            sources,
            ..Self::new(MessageRole::Assistant, content)
        }
    }
}

/// The backend's reply to one chat query.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub answer: String,
    pub sources: Vec<String>,
    pub conversation_id: Option<String>,
}

/// A document payload for the backend's retrieval index.
#[derive(Debug, Clone, Default)]
pub struct IngestDocument {
    pub content: String,
    pub metadata: HashMap<String, String>,
}

/// A multiple-choice question produced by the quiz endpoint.
#[derive(Debug, Clone)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_option: String,
}

/// A snapshot of upload progress. The default value is the idle state the
/// pipeline returns to after every batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadProgress {
    pub percent: u8,
    pub current_file: Option<String>,
}

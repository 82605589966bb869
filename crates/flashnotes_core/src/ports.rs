//! crates/flashnotes_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;

use crate::domain::{
    ChatReply, DocumentDraft, DocumentRecord, IngestDocument, QuizQuestion, RawFile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
///
/// The three variants are surfaced differently: validation failures are shown
/// to the user verbatim and never reach the network, remote failures pair a
/// user-facing message with a logged diagnostic detail, and persistence
/// failures signal that local data may not have been saved.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The input was rejected before any side effect took place.
    #[error("Validation error: {0}")]
    Validation(String),
    /// A remote service call failed or returned a malformed body.
    #[error("Remote service error: {message}: {detail}")]
    RemoteService { message: String, detail: String },
    /// The local document store failed.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl PortError {
    /// Builds a `RemoteService` error from a user-facing message and a
    /// diagnostic detail that is logged but never displayed.
    pub fn remote(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::RemoteService {
            message: message.into(),
            detail: detail.into(),
        }
    }

    /// The text safe to show a user, without internal diagnostics.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::RemoteService { message, .. } => message.clone(),
            Self::Persistence(_) => {
                "A local storage error occurred. Your documents may not have been saved."
                    .to_string()
            }
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable local persistence for document records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persists drafts strictly in input order, committing each record before
    /// the next insert begins, and returns the store-assigned ids positionally
    /// aligned with the input. The batch is not atomic: when draft `k` fails,
    /// drafts `0..k` stay persisted and the error is returned.
    async fn add_many(&self, drafts: Vec<DocumentDraft>) -> PortResult<Vec<i64>>;

    /// Every stored record. Order is unspecified.
    async fn get_all(&self) -> PortResult<Vec<DocumentRecord>>;

    async fn get_by_id(&self, id: i64) -> PortResult<Option<DocumentRecord>>;

    /// Removes at most one record. Deleting a missing id is a no-op.
    async fn delete_by_id(&self, id: i64) -> PortResult<()>;

    /// Removes every record in one statement.
    async fn clear(&self) -> PortResult<()>;
}

/// Remote extraction of plain text from an uploaded file.
#[async_trait]
pub trait TextExtractionService: Send + Sync {
    async fn extract_text(&self, file: &RawFile) -> PortResult<String>;
}

/// Pushes document text into the backend's retrieval index.
#[async_trait]
pub trait DocumentIngestService: Send + Sync {
    async fn add_document(&self, document: IngestDocument) -> PortResult<()>;

    /// Indexes a batch of documents in one call.
    async fn add_documents(&self, documents: Vec<IngestDocument>) -> PortResult<()>;
}

/// The conversational question-answering side of the backend.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Sends one query, optionally continuing an existing conversation.
    async fn chat(&self, query: &str, conversation_id: Option<&str>) -> PortResult<ChatReply>;

    /// Deletes a server-side conversation and its memory.
    async fn delete_conversation(&self, conversation_id: &str) -> PortResult<()>;
}

/// Summary and quiz generation over document text.
#[async_trait]
pub trait StudyToolsService: Send + Sync {
    async fn summarize(&self, content: &str) -> PortResult<String>;

    async fn generate_quiz(&self, content: &str) -> PortResult<Vec<QuizQuestion>>;
}

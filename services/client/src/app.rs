//! services/client/src/app.rs
//!
//! The application layer: the shared `AppState` injection struct and the
//! session flows that drive chat, summary and quiz against the active
//! document. All document selection goes through the `SessionBinder`, so a
//! selection change is always a hard reset of the conversation.

use crate::config::Config;
use crate::upload::UploadPipeline;
use flashnotes_core::domain::{ChatMessage, DocumentRecord, IngestDocument, MessageRole, QuizQuestion};
use flashnotes_core::ports::{
    ChatService, DocumentIngestService, DocumentStore, PortError, PortResult, StudyToolsService,
    TextExtractionService,
};
use flashnotes_core::session::SessionBinder;
use std::sync::Arc;
use tracing::{info, warn};

//=========================================================================================
// AppState (Shared Across All Flows)
//=========================================================================================

/// The shared application state, created once at startup and passed to all flows.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub extractor: Arc<dyn TextExtractionService>,
    pub ingest: Arc<dyn DocumentIngestService>,
    pub chat: Arc<dyn ChatService>,
    pub study: Arc<dyn StudyToolsService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds an upload pipeline over this state's store and extractor.
    pub fn upload_pipeline(&self) -> UploadPipeline {
        UploadPipeline::new(
            self.store.clone(),
            self.extractor.clone(),
            self.config.max_file_size_bytes,
        )
    }
}

//=========================================================================================
// AppSession (One Selection + Its Flows)
//=========================================================================================

/// Drives the chat, summary and quiz flows for the active document.
///
/// Wraps a `SessionBinder` and adds the side effects the pure state machine
/// leaves to its caller: looking records up in the store, pushing document
/// text to the backend's index once per session, and deleting abandoned
/// remote conversations best-effort.
pub struct AppSession {
    state: Arc<AppState>,
    binder: SessionBinder,
}

impl AppSession {
    /// Starts with no document selected.
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            binder: SessionBinder::new(),
        }
    }

    /// The transcript for the current selection, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        self.binder.messages()
    }

    /// The active document id, when one is selected.
    pub fn active_document(&self) -> Option<i64> {
        self.binder.active_document()
    }

    /// Makes `id` the active document, resetting the session even when `id`
    /// is already active. Fails with a validation error when no such record
    /// is stored; the previous selection is untouched in that case.
    pub async fn select_document(&mut self, id: i64) -> PortResult<DocumentRecord> {
        let record = self
            .state
            .store
            .get_by_id(id)
            .await?
            .ok_or_else(|| PortError::Validation(format!("No document with id {id}")))?;

        let abandoned = self.binder.select_document(id);
        self.discard_conversation(abandoned).await;
        info!(document = id, title = %record.title, "document selected");
        Ok(record)
    }

    /// Deletes `id` from the store and re-resolves the selection: when the
    /// active document was deleted, the first remaining record (lowest id)
    /// becomes active, or the session drops to no selection. Returns the new
    /// active document id, if any.
    pub async fn delete_document(&mut self, id: i64) -> PortResult<Option<i64>> {
        self.state.store.delete_by_id(id).await?;

        // Non-atomic with the delete above: revalidate by reading the store
        // back rather than assuming what remains.
        let mut remaining: Vec<i64> = self
            .state
            .store
            .get_all()
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect();
        remaining.sort_unstable();

        let abandoned = self.binder.document_deleted(id, &remaining);
        self.discard_conversation(abandoned).await;
        Ok(self.binder.active_document())
    }

    /// Removes every stored document and drops the selection.
    pub async fn clear_documents(&mut self) -> PortResult<()> {
        self.state.store.clear().await?;
        let abandoned = self.binder.clear_all();
        self.discard_conversation(abandoned).await;
        Ok(())
    }

    /// Ends the session without touching the store.
    pub async fn close(&mut self) {
        let abandoned = self.binder.clear_all();
        self.discard_conversation(abandoned).await;
    }

    /// Sends one chat query against the active document.
    ///
    /// The user message enters the transcript before the remote call; the
    /// reply is recorded as an assistant message, and a failure is recorded
    /// as an `Error`-role message carrying the user-facing text so the
    /// transcript keeps its place in the conversation.
    pub async fn ask(&mut self, query: &str) -> PortResult<ChatMessage> {
        let record = self.active_record().await?;
        let content = require_extracted_text(&record)?;
        self.ingest_once(&record, content).await?;

        self.binder
            .push_message(ChatMessage::new(MessageRole::User, query));

        let conversation_id = self.binder.conversation_id().map(str::to_string);
        let chat = self.state.chat.clone();
        match chat.chat(query, conversation_id.as_deref()).await {
            Ok(reply) => {
                if let Some(id) = reply.conversation_id {
                    self.binder.adopt_conversation_id(id);
                }
                let message = ChatMessage::assistant(reply.answer, reply.sources);
                self.binder.push_message(message.clone());
                Ok(message)
            }
            Err(e) => {
                self.binder
                    .push_message(ChatMessage::new(MessageRole::Error, e.user_message()));
                Err(e)
            }
        }
    }

    /// Generates a summary of the active document's text.
    pub async fn summarize(&mut self) -> PortResult<String> {
        let record = self.active_record().await?;
        let content = require_extracted_text(&record)?;
        self.ingest_once(&record, content).await?;
        self.state.study.summarize(content).await
    }

    /// Generates a quiz over the active document's text.
    pub async fn quiz(&mut self) -> PortResult<Vec<QuizQuestion>> {
        let record = self.active_record().await?;
        let content = require_extracted_text(&record)?;
        self.state.study.generate_quiz(content).await
    }

    async fn active_record(&self) -> PortResult<DocumentRecord> {
        let id = self
            .binder
            .active_document()
            .ok_or_else(|| PortError::Validation("No document selected".to_string()))?;
        self.state.store.get_by_id(id).await?.ok_or_else(|| {
            PortError::Validation(format!("The selected document {id} no longer exists"))
        })
    }

    /// Pushes the document's text into the backend's retrieval index, at most
    /// once per session. A later `ask` in the same session skips the call.
    async fn ingest_once(&mut self, record: &DocumentRecord, content: &str) -> PortResult<()> {
        if self.binder.document_ingested() {
            return Ok(());
        }
        let mut document = IngestDocument {
            content: content.to_string(),
            ..IngestDocument::default()
        };
        document
            .metadata
            .insert("source".to_string(), record.title.clone());
        self.state.ingest.add_document(document).await?;
        self.binder.mark_ingested();
        info!(document = record.id, "document text indexed for retrieval");
        Ok(())
    }

    /// Deletes an abandoned remote conversation. Failures are logged, never
    /// surfaced: the local reset has already happened and must stand.
    async fn discard_conversation(&self, abandoned: Option<String>) {
        let Some(id) = abandoned else { return };
        if let Err(e) = self.state.chat.delete_conversation(&id).await {
            warn!(conversation = %id, error = %e, "failed to delete abandoned conversation");
        }
    }
}

/// Degraded records (empty extracted text) must never become chat, summary
/// or quiz context: the remote service would fail untraceably on an empty
/// query context.
fn require_extracted_text(record: &DocumentRecord) -> PortResult<&str> {
    if record.extracted_text.trim().is_empty() {
        return Err(PortError::Validation(format!(
            "'{}' has no extracted text and cannot be used for chat, summary or quiz",
            record.title
        )));
    }
    Ok(&record.extracted_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::SqliteDocumentStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use flashnotes_core::domain::{ChatReply, DocumentDraft, MediaKind, RawFile};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        ingested: Mutex<Vec<IngestDocument>>,
        chat_queries: Mutex<Vec<String>>,
        deleted_conversations: Mutex<Vec<String>>,
        fail_chat: bool,
    }

    #[async_trait]
    impl DocumentIngestService for FakeBackend {
        async fn add_document(&self, document: IngestDocument) -> PortResult<()> {
            self.ingested.lock().unwrap().push(document);
            Ok(())
        }

        async fn add_documents(&self, documents: Vec<IngestDocument>) -> PortResult<()> {
            self.ingested.lock().unwrap().extend(documents);
            Ok(())
        }
    }

    #[async_trait]
    impl ChatService for FakeBackend {
        async fn chat(
            &self,
            query: &str,
            _conversation_id: Option<&str>,
        ) -> PortResult<ChatReply> {
            self.chat_queries.lock().unwrap().push(query.to_string());
            if self.fail_chat {
                return Err(PortError::remote(
                    "Failed to get chat response",
                    "injected failure",
                ));
            }
            Ok(ChatReply {
                answer: format!("answer to {query}"),
                sources: vec!["page 1".to_string()],
                conversation_id: Some("conv-1".to_string()),
            })
        }

        async fn delete_conversation(&self, conversation_id: &str) -> PortResult<()> {
            self.deleted_conversations
                .lock()
                .unwrap()
                .push(conversation_id.to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl StudyToolsService for FakeBackend {
        async fn summarize(&self, content: &str) -> PortResult<String> {
            Ok(format!("summary of {} bytes", content.len()))
        }

        async fn generate_quiz(&self, _content: &str) -> PortResult<Vec<QuizQuestion>> {
            Ok(vec![QuizQuestion {
                question: "What splits an image?".to_string(),
                options: vec!["Thresholding".to_string(), "Blurring".to_string()],
                correct_option: "Thresholding".to_string(),
            }])
        }
    }

    #[async_trait]
    impl TextExtractionService for FakeBackend {
        async fn extract_text(&self, file: &RawFile) -> PortResult<String> {
            Ok(format!("text of {}", file.name))
        }
    }

    fn draft(title: &str, extracted_text: &str) -> DocumentDraft {
        DocumentDraft {
            title: title.to_string(),
            media_kind: MediaKind::Txt,
            raw_content: Bytes::from_static(b"raw"),
            extracted_text: extracted_text.to_string(),
            size_bytes: 3,
        }
    }

    async fn session_with(drafts: Vec<DocumentDraft>) -> (AppSession, Arc<FakeBackend>, Vec<i64>) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        let store = SqliteDocumentStore::new(pool);
        store.run_migrations().await.expect("migrations");
        let ids = store.add_many(drafts).await.expect("seed records");

        let backend = Arc::new(FakeBackend::default());
        let state = Arc::new(AppState {
            store: Arc::new(store),
            extractor: backend.clone(),
            ingest: backend.clone(),
            chat: backend.clone(),
            study: backend.clone(),
            config: Arc::new(Config::default_for_tests()),
        });
        (AppSession::new(state), backend, ids)
    }

    #[tokio::test]
    async fn selecting_a_missing_document_keeps_the_previous_selection() {
        let (mut session, _, ids) = session_with(vec![draft("a.txt", "text")]).await;
        session.select_document(ids[0]).await.unwrap();

        let result = session.select_document(ids[0] + 100).await;

        assert!(matches!(result, Err(PortError::Validation(_))));
        assert_eq!(session.active_document(), Some(ids[0]));
    }

    #[tokio::test]
    async fn ask_records_user_and_assistant_messages() {
        let (mut session, backend, ids) = session_with(vec![draft("a.txt", "text")]).await;
        session.select_document(ids[0]).await.unwrap();

        let reply = session.ask("what is this about?").await.unwrap();

        assert_eq!(reply.role, MessageRole::Assistant);
        assert_eq!(reply.sources, vec!["page 1".to_string()]);
        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(
            backend.chat_queries.lock().unwrap().as_slice(),
            ["what is this about?"]
        );
    }

    #[tokio::test]
    async fn the_document_is_ingested_once_per_session() {
        let (mut session, backend, ids) = session_with(vec![draft("a.txt", "text")]).await;
        session.select_document(ids[0]).await.unwrap();

        session.ask("first").await.unwrap();
        session.ask("second").await.unwrap();

        let ingested = backend.ingested.lock().unwrap();
        assert_eq!(ingested.len(), 1);
        assert_eq!(
            ingested[0].metadata.get("source").map(String::as_str),
            Some("a.txt")
        );
    }

    #[tokio::test]
    async fn reselecting_ingests_again_and_deletes_the_old_conversation() {
        let (mut session, backend, ids) =
            session_with(vec![draft("a.txt", "text"), draft("b.txt", "text")]).await;
        session.select_document(ids[0]).await.unwrap();
        session.ask("hello").await.unwrap();

        session.select_document(ids[1]).await.unwrap();
        session.ask("hello again").await.unwrap();

        assert_eq!(backend.ingested.lock().unwrap().len(), 2);
        assert_eq!(
            backend.deleted_conversations.lock().unwrap().as_slice(),
            ["conv-1"]
        );
        // The transcript restarted with the new selection.
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test]
    async fn a_chat_failure_is_recorded_as_an_error_message() {
        let (mut session, _, ids) = session_with(vec![draft("a.txt", "text")]).await;
        session.state = Arc::new(AppState {
            chat: Arc::new(FakeBackend {
                fail_chat: true,
                ..FakeBackend::default()
            }),
            ..(*session.state).clone()
        });
        session.select_document(ids[0]).await.unwrap();

        let result = session.ask("doomed").await;

        assert!(matches!(result, Err(PortError::RemoteService { .. })));
        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Error);
        assert_eq!(messages[1].content, "Failed to get chat response");
    }

    #[tokio::test]
    async fn degraded_records_are_rejected_before_any_remote_call() {
        let (mut session, backend, ids) = session_with(vec![draft("scan.pdf", "  \n")]).await;
        session.select_document(ids[0]).await.unwrap();

        assert!(matches!(
            session.ask("anything").await,
            Err(PortError::Validation(_))
        ));
        assert!(matches!(
            session.summarize().await,
            Err(PortError::Validation(_))
        ));
        assert!(matches!(
            session.quiz().await,
            Err(PortError::Validation(_))
        ));
        assert!(session.messages().is_empty());
        assert!(backend.chat_queries.lock().unwrap().is_empty());
        assert!(backend.ingested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn asking_without_a_selection_is_a_validation_error() {
        let (mut session, _, _) = session_with(vec![draft("a.txt", "text")]).await;

        let result = session.ask("hello").await;

        assert!(matches!(result, Err(PortError::Validation(_))));
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn deleting_the_active_document_falls_back_to_the_lowest_remaining_id() {
        let (mut session, _, ids) =
            session_with(vec![draft("a.txt", "text"), draft("b.txt", "text")]).await;
        session.select_document(ids[1]).await.unwrap();

        let next = session.delete_document(ids[1]).await.unwrap();

        assert_eq!(next, Some(ids[0]));
        assert_eq!(session.active_document(), Some(ids[0]));
    }

    #[tokio::test]
    async fn deleting_the_last_document_leaves_no_selection() {
        let (mut session, _, ids) = session_with(vec![draft("a.txt", "text")]).await;
        session.select_document(ids[0]).await.unwrap();

        let next = session.delete_document(ids[0]).await.unwrap();

        assert_eq!(next, None);
        assert_eq!(session.active_document(), None);
    }

    #[tokio::test]
    async fn clear_documents_empties_the_store_and_the_session() {
        let (mut session, backend, ids) =
            session_with(vec![draft("a.txt", "text"), draft("b.txt", "text")]).await;
        session.select_document(ids[0]).await.unwrap();
        session.ask("hello").await.unwrap();

        session.clear_documents().await.unwrap();

        assert_eq!(session.active_document(), None);
        assert!(session.messages().is_empty());
        assert!(session.state.store.get_all().await.unwrap().is_empty());
        assert_eq!(
            backend.deleted_conversations.lock().unwrap().as_slice(),
            ["conv-1"]
        );
    }
}

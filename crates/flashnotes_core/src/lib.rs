pub mod domain;
pub mod ports;
pub mod session;

pub use domain::{
    ChatMessage, ChatReply, DocumentDraft, DocumentRecord, IngestDocument, MediaKind, MessageRole,
    QuizQuestion, RawFile, UploadProgress,
};
pub use ports::{
    ChatService, DocumentIngestService, DocumentStore, PortError, PortResult, StudyToolsService,
    TextExtractionService,
};
pub use session::{Selection, SessionBinder};

//! services/client/src/adapters/remote.rs
//!
//! This module contains the HTTP adapter for the FlashNotes backend. One
//! reqwest client implements every remote port from the `core` crate: text
//! extraction, document ingestion, chat and the summary/quiz tools.

use async_trait::async_trait;
use flashnotes_core::domain::{ChatReply, IngestDocument, QuizQuestion, RawFile};
use flashnotes_core::ports::{
    ChatService, DocumentIngestService, PortError, PortResult, StudyToolsService,
    TextExtractionService,
};
use regex::Regex;
use reqwest::{multipart, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Chat models occasionally leak their prompt-format control tokens into the
/// answer text. They are stripped before the answer reaches the transcript.
const CONTROL_TOKEN_PATTERN: &str = r"<\|im_start\|>assistant\s*|<\|im_end\|>";

/// Fallback `source` metadata when the caller did not name the document.
const DEFAULT_SOURCE: &str = "document.txt";

const EXTRACT_FAILED: &str = "Failed to extract text from file";
const ADD_DOCUMENT_FAILED: &str = "Failed to add document to vector store";
const CHAT_FAILED: &str = "Failed to get chat response";
const DELETE_CONVERSATION_FAILED: &str = "Failed to delete conversation";
const SUMMARIZE_FAILED: &str = "Failed to generate summary. Please try again.";
const QUIZ_FAILED: &str = "Failed to generate quiz. Please try again.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An HTTP adapter for the FlashNotes backend.
#[derive(Clone)]
pub struct HttpBackendClient {
    client: reqwest::Client,
    base_url: String,
    control_tokens: Regex,
}

impl HttpBackendClient {
    /// Creates a new `HttpBackendClient` against `base_url`.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            control_tokens: Regex::new(CONTROL_TOKEN_PATTERN).expect("control token pattern compiles"),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn clean_answer(&self, raw: &str) -> String {
        self.control_tokens.replace_all(raw, "").trim().to_string()
    }

    /// Maps a non-success response onto a `RemoteService` error, keeping the
    /// status and body as diagnostic detail.
    async fn error_for(message: &str, response: reqwest::Response) -> PortError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        PortError::remote(message, format!("status {status}: {body}"))
    }
}

//=========================================================================================
// Wire DTOs
//=========================================================================================

#[derive(Deserialize)]
struct ExtractTextResponse {
    text: String,
}

#[derive(Serialize)]
struct DocumentInput<'a> {
    content: &'a str,
    metadata: &'a HashMap<String, String>,
}

#[derive(Serialize)]
struct MultipleDocumentInput<'a> {
    documents: Vec<DocumentInput<'a>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatResponse {
    answer: String,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Serialize)]
struct ContentRequest<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct SummarizeResponse {
    summary: String,
}

#[derive(Deserialize)]
struct QuizResponse {
    quiz: Vec<QuizQuestionDto>,
}

#[derive(Deserialize)]
struct QuizQuestionDto {
    question: String,
    options: Vec<String>,
    correct_option: String,
}

impl QuizQuestionDto {
    fn to_domain(self) -> QuizQuestion {
        QuizQuestion {
            question: self.question,
            options: self.options,
            correct_option: self.correct_option,
        }
    }
}

/// Rejects empty content and fills in the `source` metadata when the caller
/// did not provide one.
fn prepare_ingest(mut document: IngestDocument) -> PortResult<IngestDocument> {
    if document.content.trim().is_empty() {
        return Err(PortError::Validation(
            "Document content must not be empty".to_string(),
        ));
    }
    document
        .metadata
        .entry("source".to_string())
        .or_insert_with(|| DEFAULT_SOURCE.to_string());
    Ok(document)
}

//=========================================================================================
// `TextExtractionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextExtractionService for HttpBackendClient {
    async fn extract_text(&self, file: &RawFile) -> PortResult<String> {
        let part = multipart::Part::bytes(file.content.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.media_type)
            .map_err(|e| {
                PortError::Validation(format!(
                    "'{}' declares an invalid media type '{}': {}",
                    file.name, file.media_type, e
                ))
            })?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("/extract-text/"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PortError::remote(EXTRACT_FAILED, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = match status {
                StatusCode::NOT_FOUND => "File not found or could not be processed",
                StatusCode::BAD_REQUEST => "Invalid file format or content",
                _ => EXTRACT_FAILED,
            };
            return Err(Self::error_for(message, response).await);
        }

        let body: ExtractTextResponse = response
            .json()
            .await
            .map_err(|e| PortError::remote(EXTRACT_FAILED, e.to_string()))?;
        Ok(body.text)
    }
}

//=========================================================================================
// `DocumentIngestService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentIngestService for HttpBackendClient {
    async fn add_document(&self, document: IngestDocument) -> PortResult<()> {
        let document = prepare_ingest(document)?;

        let response = self
            .client
            .post(self.url("/add_document"))
            .json(&DocumentInput {
                content: &document.content,
                metadata: &document.metadata,
            })
            .send()
            .await
            .map_err(|e| PortError::remote(ADD_DOCUMENT_FAILED, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_for(ADD_DOCUMENT_FAILED, response).await);
        }
        Ok(())
    }

    async fn add_documents(&self, documents: Vec<IngestDocument>) -> PortResult<()> {
        let documents = documents
            .into_iter()
            .map(prepare_ingest)
            .collect::<PortResult<Vec<_>>>()?;

        let payload = MultipleDocumentInput {
            documents: documents
                .iter()
                .map(|document| DocumentInput {
                    content: &document.content,
                    metadata: &document.metadata,
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.url("/add_documents"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::remote(ADD_DOCUMENT_FAILED, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_for(ADD_DOCUMENT_FAILED, response).await);
        }
        Ok(())
    }
}

//=========================================================================================
// `ChatService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatService for HttpBackendClient {
    async fn chat(&self, query: &str, conversation_id: Option<&str>) -> PortResult<ChatReply> {
        if query.trim().is_empty() {
            return Err(PortError::Validation(
                "Query must not be empty".to_string(),
            ));
        }

        let response = self
            .client
            .post(self.url("/chat"))
            .json(&ChatRequest {
                query,
                conversation_id,
            })
            .send()
            .await
            .map_err(|e| PortError::remote(CHAT_FAILED, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_for(CHAT_FAILED, response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| PortError::remote(CHAT_FAILED, e.to_string()))?;

        Ok(ChatReply {
            answer: self.clean_answer(&body.answer),
            sources: body.sources,
            conversation_id: body.conversation_id,
        })
    }

    async fn delete_conversation(&self, conversation_id: &str) -> PortResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/conversations/{conversation_id}")))
            .send()
            .await
            .map_err(|e| PortError::remote(DELETE_CONVERSATION_FAILED, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_for(DELETE_CONVERSATION_FAILED, response).await);
        }
        Ok(())
    }
}

//=========================================================================================
// `StudyToolsService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StudyToolsService for HttpBackendClient {
    async fn summarize(&self, content: &str) -> PortResult<String> {
        if content.trim().is_empty() {
            return Err(PortError::Validation(
                "Document content must not be empty".to_string(),
            ));
        }

        let response = self
            .client
            .post(self.url("/summarize"))
            .json(&ContentRequest { content })
            .send()
            .await
            .map_err(|e| PortError::remote(SUMMARIZE_FAILED, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_for(SUMMARIZE_FAILED, response).await);
        }

        let body: SummarizeResponse = response
            .json()
            .await
            .map_err(|e| PortError::remote(SUMMARIZE_FAILED, e.to_string()))?;
        Ok(body.summary)
    }

    async fn generate_quiz(&self, content: &str) -> PortResult<Vec<QuizQuestion>> {
        if content.trim().is_empty() {
            return Err(PortError::Validation(
                "Document content must not be empty".to_string(),
            ));
        }

        let response = self
            .client
            .post(self.url("/generate_quiz"))
            .json(&ContentRequest { content })
            .send()
            .await
            .map_err(|e| PortError::remote(QUIZ_FAILED, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_for(QUIZ_FAILED, response).await);
        }

        let body: QuizResponse = response
            .json()
            .await
            .map_err(|e| PortError::remote(QUIZ_FAILED, e.to_string()))?;
        Ok(body.quiz.into_iter().map(|dto| dto.to_domain()).collect())
    }
}

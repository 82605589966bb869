//! services/client/src/upload.rs
//!
//! The upload pipeline: validates a batch of selected files, extracts their
//! text through the remote service and commits the resulting records to the
//! local store. Progress is published on a watch channel so a frontend can
//! render a percentage and the in-flight filename.

use flashnotes_core::domain::{DocumentDraft, DocumentRecord, MediaKind, RawFile, UploadProgress};
use flashnotes_core::ports::{DocumentStore, PortError, PortResult, TextExtractionService};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

//=========================================================================================
// The Pipeline Struct
//=========================================================================================

/// Turns a batch of raw files into committed document records.
pub struct UploadPipeline {
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn TextExtractionService>,
    max_file_size_bytes: u64,
    progress: watch::Sender<UploadProgress>,
}

/// Returns progress to the idle state when the pipeline exits, on every path.
struct ProgressResetGuard<'a> {
    progress: &'a watch::Sender<UploadProgress>,
}

impl Drop for ProgressResetGuard<'_> {
    fn drop(&mut self) {
        self.progress.send_replace(UploadProgress::default());
    }
}

impl UploadPipeline {
    /// Creates a new `UploadPipeline`.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        extractor: Arc<dyn TextExtractionService>,
        max_file_size_bytes: u64,
    ) -> Self {
        let (progress, _) = watch::channel(UploadProgress::default());
        Self {
            store,
            extractor,
            max_file_size_bytes,
            progress,
        }
    }

    /// Subscribes to progress updates for batches run through this pipeline.
    pub fn subscribe_progress(&self) -> watch::Receiver<UploadProgress> {
        self.progress.subscribe()
    }

    /// Runs the full pipeline for one batch.
    ///
    /// All validation happens before the first network call. Extraction is
    /// strictly sequential in input order and fail-fast, and nothing is
    /// committed unless every file extracted successfully. A commit failure
    /// mid-batch can still leave earlier records in the store (the store's
    /// documented partial-failure policy); the pipeline then reports the
    /// single error and returns no records.
    pub async fn upload(&self, files: Vec<RawFile>) -> PortResult<Vec<DocumentRecord>> {
        let _guard = ProgressResetGuard {
            progress: &self.progress,
        };

        // 1. Keep only supported media types.
        let accepted: Vec<(RawFile, MediaKind)> = files
            .into_iter()
            .filter_map(|file| MediaKind::from_mime(&file.media_type).map(|kind| (file, kind)))
            .collect();
        if accepted.is_empty() {
            return Err(PortError::Validation(
                "No supported files selected. Supported formats: PDF, PPTX, TXT".to_string(),
            ));
        }

        // 2. Validate the whole batch before any remote call.
        self.validate_batch(&accepted).await?;

        // 3. Extract text sequentially, publishing the filename before each
        //    file starts so observers always see what is in flight.
        let total = accepted.len();
        let mut drafts = Vec::with_capacity(total);
        for (completed, (file, kind)) in accepted.into_iter().enumerate() {
            self.publish(completed, total, Some(file.name.clone()));
            info!(file = %file.name, "extracting text");
            let extracted_text = self.extractor.extract_text(&file).await?;
            if extracted_text.trim().is_empty() {
                warn!(file = %file.name, "extraction produced no text; the record will be degraded");
            }

            // 4. Assemble the draft for this file.
            drafts.push(DocumentDraft {
                title: file.name,
                media_kind: kind,
                size_bytes: file.content.len() as u64,
                raw_content: file.content,
                extracted_text,
            });
        }
        self.publish(total, total, None);

        // 5. Commit the batch and merge the assigned ids positionally by
        //    reading back what the store persisted.
        let ids = self.store.add_many(drafts).await?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let record = self.store.get_by_id(id).await?.ok_or_else(|| {
                PortError::Persistence(format!("Document {id} missing right after commit"))
            })?;
            records.push(record);
        }

        info!(count = records.len(), "upload batch committed");
        Ok(records)
    }

    /// Rejects the batch when any file is oversized or any title collides
    /// with a stored record or another file in the same batch.
    async fn validate_batch(&self, accepted: &[(RawFile, MediaKind)]) -> PortResult<()> {
        let stored_titles: HashSet<String> = self
            .store
            .get_all()
            .await?
            .into_iter()
            .map(|record| record.title)
            .collect();

        let mut batch_titles = HashSet::new();
        for (file, _) in accepted {
            if file.content.len() as u64 > self.max_file_size_bytes {
                return Err(PortError::Validation(format!(
                    "'{}' exceeds the maximum file size of {} bytes",
                    file.name, self.max_file_size_bytes
                )));
            }
            if stored_titles.contains(&file.name) {
                return Err(PortError::Validation(format!(
                    "A document named '{}' already exists",
                    file.name
                )));
            }
            if !batch_titles.insert(file.name.clone()) {
                return Err(PortError::Validation(format!(
                    "'{}' appears more than once in the selection",
                    file.name
                )));
            }
        }
        Ok(())
    }

    fn publish(&self, completed: usize, total: usize, current_file: Option<String>) {
        let percent = ((completed as f64 / total as f64) * 100.0).round() as u8;
        self.progress.send_replace(UploadProgress {
            percent,
            current_file,
        });
    }
}

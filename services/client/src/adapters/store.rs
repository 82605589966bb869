//! services/client/src/adapters/store.rs
//!
//! This module contains the SQLite adapter, which is the concrete implementation
//! of the `DocumentStore` port from the `core` crate. All local persistence goes
//! through the single `documents` table defined here.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDateTime, TimeZone, Utc};
use flashnotes_core::domain::{DocumentDraft, DocumentRecord, MediaKind};
use flashnotes_core::ports::{DocumentStore, PortError, PortResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, Row, SqlitePool};
use std::path::Path;

/// Latest schema for the documents table. `AUTOINCREMENT` keeps ids strictly
/// increasing, so a deleted document's id is never handed to a later upload.
const CREATE_DOCUMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    media_kind TEXT NOT NULL CHECK (media_kind IN ('pdf', 'pptx', 'txt')),
    raw_content BLOB NOT NULL,
    extracted_text TEXT NOT NULL,
    size_bytes INTEGER NOT NULL CHECK (size_bytes >= 0),
    created_at DATETIME NOT NULL
);
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, title, media_kind, raw_content, extracted_text, size_bytes, created_at FROM documents";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A SQLite-backed adapter that implements the `DocumentStore` port.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Opens the database at `path`, creating the file and the schema when
    /// they do not exist yet. Reopening an existing database is a no-op
    /// migration and leaves its rows intact.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Builds a store over an existing pool. `open` is the usual entry point;
    /// this constructor leaves migrations to the caller.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup. Idempotent.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(CREATE_DOCUMENTS).execute(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRow {
    id: i64,
    title: String,
    media_kind: String,
    raw_content: Vec<u8>,
    extracted_text: String,
    size_bytes: i64,
    created_at: NaiveDateTime,
}

impl DocumentRow {
    fn to_domain(self) -> PortResult<DocumentRecord> {
        let media_kind = MediaKind::parse(&self.media_kind).ok_or_else(|| {
            PortError::Persistence(format!(
                "Row {} holds unknown media kind '{}'",
                self.id, self.media_kind
            ))
        })?;
        Ok(DocumentRecord {
            id: self.id,
            title: self.title,
            media_kind,
            raw_content: Bytes::from(self.raw_content),
            extracted_text: self.extracted_text,
            size_bytes: self.size_bytes as u64,
            created_at: Utc.from_utc_datetime(&self.created_at),
        })
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn add_many(&self, drafts: Vec<DocumentDraft>) -> PortResult<Vec<i64>> {
        let mut ids = Vec::with_capacity(drafts.len());
        // Strictly sequential: each record commits before the next insert
        // starts, so a failure at draft k leaves drafts 0..k persisted.
        for draft in drafts {
            let row = sqlx::query(
                r#"
                INSERT INTO documents (title, media_kind, raw_content, extracted_text, size_bytes, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(&draft.title)
            .bind(draft.media_kind.as_str())
            .bind(&draft.raw_content[..])
            .bind(&draft.extracted_text)
            .bind(draft.size_bytes as i64)
            .bind(Utc::now().naive_utc())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

            let id: i64 = row.get("id");
            ids.push(id);
        }
        Ok(ids)
    }

    async fn get_all(&self) -> PortResult<Vec<DocumentRecord>> {
        let rows = sqlx::query_as::<_, DocumentRow>(SELECT_COLUMNS)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        rows.into_iter().map(|row| row.to_domain()).collect()
    }

    async fn get_by_id(&self, id: i64) -> PortResult<Option<DocumentRecord>> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        row.map(|row| row.to_domain()).transpose()
    }

    async fn delete_by_id(&self, id: i64) -> PortResult<()> {
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self) -> PortResult<()> {
        sqlx::query("DELETE FROM documents")
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A pooled `:memory:` database hands every connection its own empty
    /// database, so tests pin the pool to a single connection.
    async fn memory_store() -> SqliteDocumentStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        let store = SqliteDocumentStore::new(pool);
        store.run_migrations().await.expect("migrations");
        store
    }

    fn draft(title: &str) -> DocumentDraft {
        DocumentDraft {
            title: title.to_string(),
            media_kind: MediaKind::Txt,
            raw_content: Bytes::from_static(b"raw bytes"),
            extracted_text: "extracted text".to_string(),
            size_bytes: 9,
        }
    }

    #[tokio::test]
    async fn add_many_assigns_increasing_ids_in_input_order() {
        let store = memory_store().await;

        let ids = store
            .add_many(vec![draft("a.txt"), draft("b.txt"), draft("c.txt")])
            .await
            .unwrap();

        assert_eq!(ids.len(), 3);
        assert!(ids[0] < ids[1] && ids[1] < ids[2]);
        assert_eq!(store.get_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn round_trip_preserves_every_field() {
        let store = memory_store().await;
        let input = DocumentDraft {
            title: "slides.pptx".to_string(),
            media_kind: MediaKind::Pptx,
            raw_content: Bytes::from_static(b"\x50\x4b\x03\x04 deck"),
            extracted_text: "slide one".to_string(),
            size_bytes: 9,
        };

        let before = Utc::now() - chrono::Duration::seconds(1);
        let ids = store.add_many(vec![input.clone()]).await.unwrap();
        let record = store
            .get_by_id(ids[0])
            .await
            .unwrap()
            .expect("record was stored");

        assert_eq!(record.id, ids[0]);
        assert_eq!(record.title, input.title);
        assert_eq!(record.media_kind, MediaKind::Pptx);
        assert_eq!(record.raw_content, input.raw_content);
        assert_eq!(record.extracted_text, input.extracted_text);
        assert_eq!(record.size_bytes, input.size_bytes);
        assert!(record.created_at >= before);
        assert!(record.created_at <= Utc::now() + chrono::Duration::seconds(1));
    }

    #[tokio::test]
    async fn add_many_failure_keeps_records_committed_before_it() {
        let store = memory_store().await;
        let mut bad = draft("b.txt");
        // u64::MAX wraps negative when bound as a SQLite integer, tripping
        // the size_bytes check constraint on exactly this draft.
        bad.size_bytes = u64::MAX;

        let result = store
            .add_many(vec![draft("a.txt"), bad, draft("c.txt")])
            .await;
        assert!(matches!(result, Err(PortError::Persistence(_))));

        let titles: Vec<String> = store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.title)
            .collect();
        assert_eq!(titles, vec!["a.txt".to_string()]);
    }

    #[tokio::test]
    async fn deleting_a_missing_id_is_a_noop() {
        let store = memory_store().await;
        let ids = store.add_many(vec![draft("keep.txt")]).await.unwrap();

        store.delete_by_id(ids[0] + 100).await.unwrap();

        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ids_are_never_reused_after_a_delete() {
        let store = memory_store().await;
        let ids = store
            .add_many(vec![draft("a.txt"), draft("b.txt")])
            .await
            .unwrap();

        store.delete_by_id(ids[1]).await.unwrap();
        let new_ids = store.add_many(vec![draft("c.txt")]).await.unwrap();

        assert!(new_ids[0] > ids[1]);
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let store = memory_store().await;
        store
            .add_many(vec![draft("a.txt"), draft("b.txt")])
            .await
            .unwrap();

        store.clear().await.unwrap();

        assert!(store.get_all().await.unwrap().is_empty());
        assert_eq!(store.get_by_id(1).await.unwrap().map(|r| r.title), None);
    }

    #[tokio::test]
    async fn reopening_the_database_preserves_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("docs.db");

        let store = SqliteDocumentStore::open(&path).await.expect("first open");
        let ids = store.add_many(vec![draft("kept.txt")]).await.unwrap();
        drop(store);

        let reopened = SqliteDocumentStore::open(&path).await.expect("second open");
        let record = reopened.get_by_id(ids[0]).await.unwrap();
        assert_eq!(record.map(|r| r.title), Some("kept.txt".to_string()));
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

use crate::error::SinkError;
use crate::load::ContentSink;
use crate::record::{ContentProjection, RecordKey};

/// Append-only document store for content projections, one SQLite file with
/// documents grouped by collection name.
pub struct DocumentStore {
    conn: Connection,
    collection: String,
    run_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: i64,
    pub record_id: String,
    pub run_id: Option<String>,
    pub inserted_at: String,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStats {
    pub collection: String,
    pub documents: usize,
    pub runs: usize,
    pub last_insert: Option<String>,
}

impl DocumentStore {
    pub fn open(path: &Path, collection: &str) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        init_schema(&conn)?;
        Ok(DocumentStore {
            conn,
            collection: collection.to_string(),
            run_id: None,
        })
    }

    /// Tag documents written from now on with the given run.
    pub fn set_run_id(&mut self, run_id: &str) {
        self.run_id = Some(run_id.to_string());
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    pub fn stats(&self) -> Result<Vec<CollectionStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT collection, COUNT(*), COUNT(DISTINCT run_id), MAX(inserted_at)
             FROM documents GROUP BY collection ORDER BY collection",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CollectionStats {
                    collection: row.get(0)?,
                    documents: row.get::<_, i64>(1)? as usize,
                    runs: row.get::<_, i64>(2)? as usize,
                    last_insert: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Most recent documents first.
    pub fn list(&self, limit: usize) -> Result<Vec<StoredDocument>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, record_id, run_id, inserted_at, body FROM documents
             WHERE collection = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![self.collection, limit as i64], stored_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Latest document stored for a record id. Re-runs append duplicates, so
    /// older copies may exist.
    pub fn find_by_record_id(&self, key: &RecordKey) -> Result<Option<StoredDocument>> {
        let doc = self
            .conn
            .query_row(
                "SELECT id, record_id, run_id, inserted_at, body FROM documents
                 WHERE collection = ?1 AND record_id = ?2 ORDER BY id DESC LIMIT 1",
                params![self.collection, key.as_str()],
                stored_document,
            )
            .optional()?;
        Ok(doc)
    }
}

impl ContentSink for DocumentStore {
    fn target(&self) -> &str {
        &self.collection
    }

    /// Single transaction per call: every document lands or none does.
    fn insert_many(&mut self, documents: &[ContentProjection]) -> Result<usize, SinkError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents (collection, record_id, run_id, body) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for doc in documents {
                let body = serde_json::to_string(doc)?;
                stmt.execute(params![
                    self.collection,
                    doc.key().as_str(),
                    self.run_id,
                    body
                ])?;
            }
        }
        tx.commit()?;
        Ok(documents.len())
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id          INTEGER PRIMARY KEY,
            collection  TEXT NOT NULL,
            record_id   TEXT NOT NULL,
            run_id      TEXT,
            body        TEXT NOT NULL,
            inserted_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_documents_record ON documents(collection, record_id);
        ",
    )?;
    Ok(())
}

fn stored_document(row: &Row<'_>) -> rusqlite::Result<StoredDocument> {
    let body: String = row.get(4)?;
    Ok(StoredDocument {
        id: row.get(0)?,
        record_id: row.get(1)?,
        run_id: row.get(2)?,
        inserted_at: row.get(3)?,
        body: serde_json::from_str(&body).unwrap_or(Value::String(body)),
    })
}

//! SQLite-based vector index implementation.
//!
//! Cosine similarity is computed in Rust over candidate rows narrowed by the
//! scope filter. For large datasets consider the sqlite-vec extension or a
//! standalone vector database behind the same trait.

use super::{cosine_similarity, rank_results, Chunk, ScoredChunk, VectorIndex};
use crate::error::{ReferatError, Result};
use crate::scope::ChunkScope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

/// SQLite-based vector index.
pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    meeting_id TEXT NOT NULL,
    organization_id TEXT NOT NULL,
    meeting_title TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    text TEXT NOT NULL,
    start_time REAL,
    end_time REAL,
    speakers TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_meeting_id ON chunks(meeting_id);
CREATE INDEX IF NOT EXISTS idx_chunks_organization_id ON chunks(organization_id);
"#;

impl SqliteVectorIndex {
    /// Open (or create) a file-backed vector index.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for concurrent readers during re-indexing
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReferatError::VectorIndex(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to little-endian bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_chunk(row: &Row<'_>) -> rusqlite::Result<Chunk> {
        let id_str: String = row.get(0)?;
        let meeting_id_str: String = row.get(1)?;
        let organization_id_str: String = row.get(2)?;
        let speakers_json: String = row.get(8)?;
        let embedding_bytes: Vec<u8> = row.get(9)?;
        let indexed_at_str: String = row.get(10)?;

        Ok(Chunk {
            id: uuid::Uuid::parse_str(&id_str).unwrap_or_default(),
            meeting_id: uuid::Uuid::parse_str(&meeting_id_str).unwrap_or_default(),
            organization_id: uuid::Uuid::parse_str(&organization_id_str).unwrap_or_default(),
            meeting_title: row.get(3)?,
            chunk_index: row.get(4)?,
            text: row.get(5)?,
            start_time: row.get(6)?,
            end_time: row.get(7)?,
            speakers: serde_json::from_str(&speakers_json).unwrap_or_default(),
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

const SELECT_COLUMNS: &str = "id, meeting_id, organization_id, meeting_title, chunk_index, \
     text, start_time, end_time, speakers, embedding, indexed_at";

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    async fn replace_meeting_chunks(&self, meeting_id: uuid::Uuid, chunks: &[Chunk]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM chunks WHERE meeting_id = ?1",
            params![meeting_id.to_string()],
        )?;

        for chunk in chunks {
            let embedding_bytes = Self::embedding_to_bytes(&chunk.embedding);
            let speakers_json = serde_json::to_string(&chunk.speakers)?;

            tx.execute(
                r#"
                INSERT INTO chunks
                (id, meeting_id, organization_id, meeting_title, chunk_index, text,
                 start_time, end_time, speakers, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    chunk.id.to_string(),
                    chunk.meeting_id.to_string(),
                    chunk.organization_id.to_string(),
                    chunk.meeting_title,
                    chunk.chunk_index,
                    chunk.text,
                    chunk.start_time,
                    chunk.end_time,
                    speakers_json,
                    embedding_bytes,
                    chunk.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Replaced chunks for meeting {} ({} stored)", meeting_id, chunks.len());
        Ok(chunks.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn query_nearest(
        &self,
        scope: &ChunkScope,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        scope.validate()?;
        let conn = self.lock()?;

        let mut results: Vec<ScoredChunk> = match scope.meeting_id {
            Some(meeting_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM chunks WHERE organization_id = ?1 AND meeting_id = ?2",
                    SELECT_COLUMNS
                ))?;
                let rows = stmt.query_map(
                    params![scope.organization_id.to_string(), meeting_id.to_string()],
                    Self::row_to_chunk,
                )?;
                rows.filter_map(|r| r.ok()).collect::<Vec<Chunk>>()
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM chunks WHERE organization_id = ?1",
                    SELECT_COLUMNS
                ))?;
                let rows = stmt.query_map(
                    params![scope.organization_id.to_string()],
                    Self::row_to_chunk,
                )?;
                rows.filter_map(|r| r.ok()).collect::<Vec<Chunk>>()
            }
        }
        .into_iter()
        .map(|chunk| {
            let score = cosine_similarity(query_embedding, &chunk.embedding);
            ScoredChunk { chunk, score }
        })
        .collect();

        rank_results(&mut results, k);
        debug!("Found {} nearest chunks", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn delete_meeting(&self, meeting_id: uuid::Uuid) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM chunks WHERE meeting_id = ?1",
            params![meeting_id.to_string()],
        )?;
        info!("Deleted {} chunks for meeting {}", deleted, meeting_id);
        Ok(deleted)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

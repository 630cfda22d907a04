//! SQLite persistence for chat sessions and messages.

use super::{ChatMessage, ChatSession, MessageRole};
use crate::error::{ReferatError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chat_sessions (
    id TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    meeting_id TEXT,
    title TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_sessions_user ON chat_sessions(user_id, organization_id);

CREATE TABLE IF NOT EXISTS chat_messages (
    id TEXT PRIMARY KEY,
    chat_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    citations TEXT NOT NULL DEFAULT '[]',
    model TEXT,
    tokens INTEGER NOT NULL DEFAULT 0,
    latency_ms INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_messages_chat ON chat_messages(chat_id, created_at);
"#;

/// SQLite-backed chat session and message store.
pub struct SqliteChatStore {
    conn: Mutex<Connection>,
}

impl SqliteChatStore {
    /// Open (or create) a file-backed chat store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite chat store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
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
            .map_err(|e| ReferatError::Chat(format!("Failed to acquire lock: {}", e)))
    }

    fn row_to_session(row: &Row<'_>) -> rusqlite::Result<ChatSession> {
        let id: String = row.get(0)?;
        let organization_id: String = row.get(1)?;
        let user_id: String = row.get(2)?;
        let meeting_id: Option<String> = row.get(3)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;

        Ok(ChatSession {
            id: Uuid::parse_str(&id).unwrap_or_default(),
            organization_id: Uuid::parse_str(&organization_id).unwrap_or_default(),
            user_id: Uuid::parse_str(&user_id).unwrap_or_default(),
            meeting_id: meeting_id.and_then(|m| Uuid::parse_str(&m).ok()),
            title: row.get(4)?,
            created_at: parse_time(&created_at),
            updated_at: parse_time(&updated_at),
        })
    }

    fn row_to_message(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
        let id: String = row.get(0)?;
        let chat_id: String = row.get(1)?;
        let role: String = row.get(2)?;
        let citations_json: String = row.get(4)?;
        let created_at: String = row.get(8)?;

        Ok(ChatMessage {
            id: Uuid::parse_str(&id).unwrap_or_default(),
            chat_id: Uuid::parse_str(&chat_id).unwrap_or_default(),
            role: role.parse().unwrap_or(MessageRole::User),
            content: row.get(3)?,
            citations: serde_json::from_str(&citations_json).unwrap_or_default(),
            model: row.get(5)?,
            tokens: row.get(6)?,
            latency_ms: row.get::<_, i64>(7)? as u64,
            created_at: parse_time(&created_at),
        })
    }

    /// Create a new session.
    pub fn create_session(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        meeting_id: Option<Uuid>,
        title: String,
    ) -> Result<ChatSession> {
        let session = ChatSession {
            id: Uuid::new_v4(),
            organization_id,
            user_id,
            meeting_id,
            title,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO chat_sessions (id, organization_id, user_id, meeting_id, title, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                session.id.to_string(),
                session.organization_id.to_string(),
                session.user_id.to_string(),
                session.meeting_id.map(|m| m.to_string()),
                session.title,
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
            ],
        )?;

        debug!("Created chat session {}", session.id);
        Ok(session)
    }

    /// Fetch a session, verifying ownership. Missing or foreign sessions are
    /// indistinguishable to the caller.
    pub fn get_owned_session(&self, chat_id: Uuid, user_id: Uuid) -> Result<ChatSession> {
        let conn = self.lock()?;
        let result = conn.query_row(
            r#"
            SELECT id, organization_id, user_id, meeting_id, title, created_at, updated_at
            FROM chat_sessions WHERE id = ?1 AND user_id = ?2
            "#,
            params![chat_id.to_string(), user_id.to_string()],
            Self::row_to_session,
        );

        match result {
            Ok(session) => Ok(session),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(ReferatError::NotFound(format!(
                "chat session {} not found",
                chat_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// All sessions of a user within an organization, most recent first.
    pub fn list_sessions(&self, organization_id: Uuid, user_id: Uuid) -> Result<Vec<ChatSession>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, organization_id, user_id, meeting_id, title, created_at, updated_at
            FROM chat_sessions
            WHERE organization_id = ?1 AND user_id = ?2
            ORDER BY updated_at DESC
            "#,
        )?;

        let sessions = stmt
            .query_map(
                params![organization_id.to_string(), user_id.to_string()],
                Self::row_to_session,
            )?
            .filter_map(|s| s.ok())
            .collect();
        Ok(sessions)
    }

    /// Append a message to a session.
    pub fn append_message(&self, message: &ChatMessage) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO chat_messages (id, chat_id, role, content, citations, model, tokens, latency_ms, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                message.id.to_string(),
                message.chat_id.to_string(),
                message.role.as_str(),
                message.content,
                serde_json::to_string(&message.citations)?,
                message.model,
                message.tokens,
                message.latency_ms as i64,
                message.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// The last `limit` messages of a session, returned oldest-first.
    pub fn recent_messages(&self, chat_id: Uuid, limit: usize) -> Result<Vec<ChatMessage>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, chat_id, role, content, citations, model, tokens, latency_ms, created_at
            FROM chat_messages WHERE chat_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )?;

        let mut messages: Vec<ChatMessage> = stmt
            .query_map(
                params![chat_id.to_string(), limit as i64],
                Self::row_to_message,
            )?
            .filter_map(|m| m.ok())
            .collect();
        messages.reverse();
        Ok(messages)
    }

    /// All messages of a session, oldest-first.
    pub fn all_messages(&self, chat_id: Uuid) -> Result<Vec<ChatMessage>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, chat_id, role, content, citations, model, tokens, latency_ms, created_at
            FROM chat_messages WHERE chat_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;

        let messages = stmt
            .query_map(params![chat_id.to_string()], Self::row_to_message)?
            .filter_map(|m| m.ok())
            .collect();
        Ok(messages)
    }

    /// Number of messages in a session.
    pub fn message_count(&self, chat_id: Uuid) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chat_messages WHERE chat_id = ?1",
            params![chat_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Rename a session.
    pub fn set_title(&self, chat_id: Uuid, title: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE chat_sessions SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title, Utc::now().to_rfc3339(), chat_id.to_string()],
        )?;
        Ok(())
    }

    /// Bump a session's updated time.
    pub fn touch_session(&self, chat_id: Uuid) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE chat_sessions SET updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), chat_id.to_string()],
        )?;
        Ok(())
    }

    /// Delete a session together with all its messages.
    pub fn delete_session(&self, chat_id: Uuid) -> Result<()> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM chat_messages WHERE chat_id = ?1",
            params![chat_id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM chat_sessions WHERE id = ?1",
            params![chat_id.to_string()],
        )?;
        tx.commit()?;
        info!("Deleted chat session {} with its messages", chat_id);
        Ok(())
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

//! SQLite FTS5 text index over meeting content.

use super::{DateRange, HitKind, TextHit, TextSearch};
use crate::error::{ReferatError, Result};
use crate::scope::ChunkScope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Meeting content fed into the text index.
#[derive(Debug, Clone)]
pub struct MeetingRecord {
    pub meeting_id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub transcript: String,
    pub summary: Option<String>,
    pub action_items: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The indexed columns, paired with the hit kind a match on them produces.
const COLUMNS: [(&str, usize, HitKind); 4] = [
    ("title", 0, HitKind::Meeting),
    ("transcript", 1, HitKind::Transcript),
    ("summary", 2, HitKind::Summary),
    ("action_items", 3, HitKind::ActionItem),
];

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meetings (
    id TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    title TEXT NOT NULL,
    transcript TEXT NOT NULL,
    summary TEXT NOT NULL DEFAULT '',
    action_items TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_meetings_organization_id ON meetings(organization_id);

CREATE VIRTUAL TABLE IF NOT EXISTS meetings_fts USING fts5(
    title, transcript, summary, action_items,
    content='meetings', content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS meetings_ai AFTER INSERT ON meetings BEGIN
    INSERT INTO meetings_fts(rowid, title, transcript, summary, action_items)
    VALUES (new.rowid, new.title, new.transcript, new.summary, new.action_items);
END;

CREATE TRIGGER IF NOT EXISTS meetings_ad AFTER DELETE ON meetings BEGIN
    INSERT INTO meetings_fts(meetings_fts, rowid, title, transcript, summary, action_items)
    VALUES ('delete', old.rowid, old.title, old.transcript, old.summary, old.action_items);
END;

CREATE TRIGGER IF NOT EXISTS meetings_au AFTER UPDATE ON meetings BEGIN
    INSERT INTO meetings_fts(meetings_fts, rowid, title, transcript, summary, action_items)
    VALUES ('delete', old.rowid, old.title, old.transcript, old.summary, old.action_items);
    INSERT INTO meetings_fts(rowid, title, transcript, summary, action_items)
    VALUES (new.rowid, new.title, new.transcript, new.summary, new.action_items);
END;
"#;

/// SQLite FTS5-backed text search.
pub struct SqliteTextIndex {
    conn: Mutex<Connection>,
}

impl SqliteTextIndex {
    /// Open (or create) a file-backed text index.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite text index at {:?}", path);

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
            .map_err(|e| ReferatError::TextSearch(format!("Failed to acquire lock: {}", e)))
    }

    /// Insert or update the indexed content for a meeting.
    pub fn upsert_meeting(&self, record: &MeetingRecord) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO meetings (id, organization_id, title, transcript, summary, action_items, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                organization_id = excluded.organization_id,
                title = excluded.title,
                transcript = excluded.transcript,
                summary = excluded.summary,
                action_items = excluded.action_items,
                created_at = excluded.created_at,
                deleted_at = NULL
            "#,
            params![
                record.meeting_id.to_string(),
                record.organization_id.to_string(),
                record.title,
                record.transcript,
                record.summary.as_deref().unwrap_or(""),
                record.action_items.as_deref().unwrap_or(""),
                record.created_at.to_rfc3339(),
            ],
        )?;
        debug!("Indexed meeting {} for text search", record.meeting_id);
        Ok(())
    }

    /// Mark a meeting deleted so it stops matching searches.
    pub fn mark_deleted(&self, meeting_id: Uuid) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE meetings SET deleted_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), meeting_id.to_string()],
        )?;
        Ok(())
    }

    /// Build a column-filtered FTS5 match expression with each term quoted,
    /// so user input can never inject query syntax.
    fn match_expression(column: &str, query: &str) -> String {
        let terms = query
            .split_whitespace()
            .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}: ({})", column, terms)
    }

    /// Map a bm25 rank (more negative is better) into (0, 1].
    fn normalize_rank(rank: f64) -> f32 {
        let raw = (-rank).max(0.0);
        (raw / (raw + 1.0)) as f32
    }
}

#[async_trait]
impl TextSearch for SqliteTextIndex {
    #[instrument(skip(self), fields(query = %query))]
    async fn search_text(
        &self,
        query: &str,
        scope: &ChunkScope,
        date_range: Option<DateRange>,
    ) -> Result<Vec<TextHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        scope.validate()?;

        let range = date_range.unwrap_or_default();
        let from = range.from.map(|dt| dt.to_rfc3339());
        let to = range.to.map(|dt| dt.to_rfc3339());

        let conn = self.lock()?;
        let mut hits: Vec<TextHit> = Vec::new();

        for (column, col_index, kind) in COLUMNS {
            let sql = format!(
                r#"
                SELECT m.id, m.title, bm25(meetings_fts) AS rank,
                       snippet(meetings_fts, {col}, '**', '**', '…', 12) AS excerpt
                FROM meetings_fts
                JOIN meetings m ON m.rowid = meetings_fts.rowid
                WHERE meetings_fts MATCH ?1
                  AND m.organization_id = ?2
                  AND m.deleted_at IS NULL
                  AND (?3 IS NULL OR m.id = ?3)
                  AND (?4 IS NULL OR m.created_at >= ?4)
                  AND (?5 IS NULL OR m.created_at <= ?5)
                ORDER BY rank
                "#,
                col = col_index
            );

            let expression = Self::match_expression(column, query);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![
                    expression,
                    scope.organization_id.to_string(),
                    scope.meeting_id.map(|m| m.to_string()),
                    from,
                    to,
                ],
                |row| {
                    let id_str: String = row.get(0)?;
                    let title: String = row.get(1)?;
                    let rank: f64 = row.get(2)?;
                    let excerpt: String = row.get(3)?;
                    Ok((id_str, title, rank, excerpt))
                },
            )?;

            for row in rows {
                let (id_str, title, rank, excerpt) = row?;
                hits.push(TextHit {
                    kind,
                    meeting_id: Uuid::parse_str(&id_str).unwrap_or_default(),
                    meeting_title: title,
                    score: Self::normalize_rank(rank),
                    excerpt,
                });
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!("Found {} lexical hits", hits.len());
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(org: Uuid, title: &str, transcript: &str, summary: &str) -> MeetingRecord {
        MeetingRecord {
            meeting_id: Uuid::new_v4(),
            organization_id: org,
            title: title.to_string(),
            transcript: transcript.to_string(),
            summary: Some(summary.to_string()),
            action_items: Some("follow up with the vendor".to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_empty_query_short_circuits() {
        let index = SqliteTextIndex::in_memory().unwrap();
        let scope = ChunkScope::organization(Uuid::new_v4());
        assert!(index.search_text("", &scope, None).await.unwrap().is_empty());
        assert!(index.search_text("   ", &scope, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hits_carry_kind_and_highlight() {
        let index = SqliteTextIndex::in_memory().unwrap();
        let org = Uuid::new_v4();
        let rec = record(
            org,
            "Budget review",
            "we discussed the marketing budget at length",
            "budget approved for Q3",
        );
        index.upsert_meeting(&rec).unwrap();

        let scope = ChunkScope::organization(org);
        let hits = index.search_text("budget", &scope, None).await.unwrap();
        assert!(!hits.is_empty());

        let kinds: Vec<HitKind> = hits.iter().map(|h| h.kind).collect();
        assert!(kinds.contains(&HitKind::Meeting));
        assert!(kinds.contains(&HitKind::Transcript));
        assert!(kinds.contains(&HitKind::Summary));

        // snippet() keeps the source casing ("Budget" in the title)
        assert!(hits
            .iter()
            .all(|h| h.excerpt.to_lowercase().contains("**budget**")));
        assert!(hits.iter().all(|h| h.score > 0.0 && h.score <= 1.0));
    }

    #[tokio::test]
    async fn test_scope_excludes_other_organizations() {
        let index = SqliteTextIndex::in_memory().unwrap();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let rec_a = record(org_a, "Sync", "roadmap discussion", "");
        index.upsert_meeting(&rec_a).unwrap();
        index
            .upsert_meeting(&record(org_b, "Sync", "roadmap discussion", ""))
            .unwrap();

        let hits = index
            .search_text("roadmap", &ChunkScope::organization(org_a), None)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.meeting_id == rec_a.meeting_id));
    }

    #[tokio::test]
    async fn test_deleted_meetings_never_match() {
        let index = SqliteTextIndex::in_memory().unwrap();
        let org = Uuid::new_v4();
        let rec = record(org, "Retro", "incident postmortem details", "");
        index.upsert_meeting(&rec).unwrap();
        index.mark_deleted(rec.meeting_id).unwrap();

        let hits = index
            .search_text("postmortem", &ChunkScope::organization(org), None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_date_range_filter() {
        let index = SqliteTextIndex::in_memory().unwrap();
        let org = Uuid::new_v4();
        let mut rec = record(org, "Old meeting", "legacy system migration", "");
        rec.created_at = Utc::now() - chrono::Duration::days(30);
        index.upsert_meeting(&rec).unwrap();

        let range = DateRange {
            from: Some(Utc::now() - chrono::Duration::days(7)),
            to: None,
        };
        let hits = index
            .search_text("migration", &ChunkScope::organization(org), Some(range))
            .await
            .unwrap();
        assert!(hits.is_empty());

        let wider = DateRange {
            from: Some(Utc::now() - chrono::Duration::days(60)),
            to: None,
        };
        let hits = index
            .search_text("migration", &ChunkScope::organization(org), Some(wider))
            .await
            .unwrap();
        assert!(!hits.is_empty());
    }

    #[test]
    fn test_match_expression_quotes_terms() {
        let expr = SqliteTextIndex::match_expression("title", "budget \"q3\" review");
        assert_eq!(expr, "title: (\"budget\" \"\"\"q3\"\"\" \"review\")");
    }
}

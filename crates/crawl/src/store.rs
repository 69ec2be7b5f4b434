// ABOUTME: Persisted-store boundary for place records with SQLite and in-memory implementations.
// ABOUTME: Upserts are keyed on canonical id so repeated writes of the same place are idempotent.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::record::{PlaceRecord, ReviewCounts};

pub trait PlaceStore {
    fn exists(&self, canonical_id: &str) -> Result<bool, StoreError>;

    /// Inserts or updates every record; returns how many were written.
    fn bulk_upsert(&mut self, records: &[PlaceRecord]) -> Result<usize, StoreError>;
}

impl<S: PlaceStore + ?Sized> PlaceStore for &mut S {
    fn exists(&self, canonical_id: &str) -> Result<bool, StoreError> {
        (**self).exists(canonical_id)
    }

    fn bulk_upsert(&mut self, records: &[PlaceRecord]) -> Result<usize, StoreError> {
        (**self).bulk_upsert(records)
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS places (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    canonical_id TEXT UNIQUE NOT NULL,
    target_query TEXT NOT NULL,
    name TEXT,
    category TEXT,
    address TEXT,
    visitor_reviews INTEGER,
    blog_reviews INTEGER,
    intro_text TEXT,
    keywords TEXT NOT NULL DEFAULT '[]',
    review_highlights TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_places_target ON places(target_query);
"#;

/// SQLite-backed place store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(10))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM places", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn get(&self, canonical_id: &str) -> Result<Option<PlaceRecord>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT canonical_id, target_query, name, category, address, visitor_reviews,
                        blog_reviews, intro_text, keywords, review_highlights
                 FROM places WHERE canonical_id = ?1",
                params![canonical_id],
                |row| {
                    Ok((
                        PlaceRecord {
                            canonical_id: row.get(0)?,
                            target_query: row.get(1)?,
                            name: row.get(2)?,
                            category: row.get(3)?,
                            address: row.get(4)?,
                            review_counts: ReviewCounts {
                                visitor: row.get(5)?,
                                blog: row.get(6)?,
                            },
                            intro_text: row.get(7)?,
                            keywords: Vec::new(),
                            review_highlights: Vec::new(),
                        },
                        row.get::<_, String>(8)?,
                        row.get::<_, String>(9)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((mut record, keywords, highlights)) => {
                record.keywords = serde_json::from_str(&keywords)?;
                record.review_highlights = serde_json::from_str(&highlights)?;
                Ok(Some(record))
            }
        }
    }
}

impl PlaceStore for SqliteStore {
    fn exists(&self, canonical_id: &str) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM places WHERE canonical_id = ?1",
            params![canonical_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn bulk_upsert(&mut self, records: &[PlaceRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO places (
                    canonical_id, target_query, name, category, address,
                    visitor_reviews, blog_reviews, intro_text, keywords, review_highlights,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                ON CONFLICT(canonical_id) DO UPDATE SET
                    target_query = excluded.target_query,
                    name = excluded.name,
                    category = excluded.category,
                    address = excluded.address,
                    visitor_reviews = excluded.visitor_reviews,
                    blog_reviews = excluded.blog_reviews,
                    intro_text = excluded.intro_text,
                    keywords = excluded.keywords,
                    review_highlights = excluded.review_highlights,
                    updated_at = excluded.updated_at
                "#,
            )?;
            for r in records {
                stmt.execute(params![
                    r.canonical_id,
                    r.target_query,
                    r.name,
                    r.category,
                    r.address,
                    r.review_counts.visitor,
                    r.review_counts.blog,
                    r.intro_text,
                    serde_json::to_string(&r.keywords)?,
                    serde_json::to_string(&r.review_highlights)?,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }
}

/// In-memory store, mostly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<String, PlaceRecord>,
    upsert_calls: usize,
}

impl MemoryStore {
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                let record = PlaceRecord {
                    canonical_id: id.clone(),
                    ..Default::default()
                };
                (id, record)
            })
            .collect();
        Self {
            records,
            upsert_calls: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, canonical_id: &str) -> Option<&PlaceRecord> {
        self.records.get(canonical_id)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls
    }
}

impl PlaceStore for MemoryStore {
    fn exists(&self, canonical_id: &str) -> Result<bool, StoreError> {
        Ok(self.records.contains_key(canonical_id))
    }

    fn bulk_upsert(&mut self, records: &[PlaceRecord]) -> Result<usize, StoreError> {
        self.upsert_calls += 1;
        for r in records {
            self.records.insert(r.canonical_id.clone(), r.clone());
        }
        Ok(records.len())
    }
}

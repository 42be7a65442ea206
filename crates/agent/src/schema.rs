//! Schema introspection for the configured SQLite database, cached with a
//! TTL so a busy session doesn't re-walk `sqlite_master` on every turn.
//!
//! Grounded on `sqlite_agent_service.py`'s `_schema()`: list tables, list
//! each table's columns, and pull a sample of distinct values for any
//! name-like column so the planner can match loosely-spoken names against
//! what's actually in the database.

use std::path::Path;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::AgentError;

const DEFAULT_TTL: Duration = Duration::from_secs(300);
const SAMPLE_LIMIT: usize = 50;

struct CachedSchema {
    text: String,
    built_at: Instant,
}

/// TTL-cached `describe()` over one SQLite database file.
pub struct SchemaCache {
    ttl: Duration,
    cached: Mutex<Option<CachedSchema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self { ttl: DEFAULT_TTL, cached: Mutex::new(None) }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, cached: Mutex::new(None) }
    }

    /// Returns the cached schema description, rebuilding it from `db_path`
    /// if the cache is empty or has outlived its TTL.
    pub fn describe(&self, db_path: &Path) -> Result<String, AgentError> {
        if let Some(cached) = self.cached.lock().as_ref() {
            if cached.built_at.elapsed() < self.ttl {
                return Ok(cached.text.clone());
            }
        }

        let text = introspect(db_path)?;
        *self.cached.lock() = Some(CachedSchema { text: text.clone(), built_at: Instant::now() });
        Ok(text)
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

fn introspect(db_path: &Path) -> Result<String, AgentError> {
    let conn = Connection::open(db_path)?;

    let mut tables_stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let tables: Vec<String> =
        tables_stmt.query_map([], |row| row.get(0))?.collect::<Result<_, _>>()?;

    let mut parts = Vec::with_capacity(tables.len());
    for table in &tables {
        let mut cols_stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let columns: Vec<(String, String)> = cols_stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
            .collect::<Result<_, _>>()?;

        let col_str = columns
            .iter()
            .map(|(name, ty)| format!("{name} {ty}"))
            .collect::<Vec<_>>()
            .join(", ");

        let name_like_cols: Vec<&str> = columns
            .iter()
            .filter(|(name, _)| name.to_lowercase().contains("name") || name == "title")
            .map(|(name, _)| name.as_str())
            .collect();

        let mut sample_values = Vec::new();
        for col in name_like_cols {
            let sql = format!(
                "SELECT DISTINCT {col} FROM {table} WHERE {col} IS NOT NULL LIMIT {SAMPLE_LIMIT}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let values: Vec<String> = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .filter_map(Result::ok)
                .collect();
            sample_values.extend(values);
        }

        let mut line = format!("  {table}({col_str})");
        if !sample_values.is_empty() {
            line.push_str(&format!(" values={sample_values:?}"));
        }
        parts.push(line);
    }

    Ok(format!("Tables:\n{}", parts.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_db() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        let conn = Connection::open(file.path()).unwrap();
        conn.execute_batch(
            "CREATE TABLE members (member_id INTEGER PRIMARY KEY, name TEXT, membership_type TEXT);
             INSERT INTO members (name, membership_type) VALUES ('Ada Lovelace', 'gold');",
        )
        .unwrap();
        file
    }

    #[test]
    fn describes_tables_and_sample_values() {
        let db = seed_db();
        let cache = SchemaCache::new();
        let text = cache.describe(db.path()).unwrap();
        assert!(text.contains("members("));
        assert!(text.contains("Ada Lovelace"));
    }

    #[test]
    fn second_call_within_ttl_is_cached() {
        let db = seed_db();
        let cache = SchemaCache::new();
        let first = cache.describe(db.path()).unwrap();
        // Mutate the db; a cache hit should still return the stale text.
        let conn = Connection::open(db.path()).unwrap();
        conn.execute("INSERT INTO members (name) VALUES ('Grace Hopper')", []).unwrap();
        let second = cache.describe(db.path()).unwrap();
        assert_eq!(first, second);
        assert!(!second.contains("Grace Hopper"));
    }
}

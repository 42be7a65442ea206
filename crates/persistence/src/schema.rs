//! ScyllaDB schema for the `sessions` table. Conversation history and
//! variables are stored as a single JSON blob column — the Session Store
//! contract (§4.1) only ever reads or writes a whole `Session` at once, so
//! there's no need to model its fields as individual CQL columns.

use scylla::Session;

use crate::error::PersistenceError;

const DEFAULT_TTL_SECONDS: i64 = 24 * 60 * 60;

pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {keyspace} \
         WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {replication_factor}}}"
    );
    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("failed to create keyspace: {e}")))?;
    Ok(())
}

/// Creates the `sessions` table with a default TTL of 24h (§5 "Session
/// idle: TTL eviction"). ScyllaDB drops a row automatically once its TTL
/// expires, so eviction needs no separate sweeper process; every write
/// this crate issues re-applies the TTL per §4.1's "refreshed on every
/// access" by writing the row again with `USING TTL`.
pub async fn create_sessions_table(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    let query = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {keyspace}.sessions (
            session_id TEXT PRIMARY KEY,
            session_json TEXT
        ) WITH default_time_to_live = {DEFAULT_TTL_SECONDS}
        "#
    );
    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("failed to create sessions table: {e}")))?;
    Ok(())
}

//! The Session Store's external TTL-keyed datastore (§4.1, §9 "Session
//! store durability"): ScyllaDB as the primary backing store, with an
//! in-memory write-through cache so a transient ScyllaDB outage degrades a
//! request to in-memory-only service rather than failing it.

pub mod client;
pub mod error;
pub mod schema;
pub mod sessions;

pub use client::{ScyllaClient, ScyllaConfig};
pub use error::PersistenceError;
pub use sessions::ScyllaSessionStore;

/// Connects to ScyllaDB, ensures the `sessions` table exists, and returns a
/// `SessionStore` ready to hand to the reply pipeline.
pub async fn init(
    config: ScyllaConfig,
    ttl: chrono::Duration,
    history_cap: usize,
) -> Result<ScyllaSessionStore, PersistenceError> {
    let client = ScyllaClient::connect(config).await?;
    client.ensure_schema().await?;
    Ok(ScyllaSessionStore::new(client, ttl, history_cap))
}

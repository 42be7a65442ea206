//! Agent mode's concrete `ReasoningBackend`: a tool-using database agent.
//!
//! The general/document backends (`voice-agent-llm`) stream chat completion
//! tokens straight from a single LLM call. Agent mode is different: the
//! reply is produced by planning a database operation from natural
//! language, executing it, and turning the result back into natural
//! language — a single synchronous round trip per §4.6's "Agent mode: run
//! the reasoning backend once".

pub mod executor;
pub mod plan;
pub mod planner;
pub mod schema;
pub mod sqlite_agent;

pub use plan::{OperationType, PendingInsert, QueryPlan};
pub use planner::Planner;
pub use sqlite_agent::{SqliteAgent, SqliteAgentConfig};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("database error: {0}")]
    Database(String),

    #[error("planning error: {0}")]
    Planning(String),

    #[error("database not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for AgentError {
    fn from(err: rusqlite::Error) -> Self {
        AgentError::Database(err.to_string())
    }
}

impl From<AgentError> for voice_agent_core::Error {
    fn from(err: AgentError) -> Self {
        voice_agent_core::Error::Reasoning(err.to_string())
    }
}

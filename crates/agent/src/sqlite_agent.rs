//! `SqliteAgent`: the concrete `ReasoningBackend` selected for `Mode::Agent`
//! (§9 "Dynamic dispatch across modes"). One synchronous turn: plan →
//! execute → speak, with a multi-turn pending insert carried in
//! `session.variables`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use voice_agent_core::{Exchange, ReasoningBackend, Result as CoreResult, TokenStream};
use voice_agent_llm::LlmBackend;

use crate::executor;
use crate::plan::{OperationType, PendingInsert, QueryPlan, PENDING_KEY};
use crate::planner::Planner;
use crate::schema::SchemaCache;
use crate::AgentError;

#[derive(Debug, Clone)]
pub struct SqliteAgentConfig {
    pub db_path: PathBuf,
    pub schema_description: String,
}

/// A tool-using agent that plans and executes SQLite operations from
/// natural language. Implements `ReasoningBackend::answer_once` only —
/// agent mode never drives the sentence-streaming path.
pub struct SqliteAgent {
    config: SqliteAgentConfig,
    schema: SchemaCache,
    planner: Planner,
}

impl SqliteAgent {
    pub fn new(config: SqliteAgentConfig, llm: Arc<dyn LlmBackend>) -> Self {
        Self { config, schema: SchemaCache::new(), planner: Planner::new(llm) }
    }

    async fn plan(
        &self,
        query: &str,
        history: &[Exchange],
        pending: Option<&PendingInsert>,
    ) -> Result<QueryPlan, AgentError> {
        let schema_description = {
            let base = self.schema.describe(&self.config.db_path)?;
            if self.config.schema_description.is_empty() {
                base
            } else {
                format!("{}\n\n{}", self.config.schema_description, base)
            }
        };
        self.planner.plan(query, history, pending, &schema_description).await
    }

    async fn run_insert(
        &self,
        mut plan: QueryPlan,
        pending: Option<PendingInsert>,
    ) -> Result<(String, HashMap<String, Value>), AgentError> {
        if let Some(p) = &pending {
            plan.merge_pending(p);
        }

        let mut next_pending = HashMap::new();

        if !plan.ready_to_insert {
            let response = plan
                .ask_user
                .clone()
                .unwrap_or_else(|| "Could you provide the missing details?".to_string());
            if !plan.insert_table.is_empty() {
                let carry = PendingInsert { table: plan.insert_table, insert_values: plan.insert_values };
                next_pending.insert(PENDING_KEY.to_string(), serde_json::to_value(carry).unwrap());
            }
            return Ok((response, next_pending));
        }

        let db_path = self.config.db_path.clone();
        let plan_for_db = plan.clone();
        let outcome =
            tokio::task::spawn_blocking(move || executor::execute_insert(&db_path, &plan_for_db))
                .await
                .map_err(|e| AgentError::Database(e.to_string()))?;

        let response = match outcome {
            Ok(document) => self
                .planner
                .speak_insert_confirmation(&plan.insert_table, &document)
                .await?,
            Err(e) => format!("I wasn't able to complete that. {e}"),
        };

        Ok((response, next_pending))
    }

    async fn run_read(
        &self,
        plan: QueryPlan,
        query: &str,
        pending: Option<PendingInsert>,
    ) -> Result<(String, HashMap<String, Value>), AgentError> {
        let db_path = self.config.db_path.clone();
        let sql = plan.sql.clone();
        let rows = tokio::task::spawn_blocking(move || executor::execute_read(&db_path, sql.as_deref()))
            .await
            .map_err(|e| AgentError::Database(e.to_string()))??;

        let response = self.planner.speak_read_result(query, &plan.intent, &rows).await?;

        let mut next_pending = HashMap::new();
        if let Some(p) = pending {
            next_pending.insert(PENDING_KEY.to_string(), serde_json::to_value(p).unwrap());
        }
        Ok((response, next_pending))
    }
}

#[async_trait]
impl ReasoningBackend for SqliteAgent {
    async fn stream_tokens(&self, _prompt: &str) -> CoreResult<TokenStream> {
        Err(voice_agent_core::Error::Reasoning(
            "the database agent backend only supports answer_once, not streaming".to_string(),
        ))
    }

    async fn answer_once(
        &self,
        query: &str,
        history: &[Exchange],
        pending: &HashMap<String, Value>,
    ) -> CoreResult<(String, HashMap<String, Value>)> {
        let pending_insert: Option<PendingInsert> = pending
            .get(PENDING_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        let plan = self.plan(query, history, pending_insert.as_ref()).await.map_err(map_err)?;

        match plan.operation_type {
            OperationType::Insert => self.run_insert(plan, pending_insert).await.map_err(map_err),
            OperationType::Read => self.run_read(plan, query, pending_insert).await.map_err(map_err),
        }
    }
}

fn map_err(e: AgentError) -> voice_agent_core::Error {
    e.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rusqlite::Connection;
    use voice_agent_llm::{FinishReason, GenerationResult, Message};

    struct ScriptedLlm {
        responses: parking_lot::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmBackend for ScriptedLlm {
        async fn generate(&self, _messages: &[Message]) -> Result<GenerationResult, voice_agent_llm::LlmError> {
            let text = self.responses.lock().remove(0);
            Ok(GenerationResult {
                text,
                tokens: 1,
                time_to_first_token_ms: 0,
                total_time_ms: 0,
                tokens_per_second: 0.0,
                finish_reason: FinishReason::Stop,
                context: None,
            })
        }

        async fn generate_stream(
            &self,
            _messages: &[Message],
            _tx: tokio::sync::mpsc::Sender<String>,
        ) -> Result<GenerationResult, voice_agent_llm::LlmError> {
            unreachable!("agent mode never streams")
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

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

    #[tokio::test]
    async fn read_turn_plans_executes_and_speaks() {
        let db = seed_db();
        let llm = Arc::new(ScriptedLlm {
            responses: parking_lot::Mutex::new(vec![
                r#"{"intent":"lookup","operation_type":"read","sql":"SELECT name FROM members"}"#
                    .to_string(),
                "Ada Lovelace is a gold member.".to_string(),
            ]),
        });
        let agent = SqliteAgent::new(
            SqliteAgentConfig { db_path: db.path().to_path_buf(), schema_description: String::new() },
            llm,
        );

        let (text, pending) =
            agent.answer_once("who is a member", &[], &HashMap::new()).await.unwrap();
        assert_eq!(text, "Ada Lovelace is a gold member.");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn incomplete_insert_carries_pending_state() {
        let db = seed_db();
        let llm = Arc::new(ScriptedLlm {
            responses: parking_lot::Mutex::new(vec![
                r#"{"intent":"enroll","operation_type":"insert","insert_table":"members","insert_values":{"name":"Ada Lovelace"},"ready_to_insert":false,"ask_user":"What membership type?"}"#
                    .to_string(),
            ]),
        });
        let agent = SqliteAgent::new(
            SqliteAgentConfig { db_path: db.path().to_path_buf(), schema_description: String::new() },
            llm,
        );

        let (text, pending) = agent.answer_once("enroll me", &[], &HashMap::new()).await.unwrap();
        assert_eq!(text, "What membership type?");
        assert!(pending.contains_key(PENDING_KEY));
    }

    #[tokio::test]
    async fn stream_tokens_is_unsupported() {
        let db = seed_db();
        let llm = Arc::new(ScriptedLlm { responses: parking_lot::Mutex::new(vec![]) });
        let agent = SqliteAgent::new(
            SqliteAgentConfig { db_path: db.path().to_path_buf(), schema_description: String::new() },
            llm,
        );
        assert!(agent.stream_tokens("anything").await.is_err());
    }
}

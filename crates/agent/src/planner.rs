//! Two LLM calls that bracket execution (`sqlite_agent_service.py`'s
//! `_plan`/`_speak`): one turns natural language into a structured
//! `QueryPlan`, the other turns the query result back into a short spoken
//! response.

use std::sync::Arc;

use chrono::Local;
use serde_json::Value;
use voice_agent_core::Exchange;
use voice_agent_llm::{LlmBackend, Message};

use crate::plan::{PendingInsert, QueryPlan};
use crate::AgentError;

pub struct Planner {
    llm: Arc<dyn LlmBackend>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmBackend>) -> Self {
        Self { llm }
    }

    /// Natural language → structured `QueryPlan`. Falls back to a
    /// no-op read plan if the model's output isn't valid JSON — a bad
    /// plan should degrade the turn, not fail the whole request.
    pub async fn plan(
        &self,
        query: &str,
        history: &[Exchange],
        pending: Option<&PendingInsert>,
        schema_description: &str,
    ) -> Result<QueryPlan, AgentError> {
        let prompt = build_plan_prompt(query, history, pending, schema_description);
        let messages = vec![Message::system(
            "You are a database planning assistant. Respond with a single JSON object and nothing else.",
        ), Message::user(prompt)];

        let result = self
            .llm
            .generate(&messages)
            .await
            .map_err(|e| AgentError::Planning(e.to_string()))?;

        match serde_json::from_str::<QueryPlan>(result.text.trim()) {
            Ok(plan) => Ok(plan),
            Err(e) => {
                tracing::warn!(error = %e, raw = %result.text, "plan response was not valid JSON");
                Ok(QueryPlan::fallback())
            }
        }
    }

    /// Turns read results into a short spoken response.
    pub async fn speak_read_result(
        &self,
        query: &str,
        intent: &str,
        rows: &[Value],
    ) -> Result<String, AgentError> {
        let preview = serde_json::to_string_pretty(&rows.iter().take(20).collect::<Vec<_>>())
            .unwrap_or_default();
        let context = format!(
            "User asked: \"{query}\"\nIntent: {intent}\nTotal found: {}\nData: {preview}",
            rows.len()
        );
        self.speak(&context).await
    }

    /// Turns a confirmed insert into a short spoken confirmation.
    pub async fn speak_insert_confirmation(
        &self,
        table: &str,
        document: &Value,
    ) -> Result<String, AgentError> {
        let doc_json = serde_json::to_string_pretty(document).unwrap_or_default();
        let context = format!(
            "Confirmed insert into '{table}'.\n\
             Speak a natural 1-2 sentence confirmation. ALWAYS include: the person's \
             name (any name/member_name/customer_name field), what was booked or \
             created, and date/time if present.\nDocument:\n{doc_json}"
        );
        self.speak(&context).await
    }

    async fn speak(&self, context: &str) -> Result<String, AgentError> {
        let messages = vec![Message::user(format!(
            "Generate a natural, concise voice response. No markdown.\n\n{context}"
        ))];
        match self.llm.generate(&messages).await {
            Ok(result) => Ok(result.text.trim().to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "speak call failed, falling back to generic confirmation");
                Ok("Done.".to_string())
            }
        }
    }
}

fn build_plan_prompt(
    query: &str,
    history: &[Exchange],
    pending: Option<&PendingInsert>,
    schema_description: &str,
) -> String {
    let today = Local::now().format("%Y-%m-%d");

    let pending_block = pending
        .map(|p| {
            let lines: Vec<String> = p
                .insert_values
                .iter()
                .map(|(k, v)| {
                    if v.is_null() || v.as_str() == Some("") {
                        format!("  {k} = (MISSING — extract from message)")
                    } else {
                        format!("  {k} = {v}")
                    }
                })
                .collect();
            format!(
                "\nINSERT IN PROGRESS — return operation_type=\"insert\", insert_table=\"{}\".\n\
                 Known fields:\n{}\n\
                 Fill MISSING fields from the message. Keep known fields unchanged.\n",
                p.table,
                lines.join("\n")
            )
        })
        .unwrap_or_default();

    let history_block = if !history.is_empty() && pending.is_none() {
        let lines: Vec<String> = history
            .iter()
            .rev()
            .take(4)
            .rev()
            .map(|e| format!("User: {}\nAssistant: {}", e.user_text, e.assistant_text))
            .collect();
        format!("\nCONVERSATION HISTORY:\n{}\n", lines.join("\n"))
    } else {
        String::new()
    };

    format!(
        r#"You are a SQLite database assistant.

SCHEMA:
{schema_description}

TODAY: {today}
{history_block}
Use EXACT values from the schema. USER QUERY: "{query}"
{pending_block}
Return JSON:
{{
  "intent": "",
  "operation_type": "",
  "sql": "",
  "insert_table": "",
  "insert_values": {{}},
  "ready_to_insert": false,
  "ask_user": ""
}}

operation_type "read" = questions/lookups/listing. "insert" = adding/creating/booking/ordering.

READ: write valid SQLite SELECT SQL. Use LIKE '%x%' for text search. Always LIMIT 20. Set sql, leave insert_* empty.

INSERT rules:
- Only collect fields the user would naturally know: names, dates, times, quantities, descriptions.
- NEVER include system fields in insert_values — identify them by these patterns:
    * Any field whose name ends with "_id" — these are system-generated keys
    * Any field named: status, source, created_at, updated_at, created, updated — set by the system
    * Any monetary field: amount, price, cost, rate, fee, total — looked up or calculated by the system
- If a person's name was provided but does NOT clearly match any name in the schema values, set ready_to_insert=false and ask_user="Did you mean [closest match]? Please confirm the name."
- Set ready_to_insert=true only when all USER-FACING required fields have values.
- If any user-facing field is missing, set ready_to_insert=false and write a short, friendly ask_user.
- Dates → YYYY-MM-DD (today={today}). Leave sql empty for inserts."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_pending_block_when_insert_in_progress() {
        let pending = PendingInsert {
            table: "bookings".to_string(),
            insert_values: std::collections::HashMap::from([(
                "name".to_string(),
                Value::String("".to_string()),
            )]),
        };
        let prompt = build_plan_prompt("my name is Ada", &[], Some(&pending), "Tables:\n  bookings(name TEXT)");
        assert!(prompt.contains("INSERT IN PROGRESS"));
        assert!(prompt.contains("MISSING"));
    }

    #[test]
    fn prompt_includes_recent_history_when_no_pending() {
        let history = vec![Exchange::new("hi", "hello there")];
        let prompt = build_plan_prompt("book a slot", &history, None, "Tables:\n");
        assert!(prompt.contains("CONVERSATION HISTORY"));
        assert!(prompt.contains("hello there"));
    }
}

//! The structured operation plan a planning call produces, and the partial
//! insert that can span multiple turns via `session.variables["pending_booking"]`
//! (the glossary's "pending booking").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Read,
    Insert,
}

impl Default for OperationType {
    fn default() -> Self {
        Self::Read
    }
}

/// One planning call's output: either a read (`sql` populated) or an insert
/// in progress (`insert_table`/`insert_values`/`ready_to_insert`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryPlan {
    #[serde(default)]
    pub intent: String,
    #[serde(default, rename = "operation_type")]
    pub operation_type: OperationType,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub insert_table: String,
    #[serde(default)]
    pub insert_values: HashMap<String, Value>,
    #[serde(default)]
    pub ready_to_insert: bool,
    #[serde(default)]
    pub ask_user: Option<String>,
}

impl QueryPlan {
    /// A degraded plan used when the planning call fails to produce valid
    /// JSON; falls back to a read with no SQL, which `execute_read` treats
    /// as zero rows rather than erroring the whole turn.
    pub fn fallback() -> Self {
        Self { intent: "error".to_string(), operation_type: OperationType::Read, ..Default::default() }
    }

    /// Merges fields already collected from a prior turn's pending insert
    /// into this turn's plan: only fills fields this plan left empty.
    pub fn merge_pending(&mut self, pending: &PendingInsert) {
        for (key, value) in &pending.insert_values {
            self.insert_values.entry(key.clone()).or_insert_with(|| value.clone());
        }
        if self.insert_table.is_empty() {
            self.insert_table = pending.table.clone();
        }
    }
}

/// The carried-over state for a multi-turn insert (§3 "pending booking"),
/// stored in `Session::variables` under the key `pending_booking`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInsert {
    pub table: String,
    pub insert_values: HashMap<String, Value>,
}

pub const PENDING_KEY: &str = "pending_booking";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_read_plan_json() {
        let json = r#"{"intent":"price_lookup","operation_type":"read","sql":"SELECT * FROM prices LIMIT 20"}"#;
        let plan: QueryPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.operation_type, OperationType::Read);
        assert_eq!(plan.sql.as_deref(), Some("SELECT * FROM prices LIMIT 20"));
    }

    #[test]
    fn merge_pending_fills_only_missing_fields() {
        let mut plan = QueryPlan {
            operation_type: OperationType::Insert,
            insert_values: HashMap::from([("name".to_string(), Value::String("Ada".to_string()))]),
            ..Default::default()
        };
        let pending = PendingInsert {
            table: "bookings".to_string(),
            insert_values: HashMap::from([
                ("name".to_string(), Value::String("stale".to_string())),
                ("date".to_string(), Value::String("2026-07-30".to_string())),
            ]),
        };
        plan.merge_pending(&pending);
        assert_eq!(plan.insert_table, "bookings");
        assert_eq!(plan.insert_values["name"], Value::String("Ada".to_string()));
        assert_eq!(plan.insert_values["date"], Value::String("2026-07-30".to_string()));
    }
}

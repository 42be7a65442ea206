//! Executes a `QueryPlan` against the SQLite database: a `SELECT` for
//! reads, a parameterized `INSERT` for inserts. One connection per call,
//! mirroring `sqlite_agent_service.py`'s "connections are opened/closed per
//! query" — agent-mode turns are infrequent enough that pooling would be
//! premature.

use std::path::Path;

use chrono::Utc;
use rusqlite::{types::Value as SqlValue, Connection};
use serde_json::{Map, Value};

use crate::plan::QueryPlan;
use crate::AgentError;

/// Runs a read-only `SELECT` and maps each row to a JSON object keyed by
/// column name. An empty or missing `sql` yields zero rows rather than an
/// error — matching the planner's fallback plan.
pub fn execute_read(db_path: &Path, sql: Option<&str>) -> Result<Vec<Value>, AgentError> {
    let Some(sql) = sql.filter(|s| !s.trim().is_empty()) else {
        return Ok(Vec::new());
    };

    let conn = Connection::open(db_path)?;
    let mut stmt = conn.prepare(sql)?;
    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let rows = stmt.query_map([], |row| {
        let mut object = Map::new();
        for (i, name) in column_names.iter().enumerate() {
            let value = row.get::<_, SqlValue>(i)?;
            object.insert(name.clone(), sql_value_to_json(value));
        }
        Ok(Value::Object(object))
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Inserts `plan.insert_values` (plus system-assigned defaults) into
/// `plan.insert_table`. Returns the full document that was written, for
/// the planner's confirmation call.
pub fn execute_insert(db_path: &Path, plan: &QueryPlan) -> Result<Value, AgentError> {
    if plan.insert_table.is_empty() || plan.insert_values.is_empty() {
        return Err(AgentError::Database("missing table or values for insert".to_string()));
    }

    let mut values = plan.insert_values.clone();
    values.entry("status".to_string()).or_insert_with(|| Value::String("confirmed".to_string()));
    values
        .entry("created_at".to_string())
        .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
    values.entry("source".to_string()).or_insert_with(|| Value::String("voice".to_string()));

    let columns: Vec<&String> = values.keys().collect();
    let cols_sql = columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!("INSERT INTO {} ({cols_sql}) VALUES ({placeholders})", plan.insert_table);

    let params: Vec<SqlValue> = columns.iter().map(|c| json_value_to_sql(&values[*c])).collect();

    let conn = Connection::open(db_path)?;
    conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;

    Ok(Value::Object(values.into_iter().collect()))
}

fn sql_value_to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Number(i.into()),
        SqlValue::Real(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(b) => Value::String(base64_lite(&b)),
    }
}

fn json_value_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Blob columns are rare in a voice-agent schema; render them as a short
/// textual placeholder rather than pulling in a base64 dependency just for
/// this path.
fn base64_lite(bytes: &[u8]) -> String {
    format!("<blob:{} bytes>", bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::OperationType;
    use std::collections::HashMap;

    fn seed_db() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        let conn = Connection::open(file.path()).unwrap();
        conn.execute_batch(
            "CREATE TABLE bookings (id INTEGER PRIMARY KEY, name TEXT, date TEXT, status TEXT, created_at TEXT, source TEXT);",
        )
        .unwrap();
        file
    }

    #[test]
    fn read_with_no_sql_returns_empty() {
        let db = seed_db();
        let rows = execute_read(db.path(), None).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn insert_applies_system_defaults_and_persists() {
        let db = seed_db();
        let plan = QueryPlan {
            operation_type: OperationType::Insert,
            insert_table: "bookings".to_string(),
            insert_values: HashMap::from([
                ("name".to_string(), Value::String("Ada".to_string())),
                ("date".to_string(), Value::String("2026-08-01".to_string())),
            ]),
            ready_to_insert: true,
            ..Default::default()
        };
        let document = execute_insert(db.path(), &plan).unwrap();
        assert_eq!(document["status"], Value::String("confirmed".to_string()));
        assert_eq!(document["source"], Value::String("voice".to_string()));

        let rows = execute_read(db.path(), Some("SELECT name, date FROM bookings")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], Value::String("Ada".to_string()));
    }

    #[test]
    fn insert_without_table_errors() {
        let db = seed_db();
        let plan = QueryPlan::fallback();
        assert!(execute_insert(db.path(), &plan).is_err());
    }
}

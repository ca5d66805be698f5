//! Shared fixtures: a scripted in-memory transport plus the user/userGroup
//! schema pair most suites exercise.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use restmap::prelude::*;

/// A transport that replays queued row sets and records every call it
/// receives, so suites can assert both the results and the exact statement
/// sequence.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: VecDeque<Vec<Record>>,
    pub statements: Vec<String>,
    in_tx: bool,
}

impl ScriptedTransport {
    /// Queue the row set returned by the next unanswered `execute`.
    pub fn push_rows(&mut self, rows: Vec<Value>) {
        self.responses.push_back(rows.into_iter().map(row).collect());
    }

    /// The SQL statements executed so far, call markers excluded.
    pub fn sql(&self) -> Vec<&str> {
        self.statements
            .iter()
            .map(String::as_str)
            .filter(|s| !matches!(*s, "OPEN" | "CLOSE" | "BEGIN" | "COMMIT" | "ROLLBACK"))
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self) -> Result<()> {
        self.statements.push("OPEN".to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.statements.push("CLOSE".to_string());
    }

    fn execute(&mut self, sql: &str) -> Result<Vec<Record>> {
        self.statements.push(sql.to_string());
        Ok(self.responses.pop_front().unwrap_or_default())
    }

    fn begin(&mut self) -> Result<()> {
        if self.in_tx {
            return Err(Error::usage("transaction already open"));
        }
        self.in_tx = true;
        self.statements.push("BEGIN".to_string());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.in_tx = false;
        self.statements.push("COMMIT".to_string());
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.in_tx = false;
        self.statements.push("ROLLBACK".to_string());
        Ok(())
    }
}

/// Build a scripted transport preloaded with response row sets, in order.
pub fn scripted(responses: Vec<Vec<Value>>) -> Arc<Mutex<ScriptedTransport>> {
    let mut transport = ScriptedTransport::default();
    for rows in responses {
        transport.push_rows(rows);
    }
    Arc::new(Mutex::new(transport))
}

/// Convert a JSON object literal into a record.
pub fn row(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture rows must be objects, got {other}"),
    }
}

pub fn user_schema() -> SchemaDescriptor {
    SchemaDescriptor::new("user", "UserTable")
        .column("name", ColumnType::String)
        .column("hidden", ColumnType::Boolean)
        .belongs_to("group", BelongsToLink::to("userGroup").fk_column("GrpID"))
        .finish()
        .expect("user schema")
}

pub fn group_schema() -> SchemaDescriptor {
    SchemaDescriptor::new("userGroup", "GroupTable")
        .column("name", ColumnType::String)
        .has_many("users", HasManyLink::to("user", "GrpID"))
        .finish()
        .expect("userGroup schema")
}

/// The standard two-entity registry over a scripted transport.
pub fn registry(transport: Arc<Mutex<ScriptedTransport>>) -> Registry {
    Registry::builder(transport)
        .register(user_schema())
        .register(group_schema())
        .build()
        .expect("registry")
}

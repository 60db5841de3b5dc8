//! SQLite-backed datastore adapter.
//!
//! # Responsibility
//! - Persist records as JSON bodies in the migrated `records` table.
//! - Allocate integer identifiers per kind for new records.
//!
//! # Invariants
//! - Identifier allocation and insert happen in one transaction.
//! - Values round-trip through JSON, so timestamps come back as ISO-8601
//!   text; equality filters are normalized the same way before matching.

use crate::db::{open_db, open_db_in_memory};
use crate::model::kind::Kind;
use crate::model::value::{properties_from_json, properties_to_json, Conditions, Properties, Value};
use crate::store::{Datastore, Record, StoreError, StoreResult, ID_FIELD};
use log::debug;
use rusqlite::{params, Connection};
use std::path::Path;

/// Datastore over one owned SQLite connection.
pub struct SqliteDatastore {
    conn: Connection,
}

impl SqliteDatastore {
    /// Wraps a connection that already has migrations applied.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn upsert(&self, kind: &Kind, id: &Value, properties: &Properties) -> StoreResult<()> {
        let body = encode_body(properties)?;
        self.conn.execute(
            "INSERT INTO records (kind, id, body) VALUES (?1, ?2, ?3)
             ON CONFLICT (kind, id) DO UPDATE SET
                body = excluded.body,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![kind.as_str(), id_key(id), body],
        )?;
        Ok(())
    }
}

impl Datastore for SqliteDatastore {
    fn put(&self, kind: &Kind, properties: &Properties) -> StoreResult<Option<Value>> {
        if let Some(id) = properties.get(ID_FIELD).filter(|id| !id.is_null()) {
            let tx = self.conn.unchecked_transaction()?;
            if let Some(n) = id.as_i64() {
                // Keep the sequence ahead of caller-chosen integer ids.
                tx.execute(
                    "INSERT INTO kind_sequences (kind, last_id) VALUES (?1, ?2)
                     ON CONFLICT (kind) DO UPDATE SET last_id = MAX(last_id, excluded.last_id);",
                    params![kind.as_str(), n],
                )?;
            }
            self.upsert(kind, id, properties)?;
            tx.commit()?;
            debug!("event=store_put module=store status=ok backend=sqlite kind={kind} assigned=false");
            return Ok(None);
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO kind_sequences (kind, last_id) VALUES (?1, 1)
             ON CONFLICT (kind) DO UPDATE SET last_id = last_id + 1;",
            [kind.as_str()],
        )?;
        let next: i64 = tx.query_row(
            "SELECT last_id FROM kind_sequences WHERE kind = ?1;",
            [kind.as_str()],
            |row| row.get(0),
        )?;
        let id = Value::Int(next);
        let mut stored = properties.clone();
        stored.insert(ID_FIELD.to_string(), id.clone());
        self.upsert(kind, &id, &stored)?;
        tx.commit()?;

        debug!("event=store_put module=store status=ok backend=sqlite kind={kind} assigned=true");
        Ok(Some(id))
    }

    fn find(&self, kind: &Kind, id: &Value) -> StoreResult<Option<Record>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM records WHERE kind = ?1 AND id = ?2;")?;
        let mut rows = stmt.query(params![kind.as_str(), id_key(id)])?;
        match rows.next()? {
            Some(row) => {
                let body: String = row.get("body")?;
                Ok(Some(Record::new(kind.clone(), decode_body(&body)?)))
            }
            None => Ok(None),
        }
    }

    fn find_custom(&self, kind: &Kind, conditions: &Conditions) -> StoreResult<Vec<Record>> {
        let normalized: Conditions = conditions
            .iter()
            .map(|(field, value)| (field.clone(), Value::from(value.to_json())))
            .collect();

        let mut stmt = self
            .conn
            .prepare("SELECT body FROM records WHERE kind = ?1 ORDER BY rowid ASC;")?;
        let mut rows = stmt.query([kind.as_str()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let body: String = row.get("body")?;
            let record = Record::new(kind.clone(), decode_body(&body)?);
            if record.matches(&normalized) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// Canonical text key for an identifier; keeps `1` and `"1"` distinct.
fn id_key(id: &Value) -> String {
    id.to_json().to_string()
}

fn encode_body(properties: &Properties) -> StoreResult<String> {
    serde_json::to_string(&properties_to_json(properties))
        .map_err(|err| StoreError::Serialization(err.to_string()))
}

fn decode_body(body: &str) -> StoreResult<Properties> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|err| StoreError::InvalidData(format!("record body is not JSON: {err}")))?;
    properties_from_json(json)
        .ok_or_else(|| StoreError::InvalidData("record body is not a JSON object".to_string()))
}

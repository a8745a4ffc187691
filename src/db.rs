use crate::error::{RejectionReason, StoreError};
use crate::store::{AcceptanceOutcome, AgentCounters, TransactionRecord, TransactionStore};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Audit trail entry. Never carries OCR text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Accepted transactions: reference_id is the at-most-once key
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tx_uuid TEXT UNIQUE NOT NULL,
            reference_id TEXT UNIQUE NOT NULL,
            amount TEXT NOT NULL,
            receiver_bank TEXT NOT NULL,
            timestamp TEXT,
            agent_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Agent outcome counters
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS agents (
            agent_id TEXT PRIMARY KEY,
            successful_count INTEGER NOT NULL DEFAULT 0,
            unsuccessful_count INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_agent ON transactions(agent_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> rusqlite::Result<()> {
    let data_json = event.data.to_string();

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> rusqlite::Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| conversion_error(1, e))?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| conversion_error(5, e))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn insert_record(conn: &Connection, record: &TransactionRecord) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO transactions (
            tx_uuid, reference_id, amount, receiver_bank, timestamp, agent_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.id,
            record.reference_id,
            record.amount.to_string(),
            record.receiver_bank,
            record.timestamp.map(|ts| ts.format(TIMESTAMP_FORMAT).to_string()),
            record.agent_id,
            record.created_at.to_rfc3339(),
        ],
    )
}

fn record_from_row(row: &Row) -> rusqlite::Result<TransactionRecord> {
    let amount: String = row.get(2)?;
    let timestamp: Option<String> = row.get(4)?;
    let created_at: String = row.get(6)?;

    Ok(TransactionRecord {
        id: row.get(0)?,
        reference_id: row.get(1)?,
        amount: Decimal::from_str(&amount).map_err(|e| conversion_error(2, e))?,
        receiver_bank: row.get(3)?,
        timestamp: timestamp
            .map(|ts| NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT))
            .transpose()
            .map_err(|e| conversion_error(4, e))?,
        agent_id: row.get(5)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| conversion_error(6, e))?
            .with_timezone(&Utc),
    })
}

const RECORD_COLUMNS: &str =
    "tx_uuid, reference_id, amount, receiver_bank, timestamp, agent_id, created_at";

/// Single-statement counter bump. Never read-modify-write.
fn bump_counter(conn: &Connection, agent_id: &str, successful: bool) -> rusqlite::Result<()> {
    let sql = if successful {
        "INSERT INTO agents (agent_id, successful_count, unsuccessful_count) VALUES (?1, 1, 0)
         ON CONFLICT(agent_id) DO UPDATE SET successful_count = successful_count + 1"
    } else {
        "INSERT INTO agents (agent_id, successful_count, unsuccessful_count) VALUES (?1, 0, 1)
         ON CONFLICT(agent_id) DO UPDATE SET unsuccessful_count = unsuccessful_count + 1"
    };
    conn.execute(sql, params![agent_id])?;
    Ok(())
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// SQLite-backed TransactionStore.
///
/// One connection behind a mutex: every store call is serialized, and
/// record_acceptance additionally runs inside an IMMEDIATE transaction so
/// the uniqueness check, the insert and the counter bump commit together.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn).context("Failed to initialize schema")?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// Audit events for an entity ("transaction" by reference id, "agent" by id)
    pub fn events_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<Event>, StoreError> {
        let conn = self.conn.lock()?;
        Ok(get_events_for_entity(&conn, entity_type, entity_id)?)
    }

    pub fn count_transactions(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock()?;
        let count = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl TransactionStore for SqliteStore {
    fn get_by_reference(
        &self,
        reference_id: &str,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        let conn = self.conn.lock()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE reference_id = ?1",
                    RECORD_COLUMNS
                ),
                params![reference_id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn insert(&self, record: &TransactionRecord) -> Result<TransactionRecord, StoreError> {
        let conn = self.conn.lock()?;
        insert_record(&conn, record)?;
        Ok(record.clone())
    }

    fn get_agent_counters(&self, agent_id: &str) -> Result<AgentCounters, StoreError> {
        let conn = self.conn.lock()?;
        let counters = conn
            .query_row(
                "SELECT successful_count, unsuccessful_count FROM agents WHERE agent_id = ?1",
                params![agent_id],
                |row| {
                    Ok(AgentCounters {
                        successful_count: row.get::<_, i64>(0)? as u64,
                        unsuccessful_count: row.get::<_, i64>(1)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(counters.unwrap_or_default())
    }

    fn increment_successful(&self, agent_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock()?;
        bump_counter(&conn, agent_id, true)?;
        Ok(())
    }

    fn increment_unsuccessful(
        &self,
        agent_id: &str,
        reason: &RejectionReason,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;

        bump_counter(&tx, agent_id, false)?;
        insert_event(
            &tx,
            &Event::new(
                "unsuccessful_attempt",
                "agent",
                agent_id,
                serde_json::json!({ "reason": reason.code() }),
                agent_id,
            ),
        )?;

        tx.commit()?;
        Ok(())
    }

    fn record_acceptance(
        &self,
        record: &TransactionRecord,
    ) -> Result<AcceptanceOutcome, StoreError> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE reference_id = ?1)",
            params![record.reference_id],
            |row| row.get(0),
        )?;
        if exists {
            debug!(reference_id = %record.reference_id, "acceptance lost to an earlier writer");
            return Ok(AcceptanceOutcome::AlreadyExists);
        }

        insert_record(&tx, record)?;
        bump_counter(&tx, &record.agent_id, true)?;
        insert_event(
            &tx,
            &Event::new(
                "transaction_accepted",
                "transaction",
                &record.reference_id,
                serde_json::json!({
                    "amount": record.amount.to_string(),
                    "receiver_bank": record.receiver_bank,
                    "agent_id": record.agent_id,
                }),
                &record.agent_id,
            ),
        )?;

        tx.commit()?;
        Ok(AcceptanceOutcome::Inserted(record.clone()))
    }

    fn transactions_for_agent(
        &self,
        agent_id: &str,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE agent_id = ?1 ORDER BY created_at DESC, id DESC",
            RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![agent_id], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn create_test_record(reference_id: &str, agent_id: &str) -> TransactionRecord {
        TransactionRecord::new(
            reference_id,
            Decimal::new(5_000_000, 2),
            "GTBank",
            NaiveDate::from_ymd_opt(2025, 7, 12)
                .unwrap()
                .and_hms_opt(10, 24, 9),
            agent_id,
        )
    }

    #[test]
    fn test_unknown_agent_has_zero_counters() {
        let store = SqliteStore::open_in_memory().unwrap();

        let counters = store.get_agent_counters("agent-1").unwrap();

        assert_eq!(counters, AgentCounters::default());
        assert_eq!(counters.total(), 0);
    }

    #[test]
    fn test_increment_counters() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.increment_successful("agent-1").unwrap();
        store
            .increment_unsuccessful("agent-1", &RejectionReason::NoMatch)
            .unwrap();
        store
            .increment_unsuccessful("agent-1", &RejectionReason::InvalidAmount)
            .unwrap();

        let counters = store.get_agent_counters("agent-1").unwrap();
        assert_eq!(counters.successful_count, 1);
        assert_eq!(counters.unsuccessful_count, 2);

        let events = store.events_for_entity("agent", "agent-1").unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.event_type == "unsuccessful_attempt"));
        let mut reasons: Vec<&str> = events
            .iter()
            .filter_map(|e| e.data["reason"].as_str())
            .collect();
        reasons.sort();
        assert_eq!(reasons, vec!["invalid_amount", "no_match"]);
    }

    #[test]
    fn test_record_acceptance_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = create_test_record("000001250712074117444574752341", "agent-1");

        let first = store.record_acceptance(&record).unwrap();
        let second = store
            .record_acceptance(&create_test_record("000001250712074117444574752341", "agent-2"))
            .unwrap();

        assert_eq!(first, AcceptanceOutcome::Inserted(record.clone()));
        assert_eq!(second, AcceptanceOutcome::AlreadyExists);
        assert_eq!(store.count_transactions().unwrap(), 1);
        assert_eq!(store.get_agent_counters("agent-1").unwrap().successful_count, 1);
        assert_eq!(store.get_agent_counters("agent-2").unwrap(), AgentCounters::default());

        let stored = store
            .get_by_reference("000001250712074117444574752341")
            .unwrap()
            .unwrap();
        assert_eq!(stored, record);

        let events = store
            .events_for_entity("transaction", "000001250712074117444574752341")
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "transaction_accepted");
        assert_eq!(events[0].data["amount"], "50000.00");
    }

    #[test]
    fn test_plain_insert_conflicts_on_duplicate_reference() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.insert(&create_test_record("REF0000000001", "agent-1")).unwrap();
        let err = store
            .insert(&create_test_record("REF0000000001", "agent-1"))
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        // Plain insert does not touch counters
        assert_eq!(store.get_agent_counters("agent-1").unwrap().successful_count, 0);
    }

    #[test]
    fn test_transactions_for_agent() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.record_acceptance(&create_test_record("REF0000000001", "agent-1")).unwrap();
        store.record_acceptance(&create_test_record("REF0000000002", "agent-2")).unwrap();
        store.record_acceptance(&create_test_record("REF0000000003", "agent-1")).unwrap();

        let records = store.transactions_for_agent("agent-1").unwrap();
        let refs: Vec<&str> = records.iter().map(|r| r.reference_id.as_str()).collect();

        assert_eq!(refs.len(), 2);
        assert!(refs.contains(&"REF0000000001"));
        assert!(refs.contains(&"REF0000000003"));
        assert!(store.transactions_for_agent("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_record_without_timestamp_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut record = create_test_record("REF0000000009", "agent-1");
        record.timestamp = None;

        store.record_acceptance(&record).unwrap();

        let stored = store.get_by_reference("REF0000000009").unwrap().unwrap();
        assert_eq!(stored.timestamp, None);
        assert_eq!(stored.amount, Decimal::from(50_000));
    }

    #[test]
    fn test_concurrent_acceptance_yields_one_insert() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let record = create_test_record("REF_RACE_000001", &format!("agent-{}", i % 2));
                    barrier.wait();
                    store.record_acceptance(&record).unwrap()
                })
            })
            .collect();

        let outcomes: Vec<AcceptanceOutcome> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let inserted = outcomes
            .iter()
            .filter(|o| matches!(o, AcceptanceOutcome::Inserted(_)))
            .count();
        assert_eq!(inserted, 1);

        let total = store.get_agent_counters("agent-0").unwrap().successful_count
            + store.get_agent_counters("agent-1").unwrap().successful_count;
        assert_eq!(total, 1);
        assert_eq!(store.count_transactions().unwrap(), 1);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipts.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.record_acceptance(&create_test_record("REF0000000042", "agent-1")).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.get_by_reference("REF0000000042").unwrap().is_some());
        assert_eq!(store.get_agent_counters("agent-1").unwrap().successful_count, 1);
    }
}

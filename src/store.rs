// 🗄️ Transaction Store - persistence capability consumed by the engine
//
// The engine never talks to a database directly. It sees this trait, so the
// SQLite store (db.rs) can be swapped for anything that can honour the one
// hard requirement: record_acceptance is atomic and unique per reference id.

use crate::error::{RejectionReason, StoreError};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// RECORDS
// ============================================================================

/// An accepted receipt. At most one exists per reference id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Stable identity (UUID v4)
    pub id: String,
    pub reference_id: String,
    pub amount: Decimal,
    pub receiver_bank: String,
    /// Business time printed on the receipt, when readable
    pub timestamp: Option<NaiveDateTime>,
    pub agent_id: String,
    /// System time: when we accepted it
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(
        reference_id: &str,
        amount: Decimal,
        receiver_bank: &str,
        timestamp: Option<NaiveDateTime>,
        agent_id: &str,
    ) -> Self {
        TransactionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            reference_id: reference_id.to_string(),
            amount,
            receiver_bank: receiver_bank.to_string(),
            timestamp,
            agent_id: agent_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Per-agent outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCounters {
    pub successful_count: u64,
    pub unsuccessful_count: u64,
}

impl AgentCounters {
    pub fn total(&self) -> u64 {
        self.successful_count + self.unsuccessful_count
    }
}

/// Result of the atomic insert-and-count operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptanceOutcome {
    /// Record written and successful_count incremented, together
    Inserted(TransactionRecord),

    /// Another call already holds this reference id; nothing was written
    AlreadyExists,
}

// ============================================================================
// STORE TRAIT
// ============================================================================

pub trait TransactionStore: Send + Sync {
    fn get_by_reference(&self, reference_id: &str)
        -> Result<Option<TransactionRecord>, StoreError>;

    /// Insert a record on its own. Fails with Conflict on a duplicate
    /// reference id.
    fn insert(&self, record: &TransactionRecord) -> Result<TransactionRecord, StoreError>;

    /// Counters for an agent; an agent never seen reads as zeroes
    fn get_agent_counters(&self, agent_id: &str) -> Result<AgentCounters, StoreError>;

    fn increment_successful(&self, agent_id: &str) -> Result<(), StoreError>;

    /// Count a failed attempt; `reason` goes on the audit trail
    fn increment_unsuccessful(
        &self,
        agent_id: &str,
        reason: &RejectionReason,
    ) -> Result<(), StoreError>;

    /// Insert `record` and increment its agent's successful_count as one
    /// unit. Either both happen or neither does, and concurrent calls for
    /// the same reference id yield exactly one `Inserted`.
    fn record_acceptance(&self, record: &TransactionRecord)
        -> Result<AcceptanceOutcome, StoreError>;

    /// Accepted records for an agent, newest first
    fn transactions_for_agent(&self, agent_id: &str)
        -> Result<Vec<TransactionRecord>, StoreError>;
}

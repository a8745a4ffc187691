// ⚖️ Reconciliation Engine - Does the claimed payment exist, exactly once?
//
// Order of judgement:
//   1. missing fields      → Rejected, nothing mutated
//   2. invalid amount      → Rejected, nothing mutated
//   3. invalid date        → Rejected, nothing mutated
//   4. not in catalog      → Rejected(NoMatch), unsuccessful_count += 1
//   5. already recorded    → AlreadyRecorded, nothing mutated
//      otherwise           → Accepted, record + successful_count in one unit

use crate::catalog::ReferenceCatalog;
use crate::entities::BankRegistry;
use crate::error::{RejectionReason, StoreError};
use crate::extractor::ExtractedFields;
use crate::normalizer::{DateTimeNormalizer, NormalizedTransaction};
use crate::store::{AcceptanceOutcome, AgentCounters, TransactionRecord, TransactionStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

// ============================================================================
// RECONCILIATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationResult {
    /// Matched the catalog and recorded for the first time
    Accepted(TransactionRecord),

    /// Matched the catalog, but this reference id was already recorded
    AlreadyRecorded { reference_id: String },

    /// Refused; see the reason
    Rejected(RejectionReason),
}

impl ReconciliationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ReconciliationResult::Accepted(_))
    }

    /// Money exists in the catalog, whether or not this call recorded it
    pub fn is_confirmed(&self) -> bool {
        !matches!(self, ReconciliationResult::Rejected(_))
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            ReconciliationResult::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    /// Short code for logs
    pub fn code(&self) -> &'static str {
        match self {
            ReconciliationResult::Accepted(_) => "accepted",
            ReconciliationResult::AlreadyRecorded { .. } => "already_recorded",
            ReconciliationResult::Rejected(reason) => reason.code(),
        }
    }

    pub fn summary(&self) -> String {
        match self {
            ReconciliationResult::Accepted(record) => format!(
                "Accepted: {} from {} for {} recorded",
                record.reference_id, record.receiver_bank, record.amount
            ),
            ReconciliationResult::AlreadyRecorded { reference_id } => {
                format!("Already recorded: {}", reference_id)
            }
            ReconciliationResult::Rejected(reason) => format!("Rejected: {}", reason),
        }
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    catalog: Arc<dyn ReferenceCatalog>,
    store: Arc<dyn TransactionStore>,
    banks: BankRegistry,
    normalizer: DateTimeNormalizer,
}

impl ReconciliationEngine {
    pub fn new(catalog: Arc<dyn ReferenceCatalog>, store: Arc<dyn TransactionStore>) -> Self {
        ReconciliationEngine {
            catalog,
            store,
            banks: BankRegistry::new(),
            normalizer: DateTimeNormalizer::new(),
        }
    }

    /// Use a custom bank registry for canonical receiver names
    pub fn with_banks(mut self, banks: BankRegistry) -> Self {
        self.banks = banks;
        self
    }

    /// Judge an extraction on behalf of `agent_id`.
    ///
    /// Rejections come back as `Ok(Rejected(..))`; only store failures
    /// are `Err`.
    pub fn reconcile(
        &self,
        fields: &ExtractedFields,
        agent_id: &str,
    ) -> Result<ReconciliationResult, StoreError> {
        let candidate = match self
            .normalizer
            .normalize_fields(fields, |bank| self.banks.normalize(bank))
        {
            Ok(candidate) => candidate,
            Err(reason) => {
                warn!(agent_id, reason = reason.code(), "receipt failed validation");
                return Ok(ReconciliationResult::Rejected(reason));
            }
        };

        self.reconcile_normalized(&candidate, agent_id)
    }

    /// Steps 4-5 for a candidate that already passed validation
    pub fn reconcile_normalized(
        &self,
        candidate: &NormalizedTransaction,
        agent_id: &str,
    ) -> Result<ReconciliationResult, StoreError> {
        let reference_id = candidate.reference_id.as_str();

        if !self.catalog.lookup(reference_id, candidate.amount)? {
            let reason = RejectionReason::NoMatch;
            self.store.increment_unsuccessful(agent_id, &reason)?;
            warn!(agent_id, reference_id, "no catalog match");
            return Ok(ReconciliationResult::Rejected(reason));
        }

        if self.store.get_by_reference(reference_id)?.is_some() {
            info!(agent_id, reference_id, "reference already recorded");
            return Ok(already_recorded(reference_id));
        }

        let record = TransactionRecord::new(
            reference_id,
            candidate.amount,
            &candidate.receiver_bank,
            candidate.timestamp,
            agent_id,
        );

        match self.store.record_acceptance(&record)? {
            AcceptanceOutcome::Inserted(record) => {
                info!(
                    agent_id,
                    reference_id,
                    amount = %record.amount,
                    receiver_bank = %record.receiver_bank,
                    "receipt accepted"
                );
                Ok(ReconciliationResult::Accepted(record))
            }
            AcceptanceOutcome::AlreadyExists => {
                info!(agent_id, reference_id, "reference recorded concurrently");
                Ok(already_recorded(reference_id))
            }
        }
    }

    pub fn agent_counters(&self, agent_id: &str) -> Result<AgentCounters, StoreError> {
        self.store.get_agent_counters(agent_id)
    }

    pub fn agent_transactions(&self, agent_id: &str) -> Result<Vec<TransactionRecord>, StoreError> {
        self.store.transactions_for_agent(agent_id)
    }
}

fn already_recorded(reference_id: &str) -> ReconciliationResult {
    ReconciliationResult::AlreadyRecorded {
        reference_id: reference_id.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

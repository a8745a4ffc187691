// 📒 Reference Catalog - the trusted source receipts are checked against
//
// Injected into the engine so the source of truth (a bank feed, a CSV
// export, a test fixture) can change without touching reconciliation.

use crate::error::StoreError;
use crate::normalizer::parse_amount;
use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// A trusted transaction record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCatalogEntry {
    pub reference_id: String,
    pub amount: Decimal,
    pub receiver_bank: String,
}

impl ReferenceCatalogEntry {
    pub fn new(reference_id: &str, amount: Decimal, receiver_bank: &str) -> Self {
        ReferenceCatalogEntry {
            reference_id: reference_id.to_string(),
            amount,
            receiver_bank: receiver_bank.to_string(),
        }
    }

    /// Exact reference id, numerically equal amount
    pub fn matches(&self, reference_id: &str, amount: Decimal) -> bool {
        self.reference_id == reference_id && self.amount == amount
    }
}

pub trait ReferenceCatalog: Send + Sync {
    /// Is there a trusted transaction with this reference id and amount?
    fn lookup(&self, reference_id: &str, amount: Decimal) -> Result<bool, StoreError>;
}

// ============================================================================
// IN-MEMORY CATALOG
// ============================================================================

/// Catalog held in memory, shareable between engines
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    entries: Arc<RwLock<Vec<ReferenceCatalogEntry>>>,
}

/// CSV row as exported: amounts may carry thousands separators
#[derive(Debug, Deserialize)]
struct CatalogRow {
    reference_id: String,
    amount: String,
    receiver_bank: String,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<ReferenceCatalogEntry>) -> Self {
        InMemoryCatalog {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Load a catalog from a CSV with headers `reference_id,amount,receiver_bank`
    pub fn load_csv(csv_path: &Path) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(csv_path)
            .with_context(|| format!("Failed to open catalog: {}", csv_path.display()))?;

        let mut entries = Vec::new();
        for (line, result) in rdr.deserialize().enumerate() {
            let row: CatalogRow = result
                .with_context(|| format!("Failed to parse catalog line {}", line + 2))?;

            let amount = parse_amount(&row.amount).map_err(|reason| {
                anyhow!("Catalog line {}: {}", line + 2, reason)
            })?;

            entries.push(ReferenceCatalogEntry {
                reference_id: row.reference_id.trim().to_string(),
                amount,
                receiver_bank: row.receiver_bank.trim().to_string(),
            });
        }

        Ok(Self::with_entries(entries))
    }

    pub fn add(&self, entry: ReferenceCatalogEntry) -> Result<(), StoreError> {
        self.entries.write()?.push(entry);
        Ok(())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl ReferenceCatalog for InMemoryCatalog {
    fn lookup(&self, reference_id: &str, amount: Decimal) -> Result<bool, StoreError> {
        let entries = self.entries.read()?;
        Ok(entries.iter().any(|e| e.matches(reference_id, amount)))
    }
}

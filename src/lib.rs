// Receipt Reconciliation - Core Library
// Reads payment receipts, checks them against trusted records, and records
// each accepted transaction exactly once per reference id.

pub mod catalog;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod normalizer;
pub mod ocr;
pub mod reconciliation;
pub mod scanner;
pub mod store;

// Re-export commonly used types
pub use catalog::{InMemoryCatalog, ReferenceCatalog, ReferenceCatalogEntry};
pub use config::{Config, OcrConfig};
pub use db::{Event, SqliteStore};
pub use entities::{Bank, BankMatch, BankRegistry};
pub use error::{RejectionReason, ScanError, StoreError};
pub use extractor::{ExtractedFields, TextFieldExtractor};
pub use logging::{init_logger, text_digest};
pub use normalizer::{parse_amount, DateTimeNormalizer, NormalizedTransaction};
pub use ocr::{should_invert, TextRecognizer};
pub use reconciliation::{ReconciliationEngine, ReconciliationResult};
pub use scanner::{ReceiptScanner, ScanOutcome};
pub use store::{AcceptanceOutcome, AgentCounters, TransactionRecord, TransactionStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

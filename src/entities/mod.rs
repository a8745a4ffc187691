// Entity Models
//
// Fixed reference data the extractor and engine normalize against.

pub mod bank;

pub use bank::{Bank, BankMatch, BankRegistry};

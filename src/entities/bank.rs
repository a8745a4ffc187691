// 🏦 Bank Entity - Receiver bank alias catalog
//
// Receipts print the same bank many ways:
// - "GTBank", "Guaranty Trust", "Guaranty Trust Bank" → one bank
// - "Stanbic", "Stanbic IBTC" → one bank
//
// The registry owns the alias list, compiles it into a single
// case-insensitive matcher, and maps whatever matched back to the
// canonical name that gets persisted.

use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// BANK ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bank {
    /// Name persisted on accepted transactions
    pub canonical_name: String,

    /// Alternative spellings printed on receipts
    /// Example: ["Guaranty Trust", "Guaranty Trust Bank"]
    pub aliases: Vec<String>,
}

impl Bank {
    pub fn new(canonical_name: &str) -> Self {
        Bank {
            canonical_name: canonical_name.to_string(),
            aliases: Vec::new(),
        }
    }

    /// Builder: add an alias (ignored if already known)
    pub fn alias(mut self, alias: &str) -> Self {
        let known = self
            .all_names()
            .iter()
            .any(|name| name.eq_ignore_ascii_case(alias));
        if !known {
            self.aliases.push(alias.to_string());
        }
        self
    }

    /// Get all names (canonical + aliases)
    pub fn all_names(&self) -> Vec<String> {
        let mut names = vec![self.canonical_name.clone()];
        names.extend(self.aliases.clone());
        names
    }

    /// Exact, case-insensitive name check (whitespace-insensitive)
    pub fn answers_to(&self, name: &str) -> bool {
        let wanted = collapse_whitespace(name);
        self.all_names()
            .iter()
            .any(|n| n.eq_ignore_ascii_case(&wanted))
    }
}

/// A bank found inside a piece of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankMatch {
    /// Text exactly as printed on the receipt
    pub matched: String,

    /// Canonical name of the bank it belongs to
    pub canonical_name: String,

    /// Byte offset of the match inside the searched text
    pub start: usize,
}

// ============================================================================
// BANK REGISTRY
// ============================================================================

/// Registry of banks a receipt may name as receiver.
///
/// Scan order is leftmost-first in the text; when two aliases start at the
/// same position the longer one wins ("First City Monument Bank" beats
/// "First"). A recipient section naming several banks resolves to whichever
/// appears first.
pub struct BankRegistry {
    banks: Vec<Bank>,
    matcher: Option<Regex>,
}

impl BankRegistry {
    /// Create registry with the default receiver banks
    pub fn new() -> Self {
        let mut registry = BankRegistry::empty();
        registry.register_default_banks();
        registry
    }

    /// Registry with no banks (nothing ever matches)
    pub fn empty() -> Self {
        BankRegistry {
            banks: Vec::new(),
            matcher: None,
        }
    }

    fn register_default_banks(&mut self) {
        let defaults = [
            Bank::new("GTBank")
                .alias("Guaranty Trust")
                .alias("Guaranty Trust Bank"),
            Bank::new("Access Bank").alias("Access"),
            Bank::new("UBA").alias("United Bank for Africa"),
            Bank::new("First Bank").alias("First"),
            Bank::new("Zenith").alias("Zenith Bank"),
            Bank::new("Sterling").alias("Sterling Bank"),
            Bank::new("OPay"),
            Bank::new("Kuda").alias("Kuda Bank"),
            Bank::new("Moniepoint"),
            Bank::new("Fidelity").alias("Fidelity Bank"),
            Bank::new("Ecobank"),
            Bank::new("Union Bank").alias("Union"),
            Bank::new("Keystone").alias("Keystone Bank"),
            Bank::new("Stanbic IBTC").alias("Stanbic"),
            Bank::new("FCMB").alias("First City Monument Bank"),
            Bank::new("Jaiz").alias("Jaiz Bank"),
            Bank::new("Heritage").alias("Heritage Bank"),
            Bank::new("Wema").alias("Wema Bank"),
            Bank::new("Globus").alias("Globus Bank"),
            Bank::new("Suntrust").alias("Suntrust Bank"),
            Bank::new("Parallex").alias("Parallex Bank"),
            Bank::new("Providus").alias("Providus Bank"),
        ];

        for bank in defaults {
            self.register(bank);
        }
    }

    /// Register a bank and recompile the matcher
    pub fn register(&mut self, bank: Bank) {
        self.banks.push(bank);
        self.matcher = Self::compile(&self.banks);
    }

    fn compile(banks: &[Bank]) -> Option<Regex> {
        let mut names: Vec<String> = banks.iter().flat_map(|b| b.all_names()).collect();
        if names.is_empty() {
            return None;
        }

        // Longest first so a longer alias wins at the same start position
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names.dedup();

        let alternation = names
            .iter()
            .map(|name| {
                name.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect::<Vec<_>>()
            .join("|");

        // Escaped literals only, so this cannot fail to compile
        Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).ok()
    }

    /// Find the first bank named anywhere in `text`
    pub fn find_in(&self, text: &str) -> Option<BankMatch> {
        let found = self.matcher.as_ref()?.find(text)?;
        let bank = self.find_by_name(found.as_str())?;

        Some(BankMatch {
            matched: found.as_str().to_string(),
            canonical_name: bank.canonical_name.clone(),
            start: found.start(),
        })
    }

    /// Look up a bank by canonical name or alias
    pub fn find_by_name(&self, name: &str) -> Option<&Bank> {
        self.banks.iter().find(|bank| bank.answers_to(name))
    }

    /// Normalize a printed bank name to its canonical name
    ///
    /// Example: "guaranty trust bank" → "GTBank"
    pub fn normalize(&self, name: &str) -> Option<String> {
        self.find_by_name(name).map(|bank| bank.canonical_name.clone())
    }

    pub fn all_banks(&self) -> &[Bank] {
        &self.banks
    }

    pub fn count(&self) -> usize {
        self.banks.len()
    }
}

impl Default for BankRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_alias_builder_skips_duplicates() {
        let bank = Bank::new("GTBank")
            .alias("Guaranty Trust")
            .alias("guaranty trust")
            .alias("GTBANK");

        assert_eq!(bank.aliases, vec!["Guaranty Trust".to_string()]);
        assert_eq!(bank.all_names().len(), 2);
    }

    #[test]
    fn test_registry_initialization() {
        let registry = BankRegistry::new();

        assert_eq!(registry.count(), 22);
        assert!(registry.find_by_name("opay").is_some());
        assert_eq!(registry.normalize("Kuda Bank"), Some("Kuda".to_string()));
    }

    #[test]
    fn test_find_in_returns_text_as_printed() {
        let registry = BankRegistry::new();

        let found = registry.find_in("Paid to guaranty trust bank today").unwrap();

        assert_eq!(found.matched, "guaranty trust bank");
        assert_eq!(found.canonical_name, "GTBank");
        assert_eq!(found.start, 8);
    }

    #[test]
    fn test_longest_alias_wins_at_same_position() {
        let registry = BankRegistry::new();

        let found = registry
            .find_in("Bank: First City Monument Bank")
            .unwrap();

        assert_eq!(found.canonical_name, "FCMB");
        assert_eq!(found.matched, "First City Monument Bank");
    }

    #[test]
    fn test_leftmost_bank_wins() {
        let registry = BankRegistry::new();

        let found = registry.find_in("Kuda ... then later Zenith").unwrap();

        assert_eq!(found.canonical_name, "Kuda");
    }

    #[test]
    fn test_whole_words_only() {
        let registry = BankRegistry::new();

        // "Reunion" contains "union", "Firstly" contains "first"
        assert!(registry.find_in("Reunion Firstly").is_none());
    }

    #[test]
    fn test_alias_spacing_is_flexible() {
        let registry = BankRegistry::new();

        let found = registry.find_in("Stanbic   IBTC").unwrap();
        assert_eq!(found.canonical_name, "Stanbic IBTC");
        assert_eq!(registry.normalize("stanbic  ibtc"), Some("Stanbic IBTC".to_string()));
    }

    #[test]
    fn test_empty_registry_never_matches() {
        let registry = BankRegistry::empty();
        assert!(registry.find_in("GTBank").is_none());
    }
}

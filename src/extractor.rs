// 🔎 Text Field Extractor - OCR text → receipt fields
//
// OCR output is noisy and unstructured. Each field is pulled out by its own
// pattern; a field that is not found stays None. Extraction never fails.

use crate::entities::BankRegistry;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// PATTERNS
// ============================================================================

/// Optional currency symbol, then digits with optional thousands separators
/// and exactly two fraction digits. Group 1 excludes the symbol. Letters may
/// follow directly ("50,000.00NGN"), a third fraction digit may not.
static AMOUNT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[₦#N$]?\s?(\d{1,3}(?:,?\d{3})*\.\d{2})(?:\D|$)").unwrap());

/// Labelled reference id: at least 10 alphanumerics after the label.
/// The label may be glued to a preceding word ("TxnRef:").
static REFERENCE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:Transaction(?:\s+No\.?|\s+ID)|Ref(?:erence)?)\s*[:\-]?\s*([A-Za-z0-9]{10,})",
    )
    .unwrap()
});

/// "Jul 12th, 2025" | "12/07/2025" | "2025-07-12"
static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}|\d{1,2}[/\-]\d{1,2}[/\-]\d{2,4}|\d{4}[/\-]\d{1,2}[/\-]\d{1,2})",
    )
    .unwrap()
});

/// "10:24", "10:24:09", "7:42 PM"
static TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b\d{1,2}:\d{2}(?::\d{2})?\s?(?:AM|PM)?\b").unwrap());

static RECIPIENT_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Recipient").unwrap());

/// Where a recipient section ends: blank line or the next known label
static SECTION_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\n\s*\n|Sender|Narration|Transaction\s+No").unwrap());

// ============================================================================
// EXTRACTED FIELDS
// ============================================================================

/// Fields found on a receipt, each independently optional.
///
/// Values are kept as printed; parsing into numbers and timestamps happens in
/// the normalizer so that a malformed value can be reported precisely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub amount: Option<String>,
    pub reference_id: Option<String>,
    pub receiver_bank: Option<String>,
    pub date_fragment: Option<String>,
    pub time_fragment: Option<String>,
}

impl ExtractedFields {
    /// Names of mandatory fields that are absent, in a stable order
    pub fn missing_required(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.reference_id.is_none() {
            missing.push("reference_id".to_string());
        }
        if self.amount.is_none() {
            missing.push("amount".to_string());
        }
        if self.receiver_bank.is_none() {
            missing.push("receiver_bank".to_string());
        }
        missing
    }
}

// ============================================================================
// EXTRACTOR
// ============================================================================

pub struct TextFieldExtractor {
    banks: BankRegistry,
}

impl TextFieldExtractor {
    /// Extractor using the default bank alias catalog
    pub fn new() -> Self {
        TextFieldExtractor {
            banks: BankRegistry::new(),
        }
    }

    pub fn with_banks(banks: BankRegistry) -> Self {
        TextFieldExtractor { banks }
    }

    pub fn banks(&self) -> &BankRegistry {
        &self.banks
    }

    pub fn extract(&self, text: &str) -> ExtractedFields {
        ExtractedFields {
            amount: extract_amount(text),
            reference_id: extract_reference_id(text),
            receiver_bank: self.extract_receiver_bank(text),
            date_fragment: extract_date(text),
            time_fragment: extract_time(text),
        }
    }

    /// Receiver bank, searched in the recipient section when there is one
    /// so a sender's bank printed elsewhere is not picked up.
    pub fn extract_receiver_bank(&self, text: &str) -> Option<String> {
        let scope = recipient_section(text).unwrap_or(text);
        self.banks.find_in(scope).map(|m| m.matched)
    }
}

impl Default for TextFieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

pub fn extract_amount(text: &str) -> Option<String> {
    AMOUNT_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn extract_reference_id(text: &str) -> Option<String> {
    REFERENCE_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn extract_date(text: &str) -> Option<String> {
    DATE_PATTERN.find(text).map(|m| m.as_str().to_string())
}

pub fn extract_time(text: &str) -> Option<String> {
    TIME_PATTERN
        .find(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Text from the first "Recipient" label up to (not including) the next
/// section terminator. None when there is no label or it is never closed.
pub fn recipient_section(text: &str) -> Option<&str> {
    let label = RECIPIENT_LABEL.find(text)?;

    // The section holds at least one character after the label
    let body_start = label.end() + text[label.end()..].chars().next()?.len_utf8();
    let end = SECTION_END.find(&text[body_start..])?;

    Some(&text[label.start()..body_start + end.start()])
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const RECEIPT: &str = "Transfer Successful\n\
        ₦50,000.00\n\
        Jul 12th, 2025 10:24:09\n\
        \n\
        Recipient Details\n\
        JOHN DOE\n\
        GTBank | 0123456789\n\
        \n\
        Sender Details\n\
        JANE ROE\n\
        Access Bank\n\
        \n\
        Transaction No: 000001250712074117444574752341\n";

    #[test]
    fn test_extract_full_receipt() {
        let fields = TextFieldExtractor::new().extract(RECEIPT);

        assert_eq!(fields.amount.as_deref(), Some("50,000.00"));
        assert_eq!(
            fields.reference_id.as_deref(),
            Some("000001250712074117444574752341")
        );
        assert_eq!(fields.receiver_bank.as_deref(), Some("GTBank"));
        assert_eq!(fields.date_fragment.as_deref(), Some("Jul 12th, 2025"));
        assert_eq!(fields.time_fragment.as_deref(), Some("10:24:09"));
        assert!(fields.missing_required().is_empty());

        println!("✅ Extracted: {:?}", fields);
    }

    #[test]
    fn test_text_without_amount_leaves_it_unset() {
        let samples = [
            "",
            "hello world",
            "Amount: 50,000",
            "Total 12.5 paid",
            "Ref 123",
            "₦ only",
        ];

        for sample in samples {
            let fields = TextFieldExtractor::new().extract(sample);
            assert_eq!(fields.amount, None, "sample {:?}", sample);
        }
    }

    #[test]
    fn test_amount_variants() {
        assert_eq!(extract_amount("$1,234.56"), Some("1,234.56".to_string()));
        assert_eq!(extract_amount("N 5000.00"), Some("5000.00".to_string()));
        assert_eq!(extract_amount("#250.00 fee"), Some("250.00".to_string()));
        // Three fraction digits is not an amount
        assert_eq!(extract_amount("50.001"), None);
    }

    #[test]
    fn test_amount_followed_by_letters() {
        assert_eq!(
            extract_amount("Amount ₦50,000.00NGN"),
            Some("50,000.00".to_string())
        );
        assert_eq!(
            extract_amount("₦5,000.00Successful"),
            Some("5,000.00".to_string())
        );
        assert_eq!(extract_amount("Total 12.50"), Some("12.50".to_string()));

        let glued = RECEIPT.replace("₦50,000.00", "₦50,000.00NGN");
        let fields = TextFieldExtractor::new().extract(&glued);
        assert_eq!(fields.amount.as_deref(), Some("50,000.00"));
    }

    #[test]
    fn test_short_reference_id_is_never_extracted() {
        assert_eq!(extract_reference_id("Transaction No: ABC123456"), None);
        assert_eq!(extract_reference_id("Ref: 12345"), None);
        assert_eq!(
            extract_reference_id("Ref: 12345\nReference - ABCDEF123456"),
            Some("ABCDEF123456".to_string())
        );
    }

    #[test]
    fn test_reference_labels() {
        assert_eq!(
            extract_reference_id("transaction id 250713010100785037713236"),
            Some("250713010100785037713236".to_string())
        );
        assert_eq!(
            extract_reference_id("Transaction No.: 9876543210"),
            Some("9876543210".to_string())
        );
        assert_eq!(
            extract_reference_id("REFERENCE:XYZ0000000001"),
            Some("XYZ0000000001".to_string())
        );
        assert_eq!(
            extract_reference_id("TxnRef:1234567890AB"),
            Some("1234567890AB".to_string())
        );
    }

    #[test]
    fn test_date_fragments() {
        assert_eq!(extract_date("on Jul 1, 2025"), Some("Jul 1, 2025".to_string()));
        assert_eq!(
            extract_date("on September 21st 2024"),
            Some("September 21st 2024".to_string())
        );
        assert_eq!(extract_date("12/07/2025"), Some("12/07/2025".to_string()));
        assert_eq!(extract_date("2025-07-12"), Some("2025-07-12".to_string()));
        assert_eq!(extract_date("no date here"), None);
    }

    #[test]
    fn test_time_fragments() {
        assert_eq!(extract_time("at 7:42 PM today"), Some("7:42 PM".to_string()));
        assert_eq!(extract_time("10:24:09\nnext"), Some("10:24:09".to_string()));
        assert_eq!(extract_time("at 07:42am"), Some("07:42am".to_string()));
        assert_eq!(extract_time("no time"), None);
    }

    #[test]
    fn test_recipient_section_scopes_bank() {
        // Sender's bank is printed first, recipient's second
        let text = "Sender: Access Bank\nNarration: rent\n\nRecipient\nOPay wallet\n\nDone";

        assert_eq!(recipient_section(text), Some("Recipient\nOPay wallet"));

        let bank = TextFieldExtractor::new().extract_receiver_bank(text);
        assert_eq!(bank.as_deref(), Some("OPay"));
    }

    #[test]
    fn test_unterminated_recipient_section_searches_whole_text() {
        let text = "Paid from Zenith\nRecipient Kuda";

        assert_eq!(recipient_section(text), None);

        let bank = TextFieldExtractor::new().extract_receiver_bank(text);
        assert_eq!(bank.as_deref(), Some("Zenith"));
    }

    #[test]
    fn test_round_trip_synthesized_receipt() {
        let cases = [
            ("1,500.00", "ABCDEFGHIJ12", "Moniepoint"),
            ("999,999.99", "250713010100785037713236", "OPay"),
            ("0.50", "REF0000000001", "Wema"),
        ];

        for (amount, reference, bank) in cases {
            let text = format!(
                "Payment Receipt\nAmount ₦{}\nRecipient\n{} - 2233445566\n\nReference: {}\n",
                amount, bank, reference
            );
            let fields = TextFieldExtractor::new().extract(&text);

            assert_eq!(fields.amount.as_deref(), Some(amount));
            assert_eq!(fields.reference_id.as_deref(), Some(reference));
            assert_eq!(fields.receiver_bank.as_deref(), Some(bank));
        }
    }
}

// ⏰ Normalizer - Extracted fragments → typed values
//
// Turns the printed amount, date and time into Decimal / NaiveDateTime.
// Only month-name dates ("Jul 12th, 2025") become timestamps; numeric
// dates are recognized by the extractor but rejected here.

use crate::error::RejectionReason;
use crate::extractor::ExtractedFields;
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

static ORDINAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{1,2})(?:st|nd|rd|th)\b").unwrap());

/// "Month day[,] year" after ordinal stripping
static MONTH_NAME_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+)\s+(\d{1,2}),?\s+(\d{4})$").unwrap());

/// "10:24[:09][ ]PM"
static TIME_PARTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d{1,2}:\d{2}(?::\d{2})?)\s*(AM|PM)?$").unwrap());

const DATE_FORMAT: &str = "%B %d, %Y";
const DATETIME_24H_FORMATS: [&str; 2] = ["%B %d, %Y %H:%M:%S", "%B %d, %Y %H:%M"];
const DATETIME_12H_FORMATS: [&str; 2] = ["%B %d, %Y %I:%M:%S %p", "%B %d, %Y %I:%M %p"];

// ============================================================================
// NORMALIZED TRANSACTION
// ============================================================================

/// A candidate transaction with every mandatory field present and typed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTransaction {
    pub amount: Decimal,
    pub reference_id: String,
    /// Canonical bank name
    pub receiver_bank: String,
    pub timestamp: Option<NaiveDateTime>,
}

// ============================================================================
// AMOUNT
// ============================================================================

/// Parse a printed amount ("50,000.00") into a non-negative Decimal
pub fn parse_amount(raw: &str) -> Result<Decimal, RejectionReason> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();

    let amount = Decimal::from_str(&cleaned).map_err(|_| RejectionReason::InvalidAmount)?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(RejectionReason::InvalidAmount);
    }

    Ok(amount)
}

// ============================================================================
// DATE / TIME
// ============================================================================

pub struct DateTimeNormalizer;

impl DateTimeNormalizer {
    pub fn new() -> Self {
        DateTimeNormalizer
    }

    /// Combine optional date and time fragments into a timestamp.
    ///
    /// - no date → Ok(None), whatever the time says
    /// - date only → midnight
    /// - date + time → 24-hour parse, then 12-hour parse with AM/PM
    /// - anything unparsable → InvalidDate
    pub fn normalize(
        &self,
        date_fragment: Option<&str>,
        time_fragment: Option<&str>,
    ) -> Result<Option<NaiveDateTime>, RejectionReason> {
        let date = match date_fragment {
            Some(d) if !d.trim().is_empty() => canonical_date(&strip_ordinal_suffixes(d))?,
            _ => return Ok(None),
        };

        let time = match time_fragment {
            Some(t) if !t.trim().is_empty() => canonical_time(t)?,
            _ => {
                let day = NaiveDate::parse_from_str(&date, DATE_FORMAT)
                    .map_err(|_| RejectionReason::InvalidDate)?;
                return day
                    .and_hms_opt(0, 0, 0)
                    .map(Some)
                    .ok_or(RejectionReason::InvalidDate);
            }
        };

        let combined = format!("{} {}", date, time);

        DATETIME_24H_FORMATS
            .iter()
            .chain(DATETIME_12H_FORMATS.iter())
            .find_map(|fmt| NaiveDateTime::parse_from_str(&combined, fmt).ok())
            .map(Some)
            .ok_or(RejectionReason::InvalidDate)
    }

    /// Validate and type every field of an extraction, in rejection order:
    /// missing fields, then amount, then date.
    pub fn normalize_fields(
        &self,
        fields: &ExtractedFields,
        canonical_bank: impl Fn(&str) -> Option<String>,
    ) -> Result<NormalizedTransaction, RejectionReason> {
        let missing = fields.missing_required();
        let (reference_id, amount, bank) = match (
            fields.reference_id.as_deref(),
            fields.amount.as_deref(),
            fields.receiver_bank.as_deref(),
        ) {
            (Some(r), Some(a), Some(b)) if missing.is_empty() => (r, a, b),
            _ => return Err(RejectionReason::MissingFields(missing)),
        };

        let amount = parse_amount(amount)?;
        let timestamp = self.normalize(
            fields.date_fragment.as_deref(),
            fields.time_fragment.as_deref(),
        )?;

        Ok(NormalizedTransaction {
            amount,
            reference_id: reference_id.to_string(),
            receiver_bank: canonical_bank(bank).unwrap_or_else(|| bank.to_string()),
            timestamp,
        })
    }
}

impl Default for DateTimeNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// "Jul 21st, 2025" → "Jul 21, 2025"
pub fn strip_ordinal_suffixes(date: &str) -> String {
    ORDINAL_SUFFIX.replace_all(date, "$1").into_owned()
}

fn canonical_date(date: &str) -> Result<String, RejectionReason> {
    let caps = MONTH_NAME_DATE
        .captures(date.trim())
        .ok_or(RejectionReason::InvalidDate)?;

    Ok(format!("{} {}, {}", &caps[1], &caps[2], &caps[3]))
}

fn canonical_time(time: &str) -> Result<String, RejectionReason> {
    let caps = TIME_PARTS
        .captures(time.trim())
        .ok_or(RejectionReason::InvalidDate)?;

    Ok(match caps.get(2) {
        Some(meridiem) => format!("{} {}", &caps[1], meridiem.as_str().to_uppercase()),
        None => caps[1].to_string(),
    })
}

// ============================================================================
// TESTS
// ============================================================================

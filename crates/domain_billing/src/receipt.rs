//! Receipt number generation
//!
//! Numbers have the shape `RCP-YYYYMMDD-NNNN` and are strictly increasing
//! within each hospital-local calendar day. Reservation is serialized
//! behind a mutex so two concurrent settlements can never draw the same
//! number.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

/// Per-day receipt sequence dispenser
#[derive(Debug, Default)]
pub struct ReceiptNumberGenerator {
    counters: Mutex<HashMap<NaiveDate, u32>>,
}

impl ReceiptNumberGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next receipt number for the given local date
    pub fn next(&self, date: NaiveDate) -> String {
        let mut counters = self.counters.lock().expect("receipt counter lock poisoned");
        let seq = counters.entry(date).or_insert(0);
        *seq += 1;
        format_receipt_number(date, *seq)
    }

    /// Resumes numbering above an already-persisted sequence
    ///
    /// Called on startup with the highest stored sequence per day so
    /// restarts never reissue a number.
    pub fn seed(&self, date: NaiveDate, last_sequence: u32) {
        let mut counters = self.counters.lock().expect("receipt counter lock poisoned");
        let seq = counters.entry(date).or_insert(0);
        if last_sequence > *seq {
            *seq = last_sequence;
        }
    }
}

fn format_receipt_number(date: NaiveDate, sequence: u32) -> String {
    format!("RCP-{}-{:04}", date.format("%Y%m%d"), sequence)
}

/// Checks the exact `RCP-YYYYMMDD-NNNN` shape
///
/// Stricter than a digit-shape check: the date segment must also be a
/// real calendar date, since the generator only ever embeds one.
pub fn is_valid_receipt_number(candidate: &str) -> bool {
    let Some(rest) = candidate.strip_prefix("RCP-") else {
        return false;
    };
    let mut parts = rest.splitn(2, '-');
    let (Some(date_part), Some(seq_part)) = (parts.next(), parts.next()) else {
        return false;
    };
    if date_part.len() != 8 || seq_part.len() != 4 {
        return false;
    }
    if !date_part.chars().all(|c| c.is_ascii_digit())
        || !seq_part.chars().all(|c| c.is_ascii_digit())
    {
        return false;
    }
    NaiveDate::parse_from_str(date_part, "%Y%m%d").is_ok()
}

//! Scanner output parser — best-effort scraper over the port scanner's
//! human-readable text output.
//!
//! The scanner offers no structured output mode we can rely on across
//! versions, so this scans line-by-line: everything before the `PORT`
//! header line (banners, DNS notes, warnings) is ignored, then any line
//! whose first character is a decimal digit is treated as a data row.
//! Malformed rows are skipped, never an error.

use crate::peer::PortRecord;

/// Parse raw scanner output into the open-port records it reports.
///
/// A data row looks like `22/tcp   open  ssh`. Only rows whose state token
/// is exactly `open` are kept. Output order matches input line order — any
/// ascending-port ordering is the tool's doing, not ours.
///
/// The record's `protocol` field carries the row's second token (the state
/// token) when present, `"tcp"` otherwise. That mirrors the long-standing
/// behavior of the consumer this replaces; see the pinning test below
/// before changing it.
pub fn parse_scan_output(raw: &str) -> Vec<PortRecord> {
    let mut in_table = false;
    let mut records = Vec::new();

    for line in raw.lines() {
        if in_table && line.starts_with(|c: char| c.is_ascii_digit()) {
            if let Some(record) = parse_data_row(line) {
                records.push(record);
            }
        }

        if line.starts_with("PORT") {
            in_table = true;
        }
    }

    records
}

/// Parse one data row. Returns None for anything malformed or not open.
fn parse_data_row(line: &str) -> Option<PortRecord> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    // `port/protocol` before the first slash must be numeric.
    let port: u16 = tokens.first()?.split('/').next()?.parse().ok()?;

    if tokens.get(1) != Some(&"open") {
        return None;
    }

    Some(PortRecord {
        port,
        service: tokens.get(2).unwrap_or(&"unknown").to_string(),
        protocol: tokens.get(1).unwrap_or(&"tcp").to_string(),
    })
}

//! Invoice totals and checksums

use super::model::InvoiceLine;
use crate::core::identity::Hasher;

/// Total payable: each line's `unit price × quantity` rounded up to the cent
pub fn total(lines: &[InvoiceLine]) -> f64 {
    lines
        .iter()
        .map(|line| (line.amount * line.quantity as f64 * 100.0).ceil() / 100.0)
        .sum()
}

/// Digest of the serialized invoice. Line order is significant.
pub fn checksum(lines: &[InvoiceLine], hasher: &dyn Hasher) -> serde_json::Result<String> {
    let canonical = serde_json::to_string(lines)?;
    Ok(hasher.hash(&canonical))
}

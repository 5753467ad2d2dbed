// SPDX-License-Identifier: BUSL-1.1
//! # Consumption Ledger
//!
//! Append-only records of every quantity ever drawn from a permit line
//! item, plus the denormalized per-line index the remaining-quantity
//! calculator reads.
//!
//! A [`DispatchLineEntry`] is the durable snapshot of one draw: it copies
//! the line item's descriptive fields at dispatch time and is never updated
//! in place. Deleting a dispatch removes its entries wholesale, which is
//! the only way consumption ever decreases.
//!
//! The [`ConsumptionIndex`] carries, per line item, the running consumed
//! total and a monotonic revision counter. The counter moves on every
//! append and every reversal; the dispatch builder uses it to detect
//! concurrent writers between validation and commit.

use lgp_core::{DispatchId, LineItemId, PermitId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::permit::LineItem;

// ---------------------------------------------------------------------------
// Ledger rows
// ---------------------------------------------------------------------------

/// One immutable consumption record: "this much was drawn from that line
/// item on this dispatch".
///
/// The permit/line-item references are weak back-references for lookup; the
/// snapshot fields are authoritative even if the source line item is later
/// altered by unrelated processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchLineEntry {
    pub entry_id: Uuid,
    pub dispatch_id: DispatchId,
    pub permit_id: PermitId,
    pub line_item_id: LineItemId,
    /// Snapshot of the source line number at dispatch time.
    pub line_number: u32,
    pub goods_code: String,
    pub description: String,
    pub package_type: String,
    pub quantity: Decimal,
    /// Prorated weight for this slice, full decimal precision.
    pub weight: Decimal,
    /// Prorated value for this slice, full decimal precision.
    pub value: Decimal,
}

// ---------------------------------------------------------------------------
// Consumption index
// ---------------------------------------------------------------------------

/// Running consumption for one line item.
#[derive(Debug, Clone, Default)]
struct LineConsumption {
    consumed: Decimal,
    revision: u64,
}

/// Denormalized consumption totals, keyed by line item.
///
/// Updated only inside the engine's write-side critical section, so totals
/// and revisions always move together with the ledger rows they summarize.
#[derive(Debug, Default)]
pub struct ConsumptionIndex {
    lines: HashMap<LineItemId, LineConsumption>,
}

impl ConsumptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total quantity ever drawn from the line item, net of reversals.
    pub fn consumed(&self, line_item_id: &LineItemId) -> Decimal {
        self.lines
            .get(line_item_id)
            .map(|line| line.consumed)
            .unwrap_or(Decimal::ZERO)
    }

    /// Revision counter for the line item; moves on every append and every
    /// reversal. A line item never consumed has revision zero.
    pub fn revision(&self, line_item_id: &LineItemId) -> u64 {
        self.lines
            .get(line_item_id)
            .map(|line| line.revision)
            .unwrap_or(0)
    }

    /// `declared_quantity − Σ(ledger quantity for this item)`.
    ///
    /// Never negative for committed state: the dispatch builder validates
    /// against this value under the write lock before appending.
    pub fn remaining(&self, item: &LineItem) -> Decimal {
        item.declared_quantity - self.consumed(&item.id)
    }

    /// Record a draw against the line item.
    pub fn record(&mut self, line_item_id: &LineItemId, quantity: Decimal) {
        let line = self.lines.entry(line_item_id.clone()).or_default();
        line.consumed += quantity;
        line.revision += 1;
    }

    /// Reverse a previously recorded draw (dispatch deletion).
    pub fn reverse(&mut self, line_item_id: &LineItemId, quantity: Decimal) {
        let line = self.lines.entry(line_item_id.clone()).or_default();
        line.consumed -= quantity;
        line.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_item(declared: Decimal) -> LineItem {
        LineItem {
            id: LineItemId::new(),
            line_number: 1,
            goods_code: "0901.21".to_string(),
            description: "Roasted coffee".to_string(),
            package_type: "bag".to_string(),
            declared_quantity: declared,
            declared_weight: dec!(500),
            declared_value: dec!(1000),
            remarks: None,
        }
    }

    #[test]
    fn remaining_starts_at_declared_quantity() {
        let index = ConsumptionIndex::new();
        let item = sample_item(dec!(100));
        assert_eq!(index.remaining(&item), dec!(100));
        assert_eq!(index.revision(&item.id), 0);
    }

    #[test]
    fn record_accumulates_and_bumps_revision() {
        let mut index = ConsumptionIndex::new();
        let item = sample_item(dec!(100));

        index.record(&item.id, dec!(40));
        assert_eq!(index.remaining(&item), dec!(60));
        assert_eq!(index.revision(&item.id), 1);

        index.record(&item.id, dec!(60));
        assert_eq!(index.remaining(&item), dec!(0));
        assert_eq!(index.revision(&item.id), 2);
    }

    #[test]
    fn reverse_restores_quantity_and_still_bumps_revision() {
        let mut index = ConsumptionIndex::new();
        let item = sample_item(dec!(100));

        index.record(&item.id, dec!(70));
        index.reverse(&item.id, dec!(70));
        assert_eq!(index.remaining(&item), dec!(100));
        assert_eq!(index.revision(&item.id), 2);
    }

    #[test]
    fn fractional_quantities_conserve_exactly() {
        let mut index = ConsumptionIndex::new();
        let item = sample_item(dec!(1));
        for _ in 0..10 {
            index.record(&item.id, dec!(0.1));
        }
        assert_eq!(index.remaining(&item), dec!(0));
    }
}

// SPDX-License-Identifier: BUSL-1.1
//! # Allocation / Proration Engine
//!
//! Scales a line item's declared weight and value down to the slice
//! corresponding to a partially dispatched quantity.
//!
//! Per-unit rates always derive from the *declared* quantity, never the
//! remaining-adjusted one, so repeated partial dispatches of the same item
//! prorate consistently off the same baseline. Full decimal precision is
//! carried through the arithmetic; rounding happens only at presentation
//! time, outside the engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::permit::LineItem;

/// The prorated slice for one requested quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub quantity: Decimal,
    pub weight: Decimal,
    pub value: Decimal,
}

/// Compute the proportional weight and value for `requested` units of the
/// line item.
///
/// `perUnit = declared / declared_quantity; result = requested * perUnit`.
/// The caller (dispatch builder) is responsible for the range check
/// `0 < requested ≤ remaining`; declared quantity is strictly positive by
/// catalog construction, so the division is always defined.
pub fn prorate(item: &LineItem, requested: Decimal) -> Allocation {
    let per_unit_weight = item.declared_weight / item.declared_quantity;
    let per_unit_value = item.declared_value / item.declared_quantity;
    Allocation {
        quantity: requested,
        weight: requested * per_unit_weight,
        value: requested * per_unit_value,
    }
}

// SPDX-License-Identifier: BUSL-1.1
//! # Permit Catalog Types and Status State Machine
//!
//! Typed permit and line-item structs, catalog intake validation, and the
//! permit lifecycle state machine.
//!
//! ## State Machine
//!
//! ```text
//! Draft → Submitted → Approved → Dispatched
//!   \         |          /
//!    `--------+---------´→ Cancelled
//! ```
//!
//! Forward-only happy path with a manually triggered side edge to
//! `Cancelled`. `Dispatched` and `Cancelled` are terminal: they freeze the
//! permit against further edits and further consumption. The automatic
//! `→ Dispatched` edge is driven by the dispatch builder when every line
//! item's remaining quantity reaches zero; every other edge is triggered by
//! the external catalog collaborator.

use chrono::{DateTime, NaiveDate, Utc};
use lgp_core::{ActorId, CustomerId, LineItemId, PermitId, PermitNumber, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Permit error type
// ---------------------------------------------------------------------------

/// Errors arising from permit catalog operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermitError {
    /// The attempted lifecycle edge does not exist in the state machine.
    #[error("invalid status transition for permit {permit_id}: {from} → {to}")]
    InvalidStatusTransition {
        permit_id: PermitId,
        from: PermitStatus,
        to: PermitStatus,
    },

    /// The permit is in a terminal status and cannot be edited.
    #[error("permit {permit_id} is frozen in terminal status {status}")]
    PermitFrozen {
        permit_id: PermitId,
        status: PermitStatus,
    },

    /// A permit must carry at least one line item.
    #[error("permit has no line items")]
    EmptyPermit,

    /// Declared quantity must be strictly positive; per-unit rates divide
    /// by it.
    #[error("line {line_number}: declared quantity {quantity} must be > 0")]
    NonPositiveQuantity { line_number: u32, quantity: Decimal },

    /// Declared weight and value must be non-negative.
    #[error("line {line_number}: declared {field} {amount} must be ≥ 0")]
    NegativeAmount {
        line_number: u32,
        field: &'static str,
        amount: Decimal,
    },

    /// The validity window ends before it begins.
    #[error("invalid validity window: {valid_from} → {valid_until}")]
    InvalidValidityWindow {
        valid_from: NaiveDate,
        valid_until: NaiveDate,
    },

    /// Permit not found in the catalog.
    #[error("permit not found: {0}")]
    NotFound(PermitId),

    /// Domain primitive validation failure (permit numbering and free-text
    /// field constraints).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// ---------------------------------------------------------------------------
// Permit status
// ---------------------------------------------------------------------------

/// Lifecycle status of a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitStatus {
    /// Freshly captured, still editable.
    Draft,
    /// Handed to the issuing authority.
    Submitted,
    /// Authorized for dispatch consumption.
    Approved,
    /// Every line item fully consumed. Terminal.
    Dispatched,
    /// Withdrawn before full consumption. Terminal.
    Cancelled,
}

impl PermitStatus {
    /// Whether this status freezes the permit (no edits, no consumption).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dispatched | Self::Cancelled)
    }
}

impl std::fmt::Display for PermitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Dispatched => "dispatched",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Validate a lifecycle edge, returning the target status on success.
///
/// Covers both the manual edges (submit, approve, cancel) and the automatic
/// `→ Dispatched` edge driven by the dispatch builder. Terminal states have
/// no outgoing edges.
pub fn validate_status_transition(
    permit_id: &PermitId,
    from: PermitStatus,
    to: PermitStatus,
) -> Result<PermitStatus, PermitError> {
    use PermitStatus::*;

    let valid = matches!(
        (from, to),
        (Draft, Submitted)
            | (Submitted, Approved)
            | (Draft | Submitted | Approved, Cancelled)
            | (Draft | Submitted | Approved, Dispatched)
    );

    if valid {
        Ok(to)
    } else {
        Err(PermitError::InvalidStatusTransition {
            permit_id: permit_id.clone(),
            from,
            to,
        })
    }
}

// ---------------------------------------------------------------------------
// Line items
// ---------------------------------------------------------------------------

/// One goods entry on a permit.
///
/// Declared quantity, weight, and value are fixed at intake; consumption is
/// tracked externally in the ledger, never by mutating these fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    /// Unique within the permit; defines print/display order.
    pub line_number: u32,
    /// Goods classification code (HS or local tariff heading).
    pub goods_code: String,
    pub description: String,
    /// Package-type label (e.g. "carton", "pallet", "drum").
    pub package_type: String,
    /// Unit-less declared count. Strictly positive by construction.
    pub declared_quantity: Decimal,
    /// Declared gross weight in kilograms.
    pub declared_weight: Decimal,
    /// Declared value, currency-less magnitude.
    pub declared_value: Decimal,
    /// Free-text customs remarks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// Intake payload for a single line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLineItem {
    pub goods_code: String,
    pub description: String,
    pub package_type: String,
    pub quantity: Decimal,
    pub weight: Decimal,
    pub value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

// ---------------------------------------------------------------------------
// Permit
// ---------------------------------------------------------------------------

/// A Local Goods Permit: an authorization document for import/storage of
/// itemized goods, consumed line-by-line through dispatches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permit {
    pub id: PermitId,
    /// Human-readable `LGP-YYYY-NNNN` number, assigned once at intake.
    pub number: PermitNumber,
    pub customer_id: CustomerId,
    /// Issuing-location reference (warehouse/station label).
    pub issuing_location: String,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub status: PermitStatus,
    /// Ordered by `line_number`.
    pub line_items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stamped when the automatic `→ Dispatched` edge fires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatched_by: Option<ActorId>,
    /// The status held before the automatic edge fired; restored when a
    /// reversal makes quantity available again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_before_dispatch: Option<PermitStatus>,
}

impl Permit {
    /// Look up a line item by identifier.
    pub fn line_item(&self, id: &LineItemId) -> Option<&LineItem> {
        self.line_items.iter().find(|item| &item.id == id)
    }
}

/// Intake payload for a new permit. The permit number is assigned by the
/// engine, not supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPermit {
    pub customer_id: CustomerId,
    pub issuing_location: String,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub lines: Vec<NewLineItem>,
}

impl NewPermit {
    /// Validate intake constraints and materialize the ordered line items.
    ///
    /// Line numbers are assigned from request order, 1-based. Declared
    /// quantity must be strictly positive (per-unit rates divide by it);
    /// weight and value must be non-negative; classification code and
    /// description must be non-empty.
    pub(crate) fn validate_lines(&self) -> Result<Vec<LineItem>, PermitError> {
        if self.valid_until < self.valid_from {
            return Err(PermitError::InvalidValidityWindow {
                valid_from: self.valid_from,
                valid_until: self.valid_until,
            });
        }
        if self.lines.is_empty() {
            return Err(PermitError::EmptyPermit);
        }

        let mut items = Vec::with_capacity(self.lines.len());
        for (index, line) in self.lines.iter().enumerate() {
            let line_number = index as u32 + 1;
            if line.goods_code.trim().is_empty() {
                return Err(ValidationError::EmptyField("goods_code").into());
            }
            if line.description.trim().is_empty() {
                return Err(ValidationError::EmptyField("description").into());
            }
            if line.quantity <= Decimal::ZERO {
                return Err(PermitError::NonPositiveQuantity {
                    line_number,
                    quantity: line.quantity,
                });
            }
            for (field, amount) in [("weight", line.weight), ("value", line.value)] {
                if amount < Decimal::ZERO {
                    return Err(PermitError::NegativeAmount {
                        line_number,
                        field,
                        amount,
                    });
                }
            }
            items.push(LineItem {
                id: LineItemId::new(),
                line_number,
                goods_code: line.goods_code.clone(),
                description: line.description.clone(),
                package_type: line.package_type.clone(),
                declared_quantity: line.quantity,
                declared_weight: line.weight,
                declared_value: line.value,
                remarks: line.remarks.clone(),
            });
        }
        Ok(items)
    }
}

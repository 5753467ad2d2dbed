// SPDX-License-Identifier: BUSL-1.1
//! # Dispatch Types
//!
//! Typed request and result values for the dispatch builder, plus the
//! structured dispatch error taxonomy.
//!
//! A dispatch request is an explicit, validated value — a list of
//! (permit, line item, quantity) triples with header metadata — never an
//! untyped document. The creating actor is an explicit field, never read
//! from ambient request state.

use chrono::{DateTime, NaiveDate, Utc};
use lgp_core::{ActorId, CustomerId, DispatchId, LineItemId, PermitId, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::DispatchLineEntry;
use crate::permit::PermitStatus;

// ---------------------------------------------------------------------------
// Dispatch error type
// ---------------------------------------------------------------------------

/// Errors arising from dispatch building and reversal.
///
/// Every variant carries enough structure for a calling UI to re-render the
/// dispatch builder with the offending line highlighted, without parsing
/// messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Zero line requests submitted.
    #[error("dispatch request contains no lines")]
    EmptyRequest,

    /// Malformed or missing required request fields.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A requested quantity must be strictly positive.
    #[error("line item {line_item_id}: requested quantity {quantity} must be > 0")]
    NonPositiveQuantity {
        permit_id: PermitId,
        line_item_id: LineItemId,
        quantity: Decimal,
    },

    /// Referenced permit does not exist.
    #[error("permit not found: {0}")]
    PermitNotFound(PermitId),

    /// Referenced line item does not exist on the referenced permit.
    #[error("line item {line_item_id} not found on permit {permit_id}")]
    LineItemNotFound {
        permit_id: PermitId,
        line_item_id: LineItemId,
    },

    /// Referenced dispatch does not exist.
    #[error("dispatch not found: {0}")]
    DispatchNotFound(DispatchId),

    /// A dispatch spans permits of a single customer only.
    #[error("permit {permit_id} belongs to customer {permit_customer}, dispatch is for {dispatch_customer}")]
    CustomerMismatch {
        permit_id: PermitId,
        permit_customer: CustomerId,
        dispatch_customer: CustomerId,
    },

    /// The permit is already in a terminal status.
    #[error("permit {permit_id} is not dispatchable: status {status}")]
    PermitNotDispatchable {
        permit_id: PermitId,
        status: PermitStatus,
    },

    /// A request exceeds the line item's remaining capacity. `requested`
    /// is the cumulative quantity asked of this line item across the whole
    /// dispatch request.
    #[error("insufficient quantity on line item {line_item_id}: requested {requested}, remaining {remaining} (short by {shortfall})")]
    InsufficientQuantity {
        permit_id: PermitId,
        line_item_id: LineItemId,
        requested: Decimal,
        remaining: Decimal,
        shortfall: Decimal,
    },

    /// A concurrent writer consumed from a touched line item between
    /// validation and commit. Recoverable: re-fetch remaining quantities
    /// and retry the whole dispatch request.
    #[error("concurrent consumption detected on line item {line_item_id}; re-fetch and retry")]
    ConcurrencyConflict { line_item_id: LineItemId },
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Optional carrier metadata on a dispatch header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarrierInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

/// One requested draw: this quantity from that line item of that permit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchLineRequest {
    pub permit_id: PermitId,
    pub line_item_id: LineItemId,
    pub quantity: Decimal,
}

/// A complete dispatch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDispatch {
    pub customer_id: CustomerId,
    pub dispatch_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<CarrierInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// The actor creating the dispatch. Explicit, never ambient.
    pub created_by: ActorId,
    pub lines: Vec<DispatchLineRequest>,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A committed dispatch: header plus its immutable line entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispatch {
    pub id: DispatchId,
    pub customer_id: CustomerId,
    pub dispatch_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<CarrierInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: ActorId,
    pub entries: Vec<DispatchLineEntry>,
}

impl Dispatch {
    /// Distinct permits this dispatch drew from, in entry order.
    pub fn touched_permits(&self) -> Vec<PermitId> {
        let mut permits = Vec::new();
        for entry in &self.entries {
            if !permits.contains(&entry.permit_id) {
                permits.push(entry.permit_id.clone());
            }
        }
        permits
    }
}

/// Result of a committed dispatch creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub dispatch: Dispatch,
    /// Permits that transitioned to `Dispatched` in this transaction.
    pub dispatched_permits: Vec<PermitId>,
}

/// Result of a dispatch deletion (consumption reversal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReversal {
    pub dispatch_id: DispatchId,
    /// Every permit the deleted dispatch had drawn from.
    pub affected_permits: Vec<PermitId>,
    /// Permits whose `Dispatched` status was reverted because quantity
    /// became available again.
    pub reverted_permits: Vec<PermitId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample_entry(dispatch_id: &DispatchId, permit_id: &PermitId) -> DispatchLineEntry {
        DispatchLineEntry {
            entry_id: Uuid::new_v4(),
            dispatch_id: dispatch_id.clone(),
            permit_id: permit_id.clone(),
            line_item_id: LineItemId::new(),
            line_number: 1,
            goods_code: "6404.11".to_string(),
            description: "Sports footwear".to_string(),
            package_type: "carton".to_string(),
            quantity: dec!(10),
            weight: dec!(50),
            value: dec!(100),
        }
    }

    #[test]
    fn touched_permits_deduplicates_in_entry_order() {
        let dispatch_id = DispatchId::new();
        let permit_a = PermitId::new();
        let permit_b = PermitId::new();
        let dispatch = Dispatch {
            id: dispatch_id.clone(),
            customer_id: CustomerId::new(),
            dispatch_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            carrier: None,
            note: None,
            created_at: Utc::now(),
            created_by: ActorId::new(),
            entries: vec![
                sample_entry(&dispatch_id, &permit_a),
                sample_entry(&dispatch_id, &permit_b),
                sample_entry(&dispatch_id, &permit_a),
            ],
        };
        assert_eq!(dispatch.touched_permits(), vec![permit_a, permit_b]);
    }

    #[test]
    fn core_validation_errors_convert_into_dispatch_errors() {
        let err: DispatchError = ValidationError::EmptyField("dispatch_date").into();
        assert!(matches!(err, DispatchError::Validation(_)));
        assert!(err.to_string().contains("dispatch_date"));
    }

    #[test]
    fn insufficient_quantity_message_names_the_shortfall() {
        let err = DispatchError::InsufficientQuantity {
            permit_id: PermitId::new(),
            line_item_id: LineItemId::new(),
            requested: dec!(70),
            remaining: dec!(60),
            shortfall: dec!(10),
        };
        let message = err.to_string();
        assert!(message.contains("requested 70"));
        assert!(message.contains("remaining 60"));
        assert!(message.contains("short by 10"));
    }
}

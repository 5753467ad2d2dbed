// SPDX-License-Identifier: BUSL-1.1
//! # lgp-engine — LGP Dispatch Allocation Engine
//!
//! The allocation core of the Local Goods Permit back office: permits
//! authorize import/storage of itemized goods, and dispatches consume
//! quantities from permit line items — possibly drawing partial quantities
//! from multiple line items across multiple permits of one customer in a
//! single atomic transaction.
//!
//! - **Permit Catalog** ([`permit`]): permit/line-item structs, intake
//!   validation, and the lifecycle state machine
//!   (`Draft → Submitted → Approved → Dispatched`, side edge `Cancelled`).
//!
//! - **Consumption Ledger** ([`ledger`]): append-only draw records and the
//!   denormalized per-line consumed/revision index — the source of truth
//!   for remaining quantity.
//!
//! - **Allocation** ([`allocation`]): proration of declared weight/value
//!   down to a partially dispatched slice, always off the declared
//!   baseline, full decimal precision.
//!
//! - **Dispatch** ([`dispatch`]): typed request/result values and the
//!   structured error taxonomy.
//!
//! - **Engine** ([`engine`]): the thread-safe [`DispatchEngine`] manager
//!   tying it together — availability snapshots, the two-phase atomic
//!   dispatch builder with optimistic revision checking, automatic
//!   status transition, and dispatch reversal.
//!
//! ## Core invariants
//!
//! - Conservation: `declared = remaining + Σ(dispatched)` per line item.
//! - Non-negativity: `remaining ≥ 0` in every committed state, including
//!   under concurrent dispatch attempts.
//! - A permit is `Dispatched` exactly when every line item is fully
//!   consumed; the edge is re-evaluated on reversal.

pub mod allocation;
pub mod dispatch;
pub mod engine;
pub mod ledger;
pub mod permit;

// Re-export primary types.
pub use allocation::{prorate, Allocation};
pub use dispatch::{
    CarrierInfo, Dispatch, DispatchError, DispatchLineRequest, DispatchOutcome, DispatchReversal,
    NewDispatch,
};
pub use engine::{AvailableLine, DispatchEngine};
pub use ledger::{ConsumptionIndex, DispatchLineEntry};
pub use permit::{
    validate_status_transition, LineItem, NewLineItem, NewPermit, Permit, PermitError,
    PermitStatus,
};

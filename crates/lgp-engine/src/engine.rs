// SPDX-License-Identifier: BUSL-1.1
//! # Dispatch Engine
//!
//! Thread-safe permit/dispatch lifecycle manager. Permits, the consumption
//! index, and the permit-number sequences live under a single
//! `parking_lot::RwLock`; the immutable dispatch archive is a `DashMap`
//! read without taking that lock.
//!
//! ## Dispatch transaction
//!
//! `create_dispatch` is two-phase:
//!
//! 1. **Validate** under the read lock: check every precondition in request
//!    order (fail fast), compute every proration, and capture each touched
//!    line item's ledger revision.
//! 2. **Commit** under the write lock: re-check permit status, compare the
//!    captured revisions — any movement means a concurrent writer got in
//!    between and the whole request fails with `ConcurrencyConflict` — then
//!    apply every ledger append and status transition before releasing.
//!
//! Commits are serialized by the write lock and validated against revisions
//! captured at read time, so `remaining ≥ 0` holds for every committed
//! state. Nothing is mutated until all checks pass: a failure at any step
//! leaves zero observable side effects.

use chrono::{DateTime, Datelike, Utc};
use dashmap::DashMap;
use lgp_core::{ActorId, CustomerId, DispatchId, LineItemId, PermitId, PermitNumber};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::allocation::{prorate, Allocation};
use crate::dispatch::{
    Dispatch, DispatchError, DispatchLineRequest, DispatchOutcome, DispatchReversal, NewDispatch,
};
use crate::ledger::{ConsumptionIndex, DispatchLineEntry};
use crate::permit::{
    validate_status_transition, NewPermit, Permit, PermitError, PermitStatus,
};

// ---------------------------------------------------------------------------
// Read-model types
// ---------------------------------------------------------------------------

/// One dispatchable row in the availability snapshot: a line item with
/// remaining capacity on a non-terminal permit, plus a proration preview of
/// the full remaining quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableLine {
    pub permit_id: PermitId,
    pub permit_number: PermitNumber,
    pub line_item_id: LineItemId,
    pub line_number: u32,
    pub goods_code: String,
    pub description: String,
    pub package_type: String,
    pub remaining_quantity: Decimal,
    /// Prorated weight/value if the full remaining quantity were dispatched.
    pub preview: Allocation,
}

// ---------------------------------------------------------------------------
// Engine state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct EngineState {
    permits: HashMap<PermitId, Permit>,
    ledger: ConsumptionIndex,
    /// Last assigned permit sequence per calendar year.
    year_sequences: HashMap<i32, u32>,
}

/// A planned ledger append, fully computed during validation.
struct PlannedEntry {
    permit_id: PermitId,
    line_item_id: LineItemId,
    line_number: u32,
    goods_code: String,
    description: String,
    package_type: String,
    allocation: Allocation,
}

// ---------------------------------------------------------------------------
// Dispatch engine
// ---------------------------------------------------------------------------

/// Thread-safe LGP allocation engine: permit catalog, consumption ledger,
/// and atomic multi-permit dispatch builder.
pub struct DispatchEngine {
    state: RwLock<EngineState>,
    dispatches: DashMap<DispatchId, Dispatch>,
}

impl DispatchEngine {
    /// Create a new empty engine.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(EngineState::default()),
            dispatches: DashMap::new(),
        }
    }

    // -- Permit catalog -----------------------------------------------------

    /// Register a new permit: validate the intake payload, assign the next
    /// `LGP-YYYY-NNNN` number for the current calendar year, and store the
    /// permit in `Draft` status.
    pub fn create_permit(&self, new: NewPermit) -> Result<Permit, PermitError> {
        self.create_permit_at(new, Utc::now())
    }

    /// Register a new permit as of an explicit creation instant.
    ///
    /// The numbering year is taken from `created_at`; the sequence is
    /// monotonic within that year and restarts at `0001` in the next.
    /// Callers that carry their own clock pin the instant here;
    /// [`create_permit`](Self::create_permit) uses the system clock.
    pub fn create_permit_at(
        &self,
        new: NewPermit,
        created_at: DateTime<Utc>,
    ) -> Result<Permit, PermitError> {
        let line_items = new.validate_lines()?;
        let now = created_at;

        let mut state = self.state.write();
        let year = now.date_naive().year();
        let next = state.year_sequences.get(&year).copied().unwrap_or(0) + 1;
        let number = PermitNumber::from_parts(year, next)?;
        state.year_sequences.insert(year, next);

        let permit = Permit {
            id: PermitId::new(),
            number,
            customer_id: new.customer_id,
            issuing_location: new.issuing_location,
            valid_from: new.valid_from,
            valid_until: new.valid_until,
            status: PermitStatus::Draft,
            line_items,
            created_at: now,
            updated_at: now,
            dispatched_at: None,
            dispatched_by: None,
            status_before_dispatch: None,
        };
        state.permits.insert(permit.id.clone(), permit.clone());

        tracing::info!(permit = %number, customer = %permit.customer_id, "permit registered");
        Ok(permit)
    }

    /// Fetch a permit by identifier.
    pub fn get_permit(&self, permit_id: &PermitId) -> Result<Permit, PermitError> {
        self.state
            .read()
            .permits
            .get(permit_id)
            .cloned()
            .ok_or_else(|| PermitError::NotFound(permit_id.clone()))
    }

    /// Manual edge `Draft → Submitted`.
    pub fn submit_permit(&self, permit_id: &PermitId) -> Result<Permit, PermitError> {
        self.transition_permit(permit_id, PermitStatus::Submitted)
    }

    /// Manual edge `Submitted → Approved`.
    pub fn approve_permit(&self, permit_id: &PermitId) -> Result<Permit, PermitError> {
        self.transition_permit(permit_id, PermitStatus::Approved)
    }

    /// Manual side edge to `Cancelled`. Terminal: freezes the permit.
    pub fn cancel_permit(&self, permit_id: &PermitId) -> Result<Permit, PermitError> {
        self.transition_permit(permit_id, PermitStatus::Cancelled)
    }

    fn transition_permit(
        &self,
        permit_id: &PermitId,
        to: PermitStatus,
    ) -> Result<Permit, PermitError> {
        let mut state = self.state.write();
        let permit = state
            .permits
            .get_mut(permit_id)
            .ok_or_else(|| PermitError::NotFound(permit_id.clone()))?;

        if permit.status.is_terminal() {
            return Err(PermitError::PermitFrozen {
                permit_id: permit_id.clone(),
                status: permit.status,
            });
        }
        permit.status = validate_status_transition(permit_id, permit.status, to)?;
        permit.updated_at = Utc::now();

        tracing::info!(permit = %permit.number, status = %permit.status, "permit status changed");
        Ok(permit.clone())
    }

    // -- Remaining-quantity calculator --------------------------------------

    /// `declared_quantity − Σ(ledger quantity)` for one line item.
    pub fn remaining_quantity(
        &self,
        permit_id: &PermitId,
        line_item_id: &LineItemId,
    ) -> Result<Decimal, DispatchError> {
        let state = self.state.read();
        let permit = state
            .permits
            .get(permit_id)
            .ok_or_else(|| DispatchError::PermitNotFound(permit_id.clone()))?;
        let item = permit
            .line_item(line_item_id)
            .ok_or_else(|| DispatchError::LineItemNotFound {
                permit_id: permit_id.clone(),
                line_item_id: line_item_id.clone(),
            })?;
        Ok(state.ledger.remaining(item))
    }

    /// One-shot availability snapshot for a customer: every line item with
    /// remaining capacity on a non-terminal permit, ordered by permit
    /// number then line number. The snapshot is taken under a read lock;
    /// concurrent writers may invalidate it before a subsequent
    /// `create_dispatch`, which re-validates.
    pub fn list_available(&self, customer_id: &CustomerId) -> Vec<AvailableLine> {
        let state = self.state.read();
        let mut rows = Vec::new();
        for permit in state.permits.values() {
            if &permit.customer_id != customer_id || permit.status.is_terminal() {
                continue;
            }
            for item in &permit.line_items {
                let remaining = state.ledger.remaining(item);
                if remaining <= Decimal::ZERO {
                    continue;
                }
                rows.push(AvailableLine {
                    permit_id: permit.id.clone(),
                    permit_number: permit.number,
                    line_item_id: item.id.clone(),
                    line_number: item.line_number,
                    goods_code: item.goods_code.clone(),
                    description: item.description.clone(),
                    package_type: item.package_type.clone(),
                    remaining_quantity: remaining,
                    preview: prorate(item, remaining),
                });
            }
        }
        rows.sort_by_key(|row| (row.permit_number, row.line_number));
        rows
    }

    // -- Dispatch builder ---------------------------------------------------

    /// Build and commit a dispatch: draw the requested quantities from
    /// their line items, append one immutable ledger entry per request, and
    /// transition every fully consumed permit to `Dispatched`.
    ///
    /// Atomic: on any failure at any step nothing is written — no partial
    /// dispatch, no partial ledger append, no partial status change.
    pub fn create_dispatch(&self, new: NewDispatch) -> Result<DispatchOutcome, DispatchError> {
        if new.lines.is_empty() {
            return Err(DispatchError::EmptyRequest);
        }

        // Phase 1: validate and plan under the read lock.
        let (planned, observed) = {
            let state = self.state.read();
            self.plan_dispatch(&state, &new.customer_id, &new.lines)?
        };

        // Phase 2: commit under the write lock.
        let mut guard = self.state.write();
        let state = &mut *guard;

        for (line_item_id, revision) in &observed {
            if state.ledger.revision(line_item_id) != *revision {
                return Err(DispatchError::ConcurrencyConflict {
                    line_item_id: line_item_id.clone(),
                });
            }
        }
        // Revisions do not move on status edges, so a permit cancelled
        // between the phases must be re-checked explicitly.
        for planned_entry in &planned {
            let permit = state
                .permits
                .get(&planned_entry.permit_id)
                .ok_or_else(|| DispatchError::PermitNotFound(planned_entry.permit_id.clone()))?;
            if permit.status.is_terminal() {
                return Err(DispatchError::PermitNotDispatchable {
                    permit_id: permit.id.clone(),
                    status: permit.status,
                });
            }
        }

        // All checks passed: apply.
        let now = Utc::now();
        let dispatch_id = DispatchId::new();
        let mut entries = Vec::with_capacity(planned.len());
        for planned_entry in planned {
            state
                .ledger
                .record(&planned_entry.line_item_id, planned_entry.allocation.quantity);
            entries.push(DispatchLineEntry {
                entry_id: Uuid::new_v4(),
                dispatch_id: dispatch_id.clone(),
                permit_id: planned_entry.permit_id,
                line_item_id: planned_entry.line_item_id,
                line_number: planned_entry.line_number,
                goods_code: planned_entry.goods_code,
                description: planned_entry.description,
                package_type: planned_entry.package_type,
                quantity: planned_entry.allocation.quantity,
                weight: planned_entry.allocation.weight,
                value: planned_entry.allocation.value,
            });
        }

        let dispatch = Dispatch {
            id: dispatch_id.clone(),
            customer_id: new.customer_id,
            dispatch_date: new.dispatch_date,
            carrier: new.carrier,
            note: new.note,
            created_at: now,
            created_by: new.created_by.clone(),
            entries,
        };

        let mut dispatched_permits = Vec::new();
        for permit_id in dispatch.touched_permits() {
            // Presence was established by the status re-check under this
            // same write lock, and permits are never removed; nothing after
            // the ledger appends may fail.
            let Some(permit) = state.permits.get_mut(&permit_id) else {
                debug_assert!(false, "touched permit missing under write lock");
                continue;
            };
            if mark_dispatched_if_exhausted(permit, &state.ledger, &new.created_by, now) {
                dispatched_permits.push(permit_id);
            }
        }

        self.dispatches.insert(dispatch_id.clone(), dispatch.clone());
        tracing::info!(
            dispatch = %dispatch_id,
            lines = dispatch.entries.len(),
            dispatched_permits = dispatched_permits.len(),
            "dispatch committed"
        );
        Ok(DispatchOutcome {
            dispatch,
            dispatched_permits,
        })
    }

    /// Validate every line request in order, fail-fast, and plan the ledger
    /// appends. Returns the planned entries plus the observed revision per
    /// touched line item.
    fn plan_dispatch(
        &self,
        state: &EngineState,
        customer_id: &CustomerId,
        lines: &[DispatchLineRequest],
    ) -> Result<(Vec<PlannedEntry>, HashMap<LineItemId, u64>), DispatchError> {
        let mut planned = Vec::with_capacity(lines.len());
        let mut observed = HashMap::new();
        // Cumulative requested per line item, so duplicate lines within one
        // request are validated against the same remaining pool.
        let mut requested_so_far: HashMap<LineItemId, Decimal> = HashMap::new();

        for request in lines {
            let permit = state
                .permits
                .get(&request.permit_id)
                .ok_or_else(|| DispatchError::PermitNotFound(request.permit_id.clone()))?;
            if &permit.customer_id != customer_id {
                return Err(DispatchError::CustomerMismatch {
                    permit_id: permit.id.clone(),
                    permit_customer: permit.customer_id.clone(),
                    dispatch_customer: customer_id.clone(),
                });
            }
            if permit.status.is_terminal() {
                return Err(DispatchError::PermitNotDispatchable {
                    permit_id: permit.id.clone(),
                    status: permit.status,
                });
            }
            let item = permit.line_item(&request.line_item_id).ok_or_else(|| {
                DispatchError::LineItemNotFound {
                    permit_id: request.permit_id.clone(),
                    line_item_id: request.line_item_id.clone(),
                }
            })?;
            if request.quantity <= Decimal::ZERO {
                return Err(DispatchError::NonPositiveQuantity {
                    permit_id: request.permit_id.clone(),
                    line_item_id: request.line_item_id.clone(),
                    quantity: request.quantity,
                });
            }

            let cumulative = requested_so_far
                .get(&item.id)
                .copied()
                .unwrap_or(Decimal::ZERO)
                + request.quantity;
            let remaining = state.ledger.remaining(item);
            if cumulative > remaining {
                return Err(DispatchError::InsufficientQuantity {
                    permit_id: permit.id.clone(),
                    line_item_id: item.id.clone(),
                    requested: cumulative,
                    remaining,
                    shortfall: cumulative - remaining,
                });
            }
            requested_so_far.insert(item.id.clone(), cumulative);
            observed
                .entry(item.id.clone())
                .or_insert_with(|| state.ledger.revision(&item.id));

            planned.push(PlannedEntry {
                permit_id: permit.id.clone(),
                line_item_id: item.id.clone(),
                line_number: item.line_number,
                goods_code: item.goods_code.clone(),
                description: item.description.clone(),
                package_type: item.package_type.clone(),
                allocation: prorate(item, request.quantity),
            });
        }
        Ok((planned, observed))
    }

    /// Fetch a committed dispatch with its line entries.
    pub fn get_dispatch(&self, dispatch_id: &DispatchId) -> Result<Dispatch, DispatchError> {
        self.dispatches
            .get(dispatch_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DispatchError::DispatchNotFound(dispatch_id.clone()))
    }

    /// Delete a dispatch as a whole, reversing its consumption and
    /// re-running the status check on every permit it had touched. A permit
    /// whose `Dispatched` status no longer holds reverts to the status it
    /// held before the automatic edge fired; a `Cancelled` permit stays
    /// `Cancelled`.
    pub fn delete_dispatch(
        &self,
        dispatch_id: &DispatchId,
        actor: &ActorId,
    ) -> Result<DispatchReversal, DispatchError> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let (_, dispatch) = self
            .dispatches
            .remove(dispatch_id)
            .ok_or_else(|| DispatchError::DispatchNotFound(dispatch_id.clone()))?;

        for entry in &dispatch.entries {
            state.ledger.reverse(&entry.line_item_id, entry.quantity);
        }

        let now = Utc::now();
        let affected_permits = dispatch.touched_permits();
        let mut reverted_permits = Vec::new();
        for permit_id in &affected_permits {
            let Some(permit) = state.permits.get_mut(permit_id) else {
                continue;
            };
            if permit.status != PermitStatus::Dispatched {
                continue;
            }
            let regained = permit
                .line_items
                .iter()
                .any(|item| state.ledger.remaining(item) > Decimal::ZERO);
            if regained {
                permit.status = permit
                    .status_before_dispatch
                    .take()
                    .unwrap_or(PermitStatus::Approved);
                permit.dispatched_at = None;
                permit.dispatched_by = None;
                permit.updated_at = now;
                reverted_permits.push(permit_id.clone());
                tracing::info!(
                    permit = %permit.number,
                    status = %permit.status,
                    actor = %actor,
                    "dispatched status reverted by dispatch deletion"
                );
            }
        }

        tracing::info!(dispatch = %dispatch_id, actor = %actor, "dispatch deleted");
        Ok(DispatchReversal {
            dispatch_id: dispatch_id.clone(),
            affected_permits,
            reverted_permits,
        })
    }
}

impl Default for DispatchEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Automatic `→ Dispatched` edge: if every line item of the permit is fully
/// consumed, set `Dispatched` and stamp timestamp/actor/prior status.
/// Idempotent — a no-op on permits already in a terminal status.
fn mark_dispatched_if_exhausted(
    permit: &mut Permit,
    ledger: &ConsumptionIndex,
    actor: &ActorId,
    now: DateTime<Utc>,
) -> bool {
    if permit.status.is_terminal() {
        return false;
    }
    let exhausted = permit
        .line_items
        .iter()
        .all(|item| ledger.remaining(item).is_zero());
    if !exhausted {
        return false;
    }
    permit.status_before_dispatch = Some(permit.status);
    permit.status = PermitStatus::Dispatched;
    permit.dispatched_at = Some(now);
    permit.dispatched_by = Some(actor.clone());
    permit.updated_at = now;
    tracing::info!(permit = %permit.number, "permit fully dispatched");
    true
}

// SPDX-License-Identifier: BUSL-1.1
//! # Concurrent Dispatch — Race Tests
//!
//! Fires simultaneous `create_dispatch` calls at the same line item and
//! checks the non-negativity and conservation invariants on the committed
//! state. Losers must receive `InsufficientQuantity` or
//! `ConcurrencyConflict` — never a silent oversell.

use chrono::NaiveDate;
use lgp_core::{ActorId, CustomerId};
use lgp_engine::{
    DispatchEngine, DispatchError, DispatchLineRequest, NewDispatch, NewLineItem, NewPermit,
    Permit, PermitStatus,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Barrier};
use std::thread;

fn seeded_permit(engine: &DispatchEngine, customer: &CustomerId, quantity: Decimal) -> Permit {
    let permit = engine
        .create_permit(NewPermit {
            customer_id: customer.clone(),
            issuing_location: "Terminal 2".to_string(),
            valid_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            valid_until: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            lines: vec![NewLineItem {
                goods_code: "7208.39".to_string(),
                description: "Hot-rolled coil".to_string(),
                package_type: "coil".to_string(),
                quantity,
                weight: quantity * dec!(2),
                value: quantity * dec!(10),
                remarks: None,
            }],
        })
        .unwrap();
    engine.submit_permit(&permit.id).unwrap();
    engine.approve_permit(&permit.id).unwrap()
}

fn draw_request(customer: &CustomerId, permit: &Permit, quantity: Decimal) -> NewDispatch {
    NewDispatch {
        customer_id: customer.clone(),
        dispatch_date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
        carrier: None,
        note: None,
        created_by: ActorId::new(),
        lines: vec![DispatchLineRequest {
            permit_id: permit.id.clone(),
            line_item_id: permit.line_items[0].id.clone(),
            quantity,
        }],
    }
}

#[test]
fn two_racing_dispatches_of_sixty_against_one_hundred() {
    let engine = Arc::new(DispatchEngine::new());
    let customer = CustomerId::new();
    let permit = seeded_permit(&engine, &customer, dec!(100));

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            let customer = customer.clone();
            let permit = permit.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.create_dispatch(draw_request(&customer, &permit, dec!(60)))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one of the racing dispatches may win");
    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(
                    err,
                    DispatchError::InsufficientQuantity { .. }
                        | DispatchError::ConcurrencyConflict { .. }
                ),
                "unexpected loser error: {err}"
            );
        }
    }

    let remaining = engine
        .remaining_quantity(&permit.id, &permit.line_items[0].id)
        .unwrap();
    assert_eq!(remaining, dec!(40));
    assert_eq!(engine.get_permit(&permit.id).unwrap().status, PermitStatus::Approved);
}

#[test]
fn oversubscribed_threads_never_push_remaining_negative() {
    // 8 threads each want a quarter of the declared quantity: at most 4
    // requests can fit.
    const THREADS: usize = 8;
    let engine = Arc::new(DispatchEngine::new());
    let customer = CustomerId::new();
    let permit = seeded_permit(&engine, &customer, dec!(100));

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            let customer = customer.clone();
            let permit = permit.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.create_dispatch(draw_request(&customer, &permit, dec!(25)))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert!(successes >= 1, "the first committer always wins");
    assert!(successes <= 4, "oversell: {successes} quarters of 100 committed");

    let remaining = engine
        .remaining_quantity(&permit.id, &permit.line_items[0].id)
        .unwrap();
    assert!(remaining >= Decimal::ZERO);
    // Conservation against the committed dispatches.
    let dispatched: Decimal = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|outcome| outcome.dispatch.entries[0].quantity)
        .sum();
    assert_eq!(dec!(100), remaining + dispatched);
}

#[test]
fn retrying_on_conflict_fills_the_permit_exactly() {
    // Callers own the retry loop: with retries on ConcurrencyConflict,
    // exactly four quarter-requests commit and the permit transitions.
    const THREADS: usize = 6;
    let engine = Arc::new(DispatchEngine::new());
    let customer = CustomerId::new();
    let permit = seeded_permit(&engine, &customer, dec!(100));

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            let customer = customer.clone();
            let permit = permit.clone();
            thread::spawn(move || {
                barrier.wait();
                loop {
                    match engine.create_dispatch(draw_request(&customer, &permit, dec!(25))) {
                        Ok(outcome) => break Some(outcome),
                        Err(DispatchError::ConcurrencyConflict { .. }) => continue,
                        Err(
                            DispatchError::InsufficientQuantity { .. }
                            | DispatchError::PermitNotDispatchable { .. },
                        ) => break None,
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = outcomes.iter().flatten().count();
    assert_eq!(successes, 4);

    assert_eq!(
        engine
            .remaining_quantity(&permit.id, &permit.line_items[0].id)
            .unwrap(),
        dec!(0)
    );
    assert_eq!(engine.get_permit(&permit.id).unwrap().status, PermitStatus::Dispatched);
    // The transition fired in exactly one of the winning transactions.
    let transitions: usize = outcomes
        .iter()
        .flatten()
        .map(|outcome| outcome.dispatched_permits.len())
        .sum();
    assert_eq!(transitions, 1);
}

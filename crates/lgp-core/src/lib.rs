// SPDX-License-Identifier: BUSL-1.1
//! # lgp-core — Foundational Types
//!
//! Domain-primitive building blocks shared across the LGP dispatch engine:
//!
//! - **Identity** ([`identity`]): UUID-backed identifier newtypes plus the
//!   validated [`PermitNumber`] format (`LGP-<year>-<sequence>`). Each
//!   identifier is a distinct type — a [`PermitId`] cannot be passed where
//!   a [`LineItemId`] is expected.
//!
//! - **Errors** ([`error`]): the [`ValidationError`] hierarchy for domain
//!   primitives, built with `thiserror`. No `Box<dyn Error>`, no
//!   `.unwrap()` outside tests.

pub mod error;
pub mod identity;

// Re-export primary types.
pub use error::ValidationError;
pub use identity::{
    ActorId, CustomerId, DispatchId, LineItemId, PermitId, PermitNumber, PERMIT_NUMBER_PREFIX,
};

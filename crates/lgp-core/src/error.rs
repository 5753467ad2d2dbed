// SPDX-License-Identifier: BUSL-1.1
//! # Validation Error Hierarchy
//!
//! Structured errors for domain primitive construction, built with
//! `thiserror`. Each variant carries the invalid input and the expected
//! format so that callers can diagnose bad data without guesswork.

use thiserror::Error;

/// Validation errors for domain primitive newtypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Permit number does not conform to the `LGP-YYYY-NNNN` format.
    #[error("invalid permit number: \"{0}\" (expected LGP-<4-digit year>-<4-digit sequence>)")]
    InvalidPermitNumber(String),

    /// Permit number sequence component is outside the printable range.
    /// Sequences are 1-based and zero-padded to four digits.
    #[error("permit sequence {sequence} out of range for year {year} (expected 1..=9999)")]
    PermitSequenceOutOfRange {
        /// The calendar year component.
        year: i32,
        /// The rejected sequence value.
        sequence: u32,
    },

    /// Permit number year component is implausible for a permit register.
    #[error("permit year {0} out of range (expected 2000..=9999)")]
    PermitYearOutOfRange(i32),

    /// A required free-text field was empty or whitespace-only.
    #[error("field \"{0}\" must not be empty")]
    EmptyField(&'static str),
}

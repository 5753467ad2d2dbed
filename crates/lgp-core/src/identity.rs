// SPDX-License-Identifier: BUSL-1.1
//! # Identity Newtypes
//!
//! Domain-primitive newtypes for identifiers throughout the LGP dispatch
//! engine. Each identifier is a distinct type — you cannot pass a
//! [`PermitId`] where a [`LineItemId`] is expected.
//!
//! ## Validation
//!
//! The string-based [`PermitNumber`] validates its format at construction
//! time. UUID-based identifiers ([`CustomerId`], [`PermitId`],
//! [`LineItemId`], [`DispatchId`], [`ActorId`]) are always valid by
//! construction.
//!
//! ## Format Reference
//!
//! - Permit number: `LGP-<4-digit year>-<4-digit sequence>`, sequence
//!   1-based, zero-padded, reset per calendar year (e.g. `LGP-2024-0007`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Prefix of every permit number, including the trailing separator.
pub const PERMIT_NUMBER_PREFIX: &str = "LGP-";

// ---------------------------------------------------------------------------
// UUID-based identifiers (always valid by construction)
// ---------------------------------------------------------------------------

macro_rules! uuid_newtype {
    ($(#[$doc:meta])* $ty:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $ty(Uuid);

        impl $ty {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $ty {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $ty {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s).map(Self)
            }
        }
    };
}

uuid_newtype! {
    /// A unique identifier for a customer holding permits and receiving
    /// dispatches.
    CustomerId
}

uuid_newtype! {
    /// A unique identifier for a Local Goods Permit.
    PermitId
}

uuid_newtype! {
    /// A unique identifier for a single goods line on a permit.
    LineItemId
}

uuid_newtype! {
    /// A unique identifier for a dispatch (one transactional release of
    /// goods).
    DispatchId
}

uuid_newtype! {
    /// A unique identifier for the human or system actor performing an
    /// operation. Always passed explicitly — never read from ambient
    /// request state.
    ActorId
}

// ---------------------------------------------------------------------------
// Permit number (validated string format)
// ---------------------------------------------------------------------------

/// A human-readable permit number in the `LGP-YYYY-NNNN` format.
///
/// Assigned once at permit creation; the sequence component is monotonic
/// within a calendar year and resets each year. Ordering follows
/// (year, sequence), so sorting permit numbers yields issuance order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermitNumber {
    year: i32,
    sequence: u32,
}

impl PermitNumber {
    /// Construct from raw year and sequence components, validating ranges.
    pub fn from_parts(year: i32, sequence: u32) -> Result<Self, ValidationError> {
        if !(2000..=9999).contains(&year) {
            return Err(ValidationError::PermitYearOutOfRange(year));
        }
        if !(1..=9999).contains(&sequence) {
            return Err(ValidationError::PermitSequenceOutOfRange { year, sequence });
        }
        Ok(Self { year, sequence })
    }

    /// Parse a permit number from its canonical string form.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let raw = raw.as_ref();
        let invalid = || ValidationError::InvalidPermitNumber(raw.to_string());

        let rest = raw.strip_prefix(PERMIT_NUMBER_PREFIX).ok_or_else(invalid)?;
        let (year_part, seq_part) = rest.split_once('-').ok_or_else(invalid)?;
        if year_part.len() != 4 || seq_part.len() != 4 {
            return Err(invalid());
        }
        let year: i32 = year_part.parse().map_err(|_| invalid())?;
        let sequence: u32 = seq_part.parse().map_err(|_| invalid())?;

        Self::from_parts(year, sequence)
    }

    /// The calendar year component.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// The 1-based sequence component within the year.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl std::fmt::Display for PermitNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{:04}-{:04}",
            PERMIT_NUMBER_PREFIX, self.year, self.sequence
        )
    }
}

impl std::str::FromStr for PermitNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for PermitNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Deserializes as a plain string, then routes through [`PermitNumber::new`]
/// so that malformed numbers are rejected at deserialization time — not
/// silently accepted.
impl<'de> Deserialize<'de> for PermitNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permit_number_roundtrips_canonical_form() {
        let number = PermitNumber::new("LGP-2024-0007").unwrap();
        assert_eq!(number.year(), 2024);
        assert_eq!(number.sequence(), 7);
        assert_eq!(number.to_string(), "LGP-2024-0007");
    }

    #[test]
    fn permit_number_rejects_malformed_input() {
        for raw in [
            "",
            "LGP-2024-7",
            "LGP-24-0007",
            "lgp-2024-0007",
            "LGP-2024-0000",
            "LGP-2024_0007",
            "GDP-2024-0007",
            "LGP-2024-00071",
        ] {
            assert!(PermitNumber::new(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn permit_number_from_parts_validates_ranges() {
        assert!(PermitNumber::from_parts(2024, 1).is_ok());
        assert!(PermitNumber::from_parts(2024, 9999).is_ok());
        assert!(matches!(
            PermitNumber::from_parts(2024, 0),
            Err(ValidationError::PermitSequenceOutOfRange { .. })
        ));
        assert!(matches!(
            PermitNumber::from_parts(2024, 10_000),
            Err(ValidationError::PermitSequenceOutOfRange { .. })
        ));
        assert!(matches!(
            PermitNumber::from_parts(1999, 1),
            Err(ValidationError::PermitYearOutOfRange(_))
        ));
    }

    #[test]
    fn permit_number_orders_by_year_then_sequence() {
        let a = PermitNumber::from_parts(2023, 9999).unwrap();
        let b = PermitNumber::from_parts(2024, 1).unwrap();
        let c = PermitNumber::from_parts(2024, 2).unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn permit_number_serde_uses_string_form() {
        let number = PermitNumber::new("LGP-2025-0042").unwrap();
        let json = serde_json::to_string(&number).unwrap();
        assert_eq!(json, "\"LGP-2025-0042\"");
        let back: PermitNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, number);
        assert!(serde_json::from_str::<PermitNumber>("\"LGP-25-01\"").is_err());
    }

    #[test]
    fn uuid_identifiers_are_distinct_types_with_display() {
        let permit = PermitId::new();
        let parsed: PermitId = permit.to_string().parse().unwrap();
        assert_eq!(parsed, permit);
        assert_ne!(PermitId::new(), PermitId::new());
    }
}

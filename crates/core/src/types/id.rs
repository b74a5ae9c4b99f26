//! Identifiers for principals and records.
//!
//! Two kinds of identifier exist:
//! - [`SequenceNumber`] - the human-facing number minted by a named counter
//!   (customer #42, invoice #1007).
//! - UUID-backed ids created with [`define_uuid_id!`] for everything that is
//!   never read aloud (principals, ledger entries, payments).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe UUID wrapper.
///
/// Creates a newtype wrapper around [`Uuid`] with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - `generate()`, `from_uuid()`, `as_uuid()`
/// - `Display` and `FromStr` using the hyphenated form
///
/// # Example
///
/// ```rust
/// # use backoffice_core::define_uuid_id;
/// define_uuid_id!(InvoiceLineId);
/// define_uuid_id!(NoteId);
///
/// let line = InvoiceLineId::generate();
/// let parsed: InvoiceLineId = line.to_string().parse().unwrap();
/// assert_eq!(line, parsed);
///
/// // These are different types, so this won't compile:
/// // let _: NoteId = line;
/// ```
#[macro_export]
macro_rules! define_uuid_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Generate a fresh random id.
            #[must_use]
            pub fn generate() -> Self {
                Self(::uuid::Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(id: ::uuid::Uuid) -> Self {
                Self(id)
            }

            /// Get the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> ::uuid::Uuid {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                ::uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_uuid_id!(PrincipalUid);
define_uuid_id!(EntryId);

/// Errors that can occur when constructing a [`SequenceNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceNumberError {
    /// Sequence numbers start at 1.
    #[error("sequence numbers must be positive (got {0})")]
    NotPositive(i64),
    /// The input is not an integer.
    #[error("invalid sequence number: {0}")]
    Invalid(String),
}

/// A positive, human-facing sequence number minted by a named counter.
///
/// ```
/// use backoffice_core::SequenceNumber;
///
/// let first = SequenceNumber::FIRST;
/// assert_eq!(first.get(), 1);
/// assert!(SequenceNumber::new(0).is_err());
/// assert_eq!("42".parse::<SequenceNumber>().unwrap().get(), 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct SequenceNumber(i64);

impl SequenceNumber {
    /// The number handed out by a freshly created counter.
    pub const FIRST: Self = Self(1);

    /// Create a sequence number.
    ///
    /// # Errors
    ///
    /// Returns `SequenceNumberError::NotPositive` for zero or negative values.
    pub const fn new(value: i64) -> Result<Self, SequenceNumberError> {
        if value < 1 {
            return Err(SequenceNumberError::NotPositive(value));
        }
        Ok(Self(value))
    }

    /// Get the underlying value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SequenceNumber {
    type Err = SequenceNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .parse::<i64>()
            .map_err(|_| SequenceNumberError::Invalid(s.to_owned()))?;
        Self::new(value)
    }
}

impl TryFrom<i64> for SequenceNumber {
    type Error = SequenceNumberError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SequenceNumber> for i64 {
    fn from(number: SequenceNumber) -> Self {
        number.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_number_rejects_non_positive() {
        assert_eq!(
            SequenceNumber::new(0),
            Err(SequenceNumberError::NotPositive(0))
        );
        assert!(SequenceNumber::new(-7).is_err());
        assert_eq!(SequenceNumber::new(9).unwrap().get(), 9);
    }

    #[test]
    fn test_sequence_number_deserialize_validates() {
        let ok: SequenceNumber = serde_json::from_str("12").unwrap();
        assert_eq!(ok.get(), 12);
        assert!(serde_json::from_str::<SequenceNumber>("0").is_err());
        assert!(serde_json::from_str::<SequenceNumber>("\"12\"").is_err());
    }

    #[test]
    fn test_sequence_number_ordering() {
        let a = SequenceNumber::new(2).unwrap();
        let b = SequenceNumber::new(10).unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_sequence_number_parse_garbage() {
        assert!(matches!(
            "abc".parse::<SequenceNumber>(),
            Err(SequenceNumberError::Invalid(_))
        ));
    }

    #[test]
    fn test_principal_uid_display_and_parse() {
        let uid = PrincipalUid::generate();
        let parsed: PrincipalUid = uid.to_string().parse().unwrap();
        assert_eq!(uid, parsed);
        assert!("not-a-uuid".parse::<PrincipalUid>().is_err());
    }
}

//! Domain models for the back office.
//!
//! Every business entity is an explicit typed record. Documents are decoded
//! into these types on read and checked with [`Record::validate`] before every
//! write, so a malformed document is rejected at the boundary instead of
//! flowing into reports.

pub mod catalog;
pub mod customer;
pub mod invoice;
pub mod ledger;
pub mod payment;
pub mod profile;
pub mod session;
pub mod staff;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use backoffice_core::CounterName;

use crate::db::Collection;

pub use catalog::{Policy, ServiceOffering};
pub use customer::Customer;
pub use invoice::{Invoice, InvoiceLine};
pub use ledger::{Expense, Income, LedgerEntry};
pub use payment::Payment;
pub use profile::UserProfile;
pub use session::{Principal, keys as session_keys};
pub use staff::StaffMember;

/// A record failed a validation rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// The offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error for a field.
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Reject an empty or whitespace-only string field.
pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

/// Largest money figure a single record may carry, in whole currency units.
///
/// Keeps every report sum far below `Decimal::MAX`.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Reject a money figure above [`MAX_AMOUNT`].
pub(crate) fn require_bounded(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value > Decimal::from(MAX_AMOUNT) {
        return Err(ValidationError::new(field, format!("must not exceed {MAX_AMOUNT}")));
    }
    Ok(())
}

/// A typed business record stored in a document collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection holding this record type.
    const COLLECTION: Collection;

    /// Counter that numbers new records.
    ///
    /// Records without a sequence are keyed by a random UUID.
    fn sequence() -> Option<CounterName> {
        None
    }

    /// Check the record's business rules.
    ///
    /// # Errors
    ///
    /// Returns the first rule the record violates.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// A record together with its key and document version.
///
/// Serialized flat: `{"id": "...", "version": 3, ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stored<R> {
    /// Document key (a sequence number or a UUID).
    pub id: String,
    /// Document version, required when updating.
    pub version: i64,
    /// The record itself.
    #[serde(flatten)]
    pub record: R,
}

/// Update payload: the version the client last read plus the new fields.
#[derive(Debug, Clone, Deserialize)]
pub struct Versioned<R> {
    /// Version the client based its edit on.
    pub version: i64,
    /// The replacement record.
    #[serde(flatten)]
    pub record: R,
}

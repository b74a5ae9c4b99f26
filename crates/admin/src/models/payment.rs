//! Payments received against invoices.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use backoffice_core::{PaymentMethod, SequenceNumber};

use super::{Record, ValidationError, require_bounded};
use crate::db::Collection;

/// A payment received against an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub invoice_number: SequenceNumber,
    pub amount: Decimal,
    pub received_on: NaiveDate,
    #[serde(default)]
    pub method: PaymentMethod,
    /// Bank reference or cheque number.
    #[serde(default)]
    pub reference: Option<String>,
}

impl Record for Payment {
    const COLLECTION: Collection = Collection::Payments;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::new("amount", "must be positive"));
        }
        require_bounded("amount", self.amount)
    }
}

//! Invoices.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use backoffice_core::{CounterName, InvoiceStatus, SequenceNumber};

use super::{Record, ValidationError, require_bounded, require_text};
use crate::db::Collection;

/// A single billed line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl InvoiceLine {
    /// Quantity times unit price, or `None` on overflow.
    #[must_use]
    pub fn amount(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }
}

/// An invoice, numbered by `invoiceCounter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Number of the billed customer.
    pub customer_number: SequenceNumber,
    pub issued_on: NaiveDate,
    pub due_on: NaiveDate,
    #[serde(default)]
    pub status: InvoiceStatus,
    pub lines: Vec<InvoiceLine>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Invoice {
    /// Sum of all line amounts, or `None` on overflow.
    #[must_use]
    pub fn total(&self) -> Option<Decimal> {
        self.lines
            .iter()
            .try_fold(Decimal::ZERO, |sum, line| sum.checked_add(line.amount()?))
    }
}

impl Record for Invoice {
    const COLLECTION: Collection = Collection::Invoices;

    fn sequence() -> Option<CounterName> {
        Some(CounterName::INVOICE)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.lines.is_empty() {
            return Err(ValidationError::new("lines", "at least one line is required"));
        }
        for line in &self.lines {
            require_text("lines.description", &line.description)?;
            if line.quantity <= Decimal::ZERO {
                return Err(ValidationError::new("lines.quantity", "must be positive"));
            }
            if line.unit_price < Decimal::ZERO {
                return Err(ValidationError::new("lines.unit_price", "must not be negative"));
            }
            require_bounded("lines.quantity", line.quantity)?;
            require_bounded("lines.unit_price", line.unit_price)?;
        }
        match self.total() {
            Some(total) => require_bounded("lines", total)?,
            None => return Err(ValidationError::new("lines", "total is too large")),
        }
        if self.due_on < self.issued_on {
            return Err(ValidationError::new("due_on", "must not precede issued_on"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn invoice(lines: serde_json::Value, due_on: &str) -> Invoice {
        serde_json::from_value(json!({
            "customer_number": 3,
            "issued_on": "2026-02-01",
            "due_on": due_on,
            "lines": lines,
        }))
        .unwrap()
    }

    #[test]
    fn test_total_sums_lines() {
        let inv = invoice(
            json!([
                {"description": "Bookkeeping", "quantity": "2", "unit_price": "150.00"},
                {"description": "Filing fee", "quantity": "1", "unit_price": "35.50"},
            ]),
            "2026-03-01",
        );
        assert_eq!(inv.total(), Some(Decimal::new(33550, 2)));
        assert_eq!(inv.status, InvoiceStatus::Draft);
        assert!(inv.validate().is_ok());
    }

    #[test]
    fn test_rules() {
        assert_eq!(invoice(json!([]), "2026-03-01").validate().unwrap_err().field, "lines");

        let zero_qty = invoice(
            json!([{"description": "x", "quantity": "0", "unit_price": "1"}]),
            "2026-03-01",
        );
        assert_eq!(zero_qty.validate().unwrap_err().field, "lines.quantity");

        let early_due = invoice(
            json!([{"description": "x", "quantity": "1", "unit_price": "1"}]),
            "2026-01-15",
        );
        assert_eq!(early_due.validate().unwrap_err().field, "due_on");
    }

    #[test]
    fn test_amounts_are_bounded() {
        let huge = invoice(
            json!([{"description": "x", "quantity": "79228162514264337593543950335", "unit_price": "2"}]),
            "2026-03-01",
        );
        assert_eq!(huge.lines[0].amount(), None);
        assert_eq!(huge.total(), None);
        assert_eq!(huge.validate().unwrap_err().field, "lines.quantity");

        let pricey = invoice(
            json!([{"description": "x", "quantity": "1", "unit_price": "1000000000001"}]),
            "2026-03-01",
        );
        assert_eq!(pricey.validate().unwrap_err().field, "lines.unit_price");

        // Each factor is within bounds but the product is not.
        let product = invoice(
            json!([{"description": "x", "quantity": "1000000", "unit_price": "1000000000"}]),
            "2026-03-01",
        );
        assert_eq!(product.validate().unwrap_err().field, "lines");

        let at_limit = invoice(
            json!([
                {"description": "x", "quantity": "1", "unit_price": "999999999999"},
                {"description": "y", "quantity": "1", "unit_price": "1"},
            ]),
            "2026-03-01",
        );
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_customer_number_must_be_positive() {
        let result = serde_json::from_value::<Invoice>(json!({
            "customer_number": 0,
            "issued_on": "2026-02-01",
            "due_on": "2026-02-01",
            "lines": [],
        }));
        assert!(result.is_err());
    }
}

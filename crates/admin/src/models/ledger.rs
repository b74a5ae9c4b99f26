//! Income and expense ledger entries.
//!
//! Both collections share one entry shape. [`Income`] and [`Expense`] are
//! transparent wrappers so each maps to its own collection.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Record, ValidationError, require_bounded, require_text};
use crate::db::Collection;

/// A single ledger line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Grouping used in reports (e.g. "rent", "consulting").
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub amount: Decimal,
    pub occurred_on: NaiveDate,
}

impl LedgerEntry {
    fn check(&self) -> Result<(), ValidationError> {
        require_text("category", &self.category)?;
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::new("amount", "must be positive"));
        }
        require_bounded("amount", self.amount)
    }
}

/// Money received outside of invoicing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Income(pub LedgerEntry);

/// Money spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expense(pub LedgerEntry);

impl Record for Income {
    const COLLECTION: Collection = Collection::Income;

    fn validate(&self) -> Result<(), ValidationError> {
        self.0.check()
    }
}

impl Record for Expense {
    const COLLECTION: Collection = Collection::Expenses;

    fn validate(&self) -> Result<(), ValidationError> {
        self.0.check()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_expense_is_flat_on_the_wire() {
        let expense: Expense = serde_json::from_value(json!({
            "category": "rent",
            "amount": "1200.00",
            "occurred_on": "2026-01-31",
        }))
        .unwrap();
        assert!(expense.validate().is_ok());
        assert_eq!(serde_json::to_value(&expense).unwrap()["category"], "rent");
    }

    #[test]
    fn test_amount_must_be_positive() {
        let income: Income = serde_json::from_value(json!({
            "category": "consulting",
            "amount": "0",
            "occurred_on": "2026-01-31",
        }))
        .unwrap();
        assert_eq!(income.validate().unwrap_err().field, "amount");
    }

    #[test]
    fn test_amount_is_bounded() {
        let entry = |amount: &str| -> Income {
            serde_json::from_value(json!({
                "category": "consulting",
                "amount": amount,
                "occurred_on": "2026-01-31",
            }))
            .unwrap()
        };
        assert!(entry("1000000000000").validate().is_ok());
        assert_eq!(entry("1000000000000.01").validate().unwrap_err().field, "amount");
        assert_eq!(
            entry("79228162514264337593543950335").validate().unwrap_err().field,
            "amount"
        );
    }
}

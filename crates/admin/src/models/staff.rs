//! Staff records and payroll figures.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use backoffice_core::{CounterName, Email};

use super::{Record, ValidationError, require_bounded, require_text};
use crate::db::Collection;

/// A staff member, numbered by `staffCounter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub name: String,
    pub email: Email,
    /// Job title.
    pub position: String,
    /// Gross monthly salary in the configured currency.
    pub monthly_salary: Decimal,
    pub hired_on: NaiveDate,
    /// Inactive staff are kept for history but excluded from payroll.
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl Record for StaffMember {
    const COLLECTION: Collection = Collection::Staff;

    fn sequence() -> Option<CounterName> {
        Some(CounterName::STAFF)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_text("position", &self.position)?;
        if self.monthly_salary < Decimal::ZERO {
            return Err(ValidationError::new("monthly_salary", "must not be negative"));
        }
        require_bounded("monthly_salary", self.monthly_salary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn staff(salary: &str) -> StaffMember {
        serde_json::from_value(json!({
            "name": "Sam Lee",
            "email": "sam@example.com",
            "position": "Accountant",
            "monthly_salary": salary,
            "hired_on": "2025-03-01",
        }))
        .unwrap()
    }

    #[test]
    fn test_defaults_to_active() {
        assert!(staff("4200.00").active);
    }

    #[test]
    fn test_salary_must_not_be_negative() {
        assert!(staff("0").validate().is_ok());
        assert_eq!(staff("-1").validate().unwrap_err().field, "monthly_salary");
        assert_eq!(
            staff("5000000000000").validate().unwrap_err().field,
            "monthly_salary"
        );
    }
}

//! Customer records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_core::{CounterName, CustomerTier, Email};

use super::{Record, ValidationError, require_text};
use crate::db::Collection;

/// A customer, numbered by `customerCounter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer or company name.
    pub name: String,
    /// Contact email.
    #[serde(default)]
    pub email: Option<Email>,
    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Postal address, free-form.
    #[serde(default)]
    pub address: Option<String>,
    /// Pricing tier.
    #[serde(default)]
    pub tier: CustomerTier,
    /// Internal notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// When the customer was added.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Record for Customer {
    const COLLECTION: Collection = Collection::Customers;

    fn sequence() -> Option<CounterName> {
        Some(CounterName::CUSTOMER)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)
    }
}

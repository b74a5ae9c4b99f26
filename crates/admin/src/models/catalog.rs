//! Service catalog and policy documents.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Record, ValidationError, require_bounded, require_text};
use crate::db::Collection;

/// A service the business sells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// List price in the configured currency.
    pub price: Decimal,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl Record for ServiceOffering {
    const COLLECTION: Collection = Collection::Services;

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        if self.price < Decimal::ZERO {
            return Err(ValidationError::new("price", "must not be negative"));
        }
        require_bounded("price", self.price)
    }
}

/// A published business policy (refunds, privacy, terms).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub title: String,
    pub body: String,
    pub effective_on: NaiveDate,
}

impl Record for Policy {
    const COLLECTION: Collection = Collection::Policies;

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        require_text("body", &self.body)
    }
}

//! Counter names for sequential identifier allocation.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`CounterName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CounterNameError {
    /// The name is empty.
    #[error("counter name cannot be empty")]
    Empty,
    /// The name is too long.
    #[error("counter name must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The name contains a character outside `[A-Za-z0-9_-]`.
    #[error("counter name contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// The name of a persisted counter (e.g. `customerCounter`).
///
/// Names double as document keys in the `counters` collection, so the
/// character set is restricted to ASCII alphanumerics, `_` and `-`.
///
/// ```
/// use backoffice_core::CounterName;
///
/// assert_eq!(CounterName::CUSTOMER.as_str(), "customerCounter");
/// assert!(CounterName::parse("quoteCounter").is_ok());
/// assert!(CounterName::parse("").is_err());
/// assert!(CounterName::parse("bad name").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CounterName(std::borrow::Cow<'static, str>);

impl CounterName {
    /// Maximum length of a counter name.
    pub const MAX_LENGTH: usize = 64;

    /// Numbers customer records.
    pub const CUSTOMER: Self = Self(std::borrow::Cow::Borrowed("customerCounter"));
    /// Numbers staff records.
    pub const STAFF: Self = Self(std::borrow::Cow::Borrowed("staffCounter"));
    /// Numbers invoices.
    pub const INVOICE: Self = Self(std::borrow::Cow::Borrowed("invoiceCounter"));

    /// Parse a counter name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, longer than
    /// [`CounterName::MAX_LENGTH`], or contains characters other than ASCII
    /// alphanumerics, `_` and `-`.
    pub fn parse(s: &str) -> Result<Self, CounterNameError> {
        if s.is_empty() {
            return Err(CounterNameError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(CounterNameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(CounterNameError::InvalidCharacter(c));
        }
        Ok(Self(std::borrow::Cow::Owned(s.to_owned())))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CounterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CounterName {
    type Err = CounterNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CounterName {
    type Error = CounterNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CounterName> for String {
    fn from(name: CounterName) -> Self {
        name.0.into_owned()
    }
}

//! Profile user types.

use serde::{Deserialize, Serialize};

/// The role recorded on a user profile (`usertype`).
///
/// Only [`UserType::Admin`] and [`UserType::Staff`] may open the back office.
/// Self-registered accounts start as [`UserType::Customer`] and must be
/// promoted by an administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    /// Full access including user management.
    Admin,
    /// Day-to-day back-office access.
    Staff,
    /// Regular customer account.
    #[default]
    Customer,
    /// Customer with VIP pricing.
    Vip,
    /// Wholesale buyer account.
    Wholesale,
    /// Developer account for integrations.
    Developer,
}

impl UserType {
    /// Every user type, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Admin,
        Self::Staff,
        Self::Customer,
        Self::Vip,
        Self::Wholesale,
        Self::Developer,
    ];

    /// Whether this user type may open the back office.
    #[must_use]
    pub const fn is_back_office(self) -> bool {
        matches!(self, Self::Admin | Self::Staff)
    }

    /// Returns the wire name of the user type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::Customer => "customer",
            Self::Vip => "vip",
            Self::Wholesale => "wholesale",
            Self::Developer => "developer",
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("invalid user type: {s}"))
    }
}

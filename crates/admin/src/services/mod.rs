//! Business logic services for the back office.
//!
//! # Services
//!
//! - `allocator` - Sequential ID allocation from named counters
//! - `auth` - `WebAuthn` passkey-only authentication
//! - `guard` - Access guard and per-navigation state
//! - `push` - Push notification forwarding
//! - `records` - Record creation with sequential numbering
//! - `reports` - Dashboard financial summary

pub mod allocator;
pub mod auth;
pub mod guard;
pub mod push;
pub mod records;
pub mod reports;

pub use allocator::{AllocatorError, IdAllocator};
pub use auth::{AuthError, AuthService, PendingLogin, PendingRegistration};
pub use guard::{
    AccessGuard, Authorization, DenialReason, GuardState, GuardStatus, NavigationSession,
    PublicPaths,
};
pub use push::{PushClient, PushError, PushNotification};
pub use records::{RecordError, RecordService};
pub use reports::FinancialSummary;

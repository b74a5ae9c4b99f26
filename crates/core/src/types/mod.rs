//! Core types for the back office.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod counter;
pub mod email;
pub mod id;
pub mod money;
pub mod status;
pub mod user_type;

pub use counter::{CounterName, CounterNameError};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, Money};
pub use status::*;
pub use user_type::UserType;

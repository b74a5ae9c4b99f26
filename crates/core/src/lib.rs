//! Back-office core - shared types library.
//!
//! This crate provides the types shared by the back-office components:
//! - `admin` - The back-office server (records, invoices, payroll, reports)
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Every type validates its input on construction and on
//! deserialization, so a value that exists is a value that is valid.
//!
//! # Modules
//!
//! - [`types`] - Sequence numbers, counter names, user types, emails, money and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

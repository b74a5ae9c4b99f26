//! Sequence counter commands.

use std::sync::Arc;

use thiserror::Error;

use backoffice_admin::db::PgDocumentStore;
use backoffice_admin::services::{AllocatorError, IdAllocator};
use backoffice_core::{CounterName, CounterNameError};

use super::{CommandError, connect};

/// Errors from counter commands.
#[derive(Debug, Error)]
pub enum CounterError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error(transparent)]
    Allocator(#[from] AllocatorError),

    #[error("Invalid counter name: {0}")]
    InvalidName(#[from] CounterNameError),
}

async fn allocator() -> Result<IdAllocator, CounterError> {
    let store = PgDocumentStore::new(connect().await?);
    Ok(IdAllocator::new(Arc::new(store)))
}

/// Print a counter's last issued value.
pub async fn show(name: &str) -> Result<(), CounterError> {
    let counter = CounterName::parse(name)?;
    let current = allocator().await?.current(&counter).await?;

    #[allow(clippy::print_stdout)]
    {
        match current {
            Some(value) => println!("{counter} = {value}"),
            None => println!("{counter} has not issued any numbers"),
        }
    }
    Ok(())
}

/// Raise a counter to at least `floor`.
pub async fn advance(name: &str, floor: i64) -> Result<(), CounterError> {
    let counter = CounterName::parse(name)?;
    let value = allocator().await?.advance_to(&counter, floor).await?;

    tracing::info!("{counter} now at {value}; next number is {}", value + 1);
    Ok(())
}

//! Database migration command.
//!
//! Migrations live in `crates/admin/migrations/` and are embedded at build
//! time. They never run on server start-up.

use thiserror::Error;

use super::{CommandError, connect};

/// Errors from running migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the back-office migrations.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running back-office migrations...");
    sqlx::migrate!("../admin/migrations").run(&pool).await?;

    tracing::info!("Back-office migrations complete!");
    Ok(())
}

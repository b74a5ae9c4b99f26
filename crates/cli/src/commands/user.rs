//! User profile commands.
//!
//! Self-registered accounts start as `customer`. `set-type` is the
//! out-of-band promotion step that lets someone into the back office.

use thiserror::Error;

use backoffice_admin::db::{PgDocumentStore, ProfileRepository, RepositoryError};
use backoffice_core::{Email, EmailError, UserType};

use super::{CommandError, connect};

/// Errors from user commands.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid user type: {0}. Valid types: admin, staff, customer, vip, wholesale, developer")]
    InvalidUserType(String),

    #[error("No profile with email: {0}")]
    NotFound(String),
}

/// Print every profile.
pub async fn list() -> Result<(), UserError> {
    let store = PgDocumentStore::new(connect().await?);
    let profiles = ProfileRepository::new(&store).list().await?;

    #[allow(clippy::print_stdout)]
    {
        for profile in &profiles {
            println!(
                "{}  {:<10} {}  ({})",
                profile.uid, profile.user_type, profile.email, profile.display_name
            );
        }
        println!("{} profile(s)", profiles.len());
    }
    Ok(())
}

/// Change the user type of the profile with `email`.
pub async fn set_type(email: &str, user_type: &str) -> Result<(), UserError> {
    let user_type: UserType = user_type
        .parse()
        .map_err(|_| UserError::InvalidUserType(user_type.to_owned()))?;
    let email = Email::parse(email)?;

    let store = PgDocumentStore::new(connect().await?);
    let profiles = ProfileRepository::new(&store);

    let profile = profiles
        .find_by_email(&email)
        .await?
        .ok_or_else(|| UserError::NotFound(email.to_string()))?;

    let updated = profiles.set_user_type(profile.uid, user_type).await?;

    tracing::info!(
        "User type changed: {} is now {} (was {})",
        updated.email,
        updated.user_type,
        profile.user_type
    );
    Ok(())
}

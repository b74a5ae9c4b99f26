//! User management (admin only).
//!
//! Self-registered profiles start as customers; this is where an
//! administrator promotes them into the back office.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use serde::Deserialize;

use backoffice_core::{PrincipalUid, UserType};

use crate::db::ProfileRepository;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::UserProfile;
use crate::state::AppState;

/// Build the user management router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list))
        .route("/api/users/{uid}/usertype", put(set_user_type))
}

/// GET /api/users
async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    let profiles = ProfileRepository::new(state.store()).list().await?;
    Ok(Json(profiles))
}

/// Request to change a profile's user type.
#[derive(Debug, Deserialize)]
pub struct SetUserTypeRequest {
    pub usertype: UserType,
}

/// PUT /api/users/{uid}/usertype
async fn set_user_type(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(uid): Path<String>,
    Json(req): Json<SetUserTypeRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let uid: PrincipalUid = uid
        .parse()
        .map_err(|_| AppError::BadRequest("invalid user id".to_owned()))?;

    // An administrator cannot lock themselves out.
    if uid == admin.principal.uid && req.usertype != UserType::Admin {
        return Err(AppError::BadRequest(
            "administrators cannot change their own user type".to_owned(),
        ));
    }

    let profile = ProfileRepository::new(state.store())
        .set_user_type(uid, req.usertype)
        .await?;

    tracing::info!(
        target_uid = %uid,
        usertype = %req.usertype,
        by = %admin.principal.uid,
        "User type changed via API"
    );
    Ok(Json(profile))
}

//! Push notification forwarding.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde_json::{Value as JsonValue, json};

use crate::error::AppError;
use crate::middleware::BackOffice;
use crate::services::PushNotification;
use crate::state::AppState;

/// Build the notification router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/notifications/send", post(send))
}

/// Forward a notification to the messaging provider.
///
/// POST /api/notifications/send
async fn send(
    State(state): State<AppState>,
    BackOffice(auth): BackOffice,
    Json(notification): Json<PushNotification>,
) -> Result<(StatusCode, Json<JsonValue>), AppError> {
    let push = state
        .push()
        .ok_or_else(|| AppError::NotConfigured("push notifications".to_owned()))?;

    push.send(&notification).await?;

    tracing::info!(uid = %auth.principal.uid, "Push notification forwarded");
    Ok((StatusCode::ACCEPTED, Json(json!({ "sent": true }))))
}

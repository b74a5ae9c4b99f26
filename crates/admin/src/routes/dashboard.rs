//! Dashboard route handlers.

use axum::{
    Json, Router,
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
};

use crate::error::AppError;
use crate::middleware::BackOffice;
use crate::services::FinancialSummary;
use crate::state::AppState;

/// Build the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/api/dashboard/summary", get(summary))
}

/// Dashboard landing page.
///
/// GET /
async fn index(BackOffice(auth): BackOffice) -> impl IntoResponse {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Back Office</title></head>\n<body><main><h1>Back Office</h1><p>Signed in as {} ({}).</p>\
         <form method=\"post\" action=\"/auth/logout\"><button type=\"submit\">Sign out</button></form></main></body>\n</html>\n",
        auth.principal.email, auth.user_type
    ))
}

/// Financial summary across the ledger collections.
///
/// GET /api/dashboard/summary
async fn summary(
    State(state): State<AppState>,
    BackOffice(_): BackOffice,
) -> Result<Json<FinancialSummary>, AppError> {
    let summary = FinancialSummary::load(state.store(), state.config().currency).await?;
    Ok(Json(summary))
}
